//! Query planner: one request to one clause tree.
//!
//! Each request kind has a root planner. They all bind nodes through
//! [`pattern`], which attaches the user filter and the type's authorization
//! at the binding, and project through [`projection`]. Mutations add the
//! write clauses of [`mutation`] in between.

use errors::QueryPlannerError;
use plan_ctx::PlanCtx;

use crate::render_plan::ClauseTree;
use crate::request::{Request, RequestKind};
use crate::result_shaper::ResultShape;

pub mod arguments;
pub mod authorization;
pub mod errors;
pub mod filter;
pub mod mutation;
pub mod pattern;
pub mod plan_ctx;
pub mod projection;
mod read;
pub mod scalar;

/// Plan `request` in `ctx`.
///
/// The tree and the shape of each result row are returned; the summary of
/// planned changes stays in `ctx`.
pub fn plan_request<'a>(
    ctx: &mut PlanCtx<'a>,
    request: &Request,
) -> Result<(ClauseTree, ResultShape), QueryPlannerError> {
    log::trace!("Planning {:?} on {}", request.kind, request.type_name);
    let (clauses, shape) = match request.kind {
        RequestKind::Read => read::plan_read(ctx, request)?,
        RequestKind::Connection => read::plan_connection(ctx, request)?,
        RequestKind::Aggregate => read::plan_aggregate(ctx, request)?,
        RequestKind::Create => mutation::plan_create(ctx, request)?,
        RequestKind::Update => mutation::plan_update(ctx, request)?,
        RequestKind::Delete => mutation::plan_delete(ctx, request)?,
    };
    Ok((ClauseTree::from(clauses), shape))
}
