//! cypher-compiler - typed graph schemas and client requests to Cypher
//!
//! This crate turns a schema model plus one structured request into a single
//! parameterized Cypher query:
//! - Filter and authorization predicates compiled into `WHERE` conditions,
//!   subqueries and runtime assertions
//! - Nested selections projected through `CALL` subqueries
//! - Nested mutations ordered and scoped per relationship
//! - Relay connections with keyset cursors
//!
//! Compilation is synchronous and pure. The caller executes the query and
//! passes raw rows back through [`result_shaper`] to encode cursors.

pub mod config;
pub mod cypher_generator;
pub mod errors;
pub mod graph_catalog;
pub mod query_planner;
pub mod render_plan;
pub mod request;
pub mod result_shaper;
pub mod utils;

use serde::Serialize;
use serde_json::{Map, Value};

use config::CompilerConfig;
use errors::RequestError;
use graph_catalog::GraphSchema;
use query_planner::plan_ctx::{PlanCtx, SummaryCounters};
use request::{ExecutionContext, Request};
use result_shaper::ResultShape;

/// Output of one compilation, ready for the execution layer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledQuery {
    pub cypher: String,
    pub params: Map<String, Value>,
    /// Mutation summary counters the execution layer should read back
    pub expected_summary_keys: Vec<String>,
    /// Planned operations, not database effects
    pub summary: SummaryCounters,
    pub result_shape: ResultShape,
}

/// Compile `request` against `schema` for the caller described by `context`.
///
/// Either the whole request compiles or nothing is emitted.
pub fn compile(
    schema: &GraphSchema,
    request: &Request,
    context: &ExecutionContext,
    config: &CompilerConfig,
) -> Result<CompiledQuery, RequestError> {
    log::debug!(
        "Compiling {:?} request on {} (authenticated: {})",
        request.kind,
        request.type_name,
        context.is_authenticated
    );

    let mut ctx = PlanCtx::new(schema, context, config);
    let (tree, result_shape) = query_planner::plan_request(&mut ctx, request)?;
    let generated = cypher_generator::generate_cypher(&tree)?;
    let summary = ctx.summary();

    log::trace!(
        "Compiled {} clauses, {} params",
        tree.clauses.len(),
        generated.params.len()
    );
    Ok(CompiledQuery {
        cypher: generated.cypher,
        params: generated.params,
        expected_summary_keys: summary.expected_keys(),
        summary,
        result_shape,
    })
}
