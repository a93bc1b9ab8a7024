use serde_json::{json, Map, Value};

use crate::graph_catalog::TargetType;
use crate::query_planner::arguments::{parse_count, parse_sort, SortField};
use crate::query_planner::errors::QueryPlannerError;
use crate::query_planner::plan_ctx::PlanCtx;
use crate::render_plan::clause::Clause;
use crate::render_plan::{CypherExpr, OrderByItem, Projection, ProjectionItem, Variable, WithClause};

fn arg<'v>(args: &'v Map<String, Value>, name: &str) -> Option<&'v Value> {
    args.get(name).filter(|v| !v.is_null())
}

/// Sort key over a property of `target`
pub fn sort_expr(
    target: &TargetType,
    variable: &Variable,
    sort: &SortField,
) -> Result<CypherExpr, QueryPlannerError> {
    let property = target
        .property(&sort.field)
        .ok_or_else(|| QueryPlannerError::unknown_field(target.name(), &sort.field))?;
    if property.list {
        return Err(QueryPlannerError::schema_mismatch(
            target.name(),
            &sort.field,
            "list fields cannot be sorted on",
        ));
    }
    Ok(variable.property(property.db_name()))
}

/// `WITH * ORDER BY ... SKIP ... LIMIT ...`, or nothing when the request
/// neither sorts nor pages
pub fn paged(
    ctx: &mut PlanCtx,
    order_by: Vec<OrderByItem>,
    offset: Option<u32>,
    limit: Option<u32>,
) -> Option<Clause> {
    if order_by.is_empty() && offset.is_none() && limit.is_none() {
        return None;
    }
    let skip = offset.map(|offset| ctx.param(json!(offset)));
    let limit = limit.map(|limit| ctx.param(json!(limit)));
    Some(Clause::With(WithClause {
        projection: Projection {
            items: vec![ProjectionItem::Star],
            order_by,
            skip,
            limit,
            ..Default::default()
        },
        predicate: None,
    }))
}

/// Ordering and paging of a list of `target` values from `sort`, `offset`
/// and `limit` arguments, with the type's limits applied
pub fn order_and_page(
    ctx: &mut PlanCtx,
    target: &TargetType,
    variable: &Variable,
    args: &Map<String, Value>,
) -> Result<Option<Clause>, QueryPlannerError> {
    let order_by = parse_sort("sort", arg(args, "sort"))?
        .iter()
        .map(|sort| {
            Ok(OrderByItem {
                expr: sort_expr(target, variable, sort)?,
                direction: sort.direction,
            })
        })
        .collect::<Result<Vec<_>, QueryPlannerError>>()?;
    let offset = parse_count("offset", arg(args, "offset"))?;
    let limit = ctx.effective_limit(target.as_node(), parse_count("limit", arg(args, "limit"))?);
    Ok(paged(ctx, order_by, offset, limit))
}
