use serde_json::Value;

use super::update::match_related;
use super::{get, input_items, keyed_operations, nested_call, Bound};
use crate::graph_catalog::{NodeType, Operation, RelationshipField};
use crate::query_planner::errors::QueryPlannerError;
use crate::query_planner::plan_ctx::PlanCtx;
use crate::render_plan::clause::Clause;
use crate::render_plan::{DeleteClause, Projection, ProjectionItem, WithClause};

/// Nested deletes keyed by relationship field: `{actors: [{where, delete}]}`
pub(super) fn nested_deletes<'a>(
    ctx: &mut PlanCtx<'a>,
    parent: &Bound<'a>,
    input: &Value,
) -> Result<Vec<Clause>, QueryPlannerError> {
    keyed_operations(ctx, parent, "delete", input, delete_related)
}

/// `delete: [{where: {node, edge}, delete: {...}}]`: the matching related
/// nodes and everything their own `delete` names, deepest first
pub(super) fn delete_related<'a>(
    ctx: &mut PlanCtx<'a>,
    parent: &Bound<'a>,
    field: &RelationshipField,
    member: &'a NodeType,
    value: &Value,
) -> Result<Vec<Clause>, QueryPlannerError> {
    let mut clauses = vec![];
    for item in input_items("delete", value)? {
        let edge = field.properties.as_ref().map(|_| ctx.pattern_var());
        let (related, mut body) = match_related(
            ctx,
            parent,
            field,
            member,
            get(item, "where"),
            Operation::Delete,
            edge.as_ref(),
        )?;

        if let Some(nested) = get(item, "delete") {
            body.extend(nested_deletes(ctx, &related, nested)?);
        }
        body.push(Clause::With(WithClause {
            projection: Projection {
                distinct: true,
                items: vec![ProjectionItem::variable(&related.variable)],
                ..Default::default()
            },
            predicate: None,
        }));
        body.push(Clause::Delete(DeleteClause {
            detach: true,
            targets: vec![related.variable],
        }));
        ctx.summary_mut().nodes_deleted += 1;
        clauses.push(nested_call(ctx, &parent.variable, body));
    }
    Ok(clauses)
}
