use serde_json::Value;

use super::update::match_related;
use super::{get, input_items, keyed_operations, nested_call, Bound};
use crate::graph_catalog::{NodeType, Operation, RelationshipField, ValidationPhase};
use crate::query_planner::authorization;
use crate::query_planner::errors::QueryPlannerError;
use crate::query_planner::plan_ctx::PlanCtx;
use crate::render_plan::clause::Clause;
use crate::render_plan::DeleteClause;

/// `disconnect: [{where: {node, edge}, disconnect: {...}}]`: delete the
/// matching relationships, keeping both nodes. Nested disconnects run from
/// the related node before its relationship goes.
pub(super) fn disconnect<'a>(
    ctx: &mut PlanCtx<'a>,
    parent: &Bound<'a>,
    field: &RelationshipField,
    member: &'a NodeType,
    value: &Value,
) -> Result<Vec<Clause>, QueryPlannerError> {
    let mut clauses = vec![];
    for item in input_items("disconnect", value)? {
        let edge = ctx.pattern_var();
        let (related, mut body) = match_related(
            ctx,
            parent,
            field,
            member,
            get(item, "where"),
            Operation::DeleteRelationship,
            Some(&edge),
        )?;
        body.extend(authorization::validate_clauses(
            ctx,
            parent.node,
            &parent.variable,
            Operation::DeleteRelationship,
            ValidationPhase::Before,
        )?);

        if let Some(nested) = get(item, "disconnect") {
            body.extend(keyed_operations(ctx, &related, "disconnect", nested, disconnect)?);
        }
        body.push(Clause::Delete(DeleteClause {
            detach: false,
            targets: vec![edge],
        }));
        ctx.summary_mut().relationships_deleted += 1;
        clauses.push(nested_call(ctx, &parent.variable, body));
    }
    Ok(clauses)
}
