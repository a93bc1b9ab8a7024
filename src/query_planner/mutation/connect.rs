//! `connect` and `connectOrCreate`.

use serde_json::{Map, Value};

use super::create::edge_create_items;
use super::properties::{merge_create_items, Owner};
use super::{edge_pattern, get, input_items, input_object, keyed_operations, nested_call, Bound};
use crate::graph_catalog::{NodeType, Operation, RelationshipField, ValidationPhase};
use crate::query_planner::authorization;
use crate::query_planner::errors::QueryPlannerError;
use crate::query_planner::pattern::{match_node, node_pattern, root_match};
use crate::query_planner::plan_ctx::PlanCtx;
use crate::query_planner::scalar::{check_property_value, value_param};
use crate::render_plan::clause::Clause;
use crate::render_plan::{MergeClause, Pattern};

/// `where.node` of a connect input
fn node_filter<'v>(
    argument: &str,
    item: &'v Map<String, Value>,
) -> Result<Option<&'v Value>, QueryPlannerError> {
    let Some(filter) = get(item, "where") else {
        return Ok(None);
    };
    let filter = input_object(argument, filter)?;
    if let Some(key) = filter.keys().find(|key| key.as_str() != "node") {
        return Err(QueryPlannerError::invalid_argument(
            format!("{}.where.{}", argument, key),
            "only `node` can be matched on",
        ));
    }
    Ok(get(filter, "node"))
}

/// Assertions for both ends of a relationship write
fn relationship_assertions<'a>(
    ctx: &mut PlanCtx<'a>,
    parent: &Bound<'a>,
    related: &Bound<'a>,
    operation: Operation,
    phase: ValidationPhase,
) -> Result<Vec<Clause>, QueryPlannerError> {
    let mut clauses =
        authorization::validate_clauses(ctx, parent.node, &parent.variable, operation, phase)?;
    clauses.extend(authorization::validate_clauses(
        ctx,
        related.node,
        &related.variable,
        operation,
        phase,
    )?);
    Ok(clauses)
}

/// `connect: [{where: {node: {...}}, edge: {...}, overwrite, connect}]`:
/// every matching node is linked with `MERGE`. Existing relationships keep
/// their properties unless `overwrite` (the default) is set.
pub(super) fn connect<'a>(
    ctx: &mut PlanCtx<'a>,
    parent: &Bound<'a>,
    field: &RelationshipField,
    member: &'a NodeType,
    value: &Value,
) -> Result<Vec<Clause>, QueryPlannerError> {
    let mut clauses = vec![];
    for item in input_items("connect", value)? {
        let related = Bound {
            node: member,
            variable: ctx.pattern_var(),
        };
        let mut body = match_node(
            ctx,
            root_match(&related.variable, member),
            member,
            &related.variable,
            node_filter("connect", item)?,
            Operation::CreateRelationship,
            None,
        )?;

        let edge = field.properties.as_ref().map(|_| ctx.pattern_var());
        let items = edge_create_items(ctx, field, edge.as_ref(), get(item, "edge"))?;
        let overwrite = match get(item, "overwrite") {
            Some(Value::Bool(overwrite)) => *overwrite,
            Some(_) => {
                return Err(QueryPlannerError::invalid_argument(
                    "connect.overwrite",
                    "expected a boolean",
                ))
            }
            None => true,
        };
        let pattern = edge_pattern(&parent.variable, field, edge.as_ref(), &related.variable);
        if overwrite {
            body.push(Clause::Merge(MergeClause {
                pattern,
                on_create: vec![],
                on_match: vec![],
            }));
            if !items.is_empty() {
                body.push(Clause::Set(items));
            }
        } else {
            body.push(Clause::Merge(MergeClause {
                pattern,
                on_create: items,
                on_match: vec![],
            }));
        }
        ctx.summary_mut().relationships_created += 1;

        if let Some(nested) = get(item, "connect") {
            body.extend(keyed_operations(ctx, &related, "connect", nested, connect)?);
        }
        body.extend(relationship_assertions(
            ctx,
            parent,
            &related,
            Operation::CreateRelationship,
            ValidationPhase::After,
        )?);
        clauses.push(nested_call(ctx, &parent.variable, body));
    }
    Ok(clauses)
}

/// `connectOrCreate: [{where: {node: {uniqueField: v}}, onCreate: {node, edge}}]`:
/// `MERGE` on the unique property, setting the `onCreate` values only when
/// the node is new
pub(super) fn connect_or_create<'a>(
    ctx: &mut PlanCtx<'a>,
    parent: &Bound<'a>,
    field: &RelationshipField,
    member: &'a NodeType,
    value: &Value,
) -> Result<Vec<Clause>, QueryPlannerError> {
    authorization::check_authentication(ctx, member, Operation::Create)?;
    authorization::check_authentication(ctx, member, Operation::CreateRelationship)?;

    let mut clauses = vec![];
    for item in input_items("connectOrCreate", value)? {
        let unique = node_filter("connectOrCreate", item)?
            .and_then(Value::as_object)
            .filter(|filter| filter.len() == 1)
            .ok_or_else(|| {
                QueryPlannerError::invalid_argument(
                    "connectOrCreate.where.node",
                    "expected exactly one unique field",
                )
            })?;
        let (key, key_value) = unique.iter().next().ok_or_else(|| {
            QueryPlannerError::invalid_argument("connectOrCreate.where.node", "empty")
        })?;
        let property = member
            .property(key)
            .filter(|property| property.unique)
            .ok_or_else(|| {
                QueryPlannerError::schema_mismatch(&member.name, key, "not a unique field")
            })?;
        if key_value.is_null() {
            return Err(QueryPlannerError::invalid_argument(
                format!("connectOrCreate.where.node.{}", key),
                "cannot be null",
            ));
        }
        check_property_value(&member.name, property, key_value)?;

        let on_create = match get(item, "onCreate") {
            Some(value) => Some(input_object("connectOrCreate.onCreate", value)?),
            None => None,
        };
        let created = on_create
            .and_then(|on_create| get(on_create, "node"))
            .map(|node| input_object("connectOrCreate.onCreate.node", node).cloned())
            .transpose()?
            .unwrap_or_default();

        let related = Bound {
            node: member,
            variable: ctx.pattern_var(),
        };
        let mut merged = node_pattern(&related.variable, member);
        merged.properties = vec![(
            property.db_name().to_string(),
            value_param(ctx, Some(property.kind), key_value),
        )];
        let on_create_items =
            merge_create_items(ctx, Owner::node(member), &related.variable, &created, key)?;
        ctx.summary_mut().nodes_created += 1;

        let mut body = vec![Clause::Merge(MergeClause {
            pattern: Pattern::node(merged),
            on_create: on_create_items,
            on_match: vec![],
        })];

        let edge = field.properties.as_ref().map(|_| ctx.pattern_var());
        let edge_items = edge_create_items(
            ctx,
            field,
            edge.as_ref(),
            on_create.and_then(|on_create| get(on_create, "edge")),
        )?;
        body.push(Clause::Merge(MergeClause {
            pattern: edge_pattern(&parent.variable, field, edge.as_ref(), &related.variable),
            on_create: edge_items,
            on_match: vec![],
        }));
        ctx.summary_mut().relationships_created += 1;

        body.extend(relationship_assertions(
            ctx,
            parent,
            &related,
            Operation::CreateRelationship,
            ValidationPhase::After,
        )?);
        clauses.push(nested_call(ctx, &parent.variable, body));
    }
    Ok(clauses)
}
