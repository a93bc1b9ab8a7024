use serde_json::{Map, Value};

use super::properties::{update_items, Owner};
use super::{get, input_items, input_object, nested_call, relationship_operations, Bound, Mode};
use crate::graph_catalog::{NodeType, Operation, RelationshipField, TargetType, ValidationPhase};
use crate::query_planner::authorization;
use crate::query_planner::errors::QueryPlannerError;
use crate::query_planner::filter::{compile_connection_filter, FilterOptions, Predicate};
use crate::query_planner::pattern::{bind_guarded, relationship_pattern};
use crate::query_planner::plan_ctx::PlanCtx;
use crate::render_plan::clause::Clause;
use crate::render_plan::{MatchClause, Variable};

/// `SET` of the node's own properties, then its relationship operations
pub(super) fn update_node<'a>(
    ctx: &mut PlanCtx<'a>,
    bound: &Bound<'a>,
    input: &Map<String, Value>,
) -> Result<Vec<Clause>, QueryPlannerError> {
    let mut clauses = vec![];
    let items = update_items(ctx, Owner::node(bound.node), &bound.variable, input)?;
    if !items.is_empty() {
        clauses.push(Clause::Set(items));
    }
    clauses.extend(relationship_operations(ctx, bound, input, Mode::Update)?);
    Ok(clauses)
}

/// Match the related nodes of `field` under a connection `where`
/// (`{node: {...}, edge: {...}}`) and bind them for `operation`.
pub(super) fn match_related<'a>(
    ctx: &mut PlanCtx<'a>,
    parent: &Bound<'a>,
    field: &RelationshipField,
    member: &'a NodeType,
    filter: Option<&Value>,
    operation: Operation,
    edge: Option<&Variable>,
) -> Result<(Bound<'a>, Vec<Clause>), QueryPlannerError> {
    let target = TargetType::Node(member);
    let related = Bound {
        node: member,
        variable: ctx.pattern_var(),
    };
    let clause = MatchClause {
        optional: false,
        patterns: vec![relationship_pattern(
            &parent.variable,
            field,
            edge,
            &target,
            &related.variable,
        )],
        predicate: None,
    };
    let user = match filter {
        Some(filter) => compile_connection_filter(
            ctx,
            filter,
            field,
            &target,
            &related.variable,
            edge,
            FilterOptions::user(),
        )?,
        None => Predicate::default(),
    };
    let clauses = bind_guarded(
        ctx,
        clause,
        &target,
        &related.variable,
        user,
        operation,
        Some(ValidationPhase::Before),
    )?;
    Ok((related, clauses))
}

/// Nested `update: {node: {...}, edge: {...}}` of the related nodes
/// matching `where`
pub(super) fn update_related<'a>(
    ctx: &mut PlanCtx<'a>,
    parent: &Bound<'a>,
    field: &RelationshipField,
    member: &'a NodeType,
    filter: Option<&Value>,
    value: &Value,
) -> Result<Vec<Clause>, QueryPlannerError> {
    let mut clauses = vec![];
    for input in input_items("update", value)? {
        if let Some(key) = input.keys().find(|key| !matches!(key.as_str(), "node" | "edge")) {
            return Err(QueryPlannerError::invalid_argument(
                format!("{}.update.{}", field.name, key),
                "expected `node` or `edge`",
            ));
        }
        let edge = field.properties.as_ref().map(|_| ctx.pattern_var());
        let (related, mut body) = match_related(
            ctx,
            parent,
            field,
            member,
            filter,
            Operation::Update,
            edge.as_ref(),
        )?;

        if let Some(node_input) = get(input, "node") {
            body.extend(update_node(ctx, &related, input_object("update.node", node_input)?)?);
        }
        if let Some(edge_input) = get(input, "edge") {
            let (Some(edge), Some(name)) = (&edge, &field.properties) else {
                return Err(QueryPlannerError::schema_mismatch(
                    &field.name,
                    "edge",
                    "relationship carries no properties",
                ));
            };
            let properties = ctx.schema().get_relationship_properties(name)?;
            let items = update_items(
                ctx,
                Owner::edge(properties),
                edge,
                input_object("update.edge", edge_input)?,
            )?;
            if !items.is_empty() {
                body.push(Clause::Set(items));
            }
        }

        body.extend(authorization::validate_clauses(
            ctx,
            member,
            &related.variable,
            Operation::Update,
            ValidationPhase::After,
        )?);
        clauses.push(nested_call(ctx, &parent.variable, body));
    }
    Ok(clauses)
}
