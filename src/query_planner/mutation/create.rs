use serde_json::{Map, Value};

use super::properties::{create_items, Owner};
use super::{
    create_pattern, edge_pattern, get, input_items, input_object, nested_call,
    relationship_operations, Bound, Mode,
};
use crate::graph_catalog::{NodeType, Operation, RelationshipField, ValidationPhase};
use crate::query_planner::authorization;
use crate::query_planner::errors::QueryPlannerError;
use crate::query_planner::plan_ctx::PlanCtx;
use crate::render_plan::clause::Clause;
use crate::render_plan::{SetItem, Variable};

/// Relationship from an existing parent to a node being created
pub(super) struct Link<'l> {
    pub parent: &'l Variable,
    pub field: &'l RelationshipField,
    pub edge: Option<&'l Value>,
}

/// Properties of a relationship being created; defaults apply even when the
/// input carries no `edge`
pub(super) fn edge_create_items(
    ctx: &mut PlanCtx,
    field: &RelationshipField,
    edge: Option<&Variable>,
    input: Option<&Value>,
) -> Result<Vec<SetItem>, QueryPlannerError> {
    match (&field.properties, edge) {
        (Some(name), Some(edge)) => {
            let properties = ctx.schema().get_relationship_properties(name)?;
            let empty = Map::new();
            let input = match input {
                Some(value) => input_object("edge", value)?,
                None => &empty,
            };
            create_items(ctx, Owner::edge(properties), edge, input)
        }
        _ if input.is_some() => Err(QueryPlannerError::schema_mismatch(
            &field.name,
            "edge",
            "relationship carries no properties",
        )),
        _ => Ok(vec![]),
    }
}

/// `CREATE`, `SET`, the link to the parent, nested operations and the
/// type's create assertions for one new node
pub(super) fn create_node<'a>(
    ctx: &mut PlanCtx<'a>,
    bound: &Bound<'a>,
    input: &Map<String, Value>,
    link: Option<Link>,
) -> Result<Vec<Clause>, QueryPlannerError> {
    authorization::check_authentication(ctx, bound.node, Operation::Create)?;

    let mut clauses = vec![Clause::Create(create_pattern(bound))];
    ctx.summary_mut().nodes_created += 1;
    let items = create_items(ctx, Owner::node(bound.node), &bound.variable, input)?;
    if !items.is_empty() {
        clauses.push(Clause::Set(items));
    }

    if let Some(link) = link {
        let edge = link.field.properties.as_ref().map(|_| ctx.pattern_var());
        clauses.push(Clause::Create(edge_pattern(
            link.parent,
            link.field,
            edge.as_ref(),
            &bound.variable,
        )));
        ctx.summary_mut().relationships_created += 1;
        let items = edge_create_items(ctx, link.field, edge.as_ref(), link.edge)?;
        if !items.is_empty() {
            clauses.push(Clause::Set(items));
        }
    }

    clauses.extend(relationship_operations(ctx, bound, input, Mode::Create)?);
    // checked once the nested relationships exist
    clauses.extend(authorization::validate_clauses(
        ctx,
        bound.node,
        &bound.variable,
        Operation::Create,
        ValidationPhase::After,
    )?);
    Ok(clauses)
}

/// Nested `create: [{node: {...}, edge: {...}}]` under `parent`
pub(super) fn create_related<'a>(
    ctx: &mut PlanCtx<'a>,
    parent: &Bound<'a>,
    field: &RelationshipField,
    member: &'a NodeType,
    value: &Value,
) -> Result<Vec<Clause>, QueryPlannerError> {
    let mut clauses = vec![];
    for item in input_items("create", value)? {
        let node_input = get(item, "node")
            .ok_or_else(|| QueryPlannerError::invalid_argument("create.node", "required"))?;
        let bound = Bound {
            node: member,
            variable: ctx.pattern_var(),
        };
        let link = Link {
            parent: &parent.variable,
            field,
            edge: get(item, "edge"),
        };
        let body = create_node(ctx, &bound, input_object("create.node", node_input)?, Some(link))?;
        clauses.push(nested_call(ctx, &parent.variable, body));
    }
    Ok(clauses)
}
