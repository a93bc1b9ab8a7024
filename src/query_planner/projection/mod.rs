//! Projection builder: selections to map projections.
//!
//! Every relationship field in a selection becomes its own `CALL` subquery
//! importing the parent variable, run ahead of the projection that reads its
//! result:
//!
//! ```text
//! CALL {
//!     WITH this
//!     MATCH (this)<-[:ACTED_IN]-(this0:Actor)
//!     RETURN collect(this0 { .name }) AS var1
//! }
//! RETURN this { .title, actors: var1 } AS this
//! ```
//!
//! Plain lists, connections and aggregations each have their own module.

mod aggregation;
mod connection;
mod sort;

#[cfg(test)]
mod tests;

use crate::graph_catalog::{
    NodeType, Operation, PropertySchema, RelationshipField, TargetType, ValidationPhase,
};
use crate::request::{SelectedField, Selection};
use crate::render_plan::clause::Clause;
use crate::render_plan::{
    ClauseTree, CypherExpr, MapProjectionItem, MatchClause, NodePattern, ProjectionItem, Variable,
};
use crate::result_shaper::ResultShape;

use super::errors::QueryPlannerError;
use super::pattern::{label_restriction, match_target, relationship_pattern};
use super::plan_ctx::PlanCtx;

pub use aggregation::{aggregate_fields, AggregateSource};
pub use connection::{connection_clauses, ConnectionArgs, ConnectionInput};
pub use sort::{order_and_page, paged, sort_expr};

pub(crate) const TYPENAME: &str = "__typename";

/// A projected value and the subqueries it reads from
#[derive(Debug, Clone, PartialEq)]
pub struct Projected {
    /// Run before the clause holding `expr`
    pub clauses: Vec<Clause>,
    pub expr: CypherExpr,
    pub shape: ResultShape,
}

/// Node a nested subquery starts from. Members of a polymorphic value carry
/// their label, so the subquery only produces rows for that member.
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    pub variable: Variable,
    pub label: Option<String>,
}

impl Source {
    pub fn bound(variable: &Variable) -> Self {
        Source {
            variable: variable.clone(),
            label: None,
        }
    }

    fn member(variable: &Variable, node: &NodeType) -> Self {
        Source {
            variable: variable.clone(),
            label: Some(node.main_label().to_string()),
        }
    }

    pub(crate) fn pattern(&self) -> NodePattern {
        NodePattern::new(self.variable.clone(), self.label.iter().cloned().collect())
    }
}

/// Project a value of `target` bound to `variable`.
///
/// Polymorphic values become a `CASE` over member labels, each branch a
/// member map projection that carries `__typename`.
pub fn project_target<'a>(
    ctx: &mut PlanCtx<'a>,
    target: &TargetType<'a>,
    variable: &Variable,
    selection: &Selection,
) -> Result<Projected, QueryPlannerError> {
    if let TargetType::Node(node) = target {
        let node: &'a NodeType = node;
        let member = project_node(ctx, node, &Source::bound(variable), selection, false)?;
        return Ok(Projected {
            clauses: member.clauses,
            expr: CypherExpr::MapProjection {
                variable: variable.clone(),
                items: member.items,
            },
            shape: ResultShape::object(member.shape),
        });
    }

    let mut clauses = vec![];
    let mut branches = vec![];
    let mut shape = vec![];
    for member in target.members() {
        let source = Source::member(variable, member);
        let projected = project_node(ctx, member, &source, selection, true)?;
        clauses.extend(projected.clauses);
        shape.extend(projected.shape);
        branches.push((
            CypherExpr::HasLabel {
                variable: variable.clone(),
                label: member.main_label().to_string(),
            },
            CypherExpr::MapProjection {
                variable: variable.clone(),
                items: projected.items,
            },
        ));
    }
    Ok(Projected {
        clauses,
        expr: CypherExpr::Case {
            branches,
            otherwise: None,
        },
        shape: ResultShape::object(shape),
    })
}

/// Map projection items of one concrete type
pub(crate) struct NodeProjection {
    pub clauses: Vec<Clause>,
    pub items: Vec<MapProjectionItem>,
    pub shape: Vec<(String, ResultShape)>,
}

pub(crate) fn project_node<'a>(
    ctx: &mut PlanCtx<'a>,
    node: &'a NodeType,
    source: &Source,
    selection: &Selection,
    with_typename: bool,
) -> Result<NodeProjection, QueryPlannerError> {
    let fields: Vec<&SelectedField> = selection.fields_for(&node.name).collect();
    let mut projection = NodeProjection {
        clauses: vec![],
        items: Vec::with_capacity(fields.len() + 1),
        shape: vec![],
    };
    if with_typename && !fields.iter().any(|f| f.name == TYPENAME) {
        projection.items.push(typename_entry(TYPENAME, node));
    }

    for selected in fields {
        let key = selected.response_key();
        if selected.name == TYPENAME {
            projection.items.push(typename_entry(key, node));
            continue;
        }
        if let Some(property) = node.property(&selected.name) {
            projection.items.push(property_item(&source.variable, key, property));
            continue;
        }

        let (clause, result, shape) = if let Some(field) = node.relationship(&selected.name) {
            project_relationship(ctx, field, source, selected)?
        } else if let Some(field) = selected
            .name
            .strip_suffix("Connection")
            .and_then(|name| node.relationship(name))
        {
            connection::project_connection(ctx, field, source, selected)?
        } else if let Some(field) = selected
            .name
            .strip_suffix("Aggregate")
            .and_then(|name| node.relationship(name))
            .filter(|field| field.aggregate)
        {
            aggregation::project_aggregate(ctx, &node.name, field, source, selected)?
        } else {
            return Err(QueryPlannerError::unknown_field(&node.name, &selected.name));
        };

        projection.clauses.push(clause);
        projection
            .items
            .push(MapProjectionItem::Entry(key.to_string(), result.expr()));
        projection.shape.push((key.to_string(), shape));
    }
    Ok(projection)
}

fn typename_entry(key: &str, node: &NodeType) -> MapProjectionItem {
    MapProjectionItem::Entry(key.to_string(), CypherExpr::string(&node.name))
}

/// `.title` when the response key and stored name agree, `key: this.stored` otherwise
pub(crate) fn property_item(
    variable: &Variable,
    key: &str,
    property: &PropertySchema,
) -> MapProjectionItem {
    if key == property.name && property.db_name() == property.name {
        MapProjectionItem::Property(property.name.clone())
    } else {
        MapProjectionItem::Entry(key.to_string(), variable.property(property.db_name()))
    }
}

/// Relationship traversal starting at `source`; the end is bound to a fresh
/// variable and kept within the target's members
pub(crate) fn traverse<'a>(
    ctx: &mut PlanCtx<'a>,
    field: &RelationshipField,
    source: &Source,
    with_edge: bool,
) -> Result<(TargetType<'a>, Variable, Option<Variable>, MatchClause), QueryPlannerError> {
    let target = ctx.schema().target_type(&field.target)?;
    let related = ctx.pattern_var();
    let edge = if with_edge { Some(ctx.pattern_var()) } else { None };

    let mut pattern =
        relationship_pattern(&source.variable, field, edge.as_ref(), &target, &related);
    pattern.start = source.pattern();
    let clause = MatchClause {
        optional: false,
        patterns: vec![pattern],
        predicate: label_restriction(&related, &target),
    };
    Ok((target, related, edge, clause))
}

/// `CALL { WITH this MATCH ... RETURN collect(this0 { ... }) AS var1 }`;
/// to-one fields return `head(collect(...))`
fn project_relationship<'a>(
    ctx: &mut PlanCtx<'a>,
    field: &RelationshipField,
    source: &Source,
    selected: &SelectedField,
) -> Result<(Clause, Variable, ResultShape), QueryPlannerError> {
    let (target, related, _, clause) = traverse(ctx, field, source, false)?;

    let mut body = ClauseTree::from(match_target(
        ctx,
        clause,
        &target,
        &related,
        selected.arg("where"),
        Operation::Read,
        Some(ValidationPhase::After),
    )?);

    let projected = project_target(ctx, &target, &related, &selected.selection)?;
    body.extend(projected.clauses);
    if field.is_list() {
        body.extend(order_and_page(ctx, &target, &related, &selected.args)?);
    }

    let result = ctx.value_var();
    let collected = CypherExpr::function("collect", vec![projected.expr]);
    let (value, shape) = if field.is_list() {
        (collected, ResultShape::list(projected.shape))
    } else {
        (CypherExpr::function("head", vec![collected]), projected.shape)
    };
    body.push(Clause::return_items(vec![ProjectionItem::aliased(value, &result)]));

    Ok((
        Clause::call(vec![source.variable.clone()], body),
        result,
        shape,
    ))
}
