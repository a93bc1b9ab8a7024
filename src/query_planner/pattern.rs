//! Match patterns for entry points and relationship traversals.
//!
//! Every binding of a node variable goes through [`match_node`] or
//! [`match_target`], which attach the user filter and the type's authorization
//! at that single point.

use serde_json::Value;

use super::authorization;
use super::errors::QueryPlannerError;
use super::filter::{compile_target_filter, FilterOptions, Predicate};
use super::plan_ctx::PlanCtx;
use crate::graph_catalog::{NodeType, Operation, RelationshipField, TargetType, ValidationPhase};
use crate::render_plan::clause::Clause;
use crate::render_plan::{
    CypherExpr, MatchClause, NodePattern, Pattern, RelationshipPattern, Variable,
};

pub fn node_pattern(variable: &Variable, node: &NodeType) -> NodePattern {
    NodePattern::new(
        variable.clone(),
        node.labels().into_iter().map(String::from).collect(),
    )
}

/// End node of a traversal; polymorphic targets carry no label
pub fn target_pattern(variable: &Variable, target: &TargetType) -> NodePattern {
    match target {
        TargetType::Node(node) => node_pattern(variable, node),
        TargetType::Interface { .. } | TargetType::Union { .. } => NodePattern::bound(variable),
    }
}

/// `(source)-[edge:TYPE]->(related:Label)`, oriented by the field's direction
pub fn relationship_pattern(
    source: &Variable,
    field: &RelationshipField,
    edge: Option<&Variable>,
    target: &TargetType,
    related: &Variable,
) -> Pattern {
    Pattern::hop(
        NodePattern::bound(source),
        RelationshipPattern {
            variable: edge.cloned(),
            rel_type: field.rel_type.clone(),
            direction: field.direction,
        },
        target_pattern(related, target),
    )
}

/// Label disjunction keeping a polymorphic end node within its members
pub fn label_restriction(variable: &Variable, target: &TargetType) -> Option<CypherExpr> {
    if !target.is_polymorphic() {
        return None;
    }
    let members = target.members();
    let labels: Vec<&str> = members.iter().map(|m| m.main_label()).collect();
    CypherExpr::has_any_label(variable, &labels)
}

/// Root type of a request that only runs over concrete node types
pub fn root_node<'a>(
    ctx: &PlanCtx<'a>,
    type_name: &str,
    what: &str,
) -> Result<&'a NodeType, QueryPlannerError> {
    match ctx.schema().target_type(type_name)? {
        TargetType::Node(node) => Ok(node),
        target => Err(QueryPlannerError::schema_mismatch(
            target.name(),
            what,
            "only supported on node types",
        )),
    }
}

/// `MATCH (this:Label)`
pub fn root_match(variable: &Variable, node: &NodeType) -> MatchClause {
    MatchClause {
        optional: false,
        patterns: vec![Pattern::node(node_pattern(variable, node))],
        predicate: None,
    }
}

/// The match followed by what its predicate needs.
///
/// The predicate sits on the match itself unless clauses have to run between
/// the match and the test, in which case it moves to a trailing `WITH * WHERE`.
pub fn bind(mut clause: MatchClause, predicate: Predicate) -> Vec<Clause> {
    let Predicate { preceding, expr } = predicate;
    if preceding.is_empty() {
        clause.predicate = CypherExpr::conjoin(clause.predicate.take(), expr);
        return vec![Clause::Match(clause)];
    }

    let mut clauses = Vec::with_capacity(preceding.len() + 2);
    clauses.push(Clause::Match(clause));
    clauses.extend(preceding);
    clauses.extend(expr.map(Clause::filter));
    clauses
}

/// Bind a node of a concrete type: authentication, user filter, filter rules
/// and, when `validate` is set, the type's assertions for that phase.
#[allow(clippy::too_many_arguments)]
pub fn match_node<'a>(
    ctx: &mut PlanCtx<'a>,
    clause: MatchClause,
    node: &'a NodeType,
    variable: &Variable,
    filter: Option<&Value>,
    operation: Operation,
    validate: Option<ValidationPhase>,
) -> Result<Vec<Clause>, QueryPlannerError> {
    match_target(
        ctx,
        clause,
        &TargetType::Node(node),
        variable,
        filter,
        operation,
        validate,
    )
}

/// Bind the end node of a traversal, concrete or polymorphic, under a user
/// `where` over that node.
#[allow(clippy::too_many_arguments)]
pub fn match_target<'a>(
    ctx: &mut PlanCtx<'a>,
    clause: MatchClause,
    target: &TargetType<'a>,
    variable: &Variable,
    filter: Option<&Value>,
    operation: Operation,
    validate: Option<ValidationPhase>,
) -> Result<Vec<Clause>, QueryPlannerError> {
    let user = match filter {
        Some(filter) => {
            compile_target_filter(ctx, filter, target, variable, FilterOptions::user())?
        }
        None => Predicate::default(),
    };
    bind_guarded(ctx, clause, target, variable, user, operation, validate)
}

fn check_authentication(
    ctx: &PlanCtx,
    target: &TargetType,
    operation: Operation,
) -> Result<(), QueryPlannerError> {
    target
        .members()
        .into_iter()
        .try_for_each(|member| authorization::check_authentication(ctx, member, operation))
}

/// Bind under an already compiled user predicate, adding the target's filter
/// rules and validate assertions.
///
/// Polymorphic ends are checked per member: each member's rules only apply to
/// rows carrying that member's label.
#[allow(clippy::too_many_arguments)]
pub fn bind_guarded<'a>(
    ctx: &mut PlanCtx<'a>,
    clause: MatchClause,
    target: &TargetType<'a>,
    variable: &Variable,
    user: Predicate,
    operation: Operation,
    validate: Option<ValidationPhase>,
) -> Result<Vec<Clause>, QueryPlannerError> {
    check_authentication(ctx, target, operation)?;

    if let TargetType::Node(node) = target {
        let node: &'a NodeType = node;
        let rules = authorization::filter_predicate(ctx, node, variable, operation)?;
        let mut clauses = bind(clause, user.and(rules));
        if let Some(phase) = validate {
            clauses.extend(authorization::validate_clauses(
                ctx, node, variable, operation, phase,
            )?);
        }
        return Ok(clauses);
    }

    let members = target.members();
    let rules = authorization::member_filter_predicate(ctx, &members, variable, operation)?;
    let mut clauses = bind(clause, user.and(rules));
    if let Some(phase) = validate {
        clauses.extend(authorization::member_validate_clauses(
            ctx, &members, variable, operation, phase,
        )?);
    }
    Ok(clauses)
}
