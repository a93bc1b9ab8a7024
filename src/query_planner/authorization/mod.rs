//! Authorization compiler.
//!
//! Rules are records on the node type; this module interprets them for one
//! operation and caller context:
//! - `filter` rules become a row predicate, ORed across rules and ANDed with
//!   the user filter at the binding
//! - `validate` rules become an `apoc.util.validate` assertion, ANDed across
//!   rules and placed right after the guarded binding
//!
//! Rules requiring authentication are dropped for anonymous callers. When
//! filter rules apply but none survive, the predicate is `false`.

mod rule;

use crate::graph_catalog::{NodeType, Operation, RuleKind, ValidationPhase};
use crate::render_plan::clause::Clause;
use crate::render_plan::{CypherExpr, Operator, ProcedureCall, Variable};

use self::rule::{compile_rule_predicate, guard};
use super::errors::QueryPlannerError;
use super::filter::{FilterOptions, Predicate};
use super::plan_ctx::PlanCtx;

/// Raised by a failed `validate` rule; mapped to `AuthorizationDenied`
pub const FORBIDDEN: &str = "@cypher-compiler/FORBIDDEN";

/// Raised when a to-one relationship ends up with the wrong number of nodes
pub const RELATIONSHIP_CARDINALITY: &str = "@cypher-compiler/RELATIONSHIP-CARDINALITY";

const VALIDATE_PROCEDURE: &str = "apoc.util.validate";

/// Fail before emission when the type refuses anonymous callers for `operation`.
pub fn check_authentication(
    ctx: &PlanCtx,
    node: &NodeType,
    operation: Operation,
) -> Result<(), QueryPlannerError> {
    match &node.authentication {
        Some(requirement) if requirement.covers(operation) && !ctx.context().is_authenticated => {
            log::debug!("Refusing anonymous {} on {}", operation, node.name);
            Err(QueryPlannerError::Unauthenticated {
                type_name: node.name.clone(),
                operation,
            })
        }
        _ => Ok(()),
    }
}

fn has_rules(node: &NodeType, kind: RuleKind, operation: Operation) -> bool {
    node.authorization
        .iter()
        .any(|rule| rule.kind == kind && rule.applies_to(operation))
}

/// Row predicate from the type's filter rules; empty when none apply.
pub fn filter_predicate<'a>(
    ctx: &mut PlanCtx<'a>,
    node: &'a NodeType,
    variable: &Variable,
    operation: Operation,
) -> Result<Predicate, QueryPlannerError> {
    if !has_rules(node, RuleKind::Filter, operation) {
        return Ok(Predicate::default());
    }

    let authenticated = ctx.context().is_authenticated;
    let mut preceding = vec![];
    let mut disjuncts = vec![];
    for rule in node.authorization.iter().filter(|rule| {
        rule.kind == RuleKind::Filter && rule.applies_to(operation)
    }) {
        if rule.require_authentication && !authenticated {
            continue;
        }
        let compiled = compile_rule_predicate(
            ctx,
            &rule.predicate,
            node,
            variable,
            FilterOptions::authorization_filter(),
        )?;
        preceding.extend(compiled.preceding);
        disjuncts.push(guard(ctx, rule, compiled.expr));
    }

    let expr = CypherExpr::or_all(disjuncts).unwrap_or_else(|| {
        log::debug!("No {} filter rule on {} admits this caller", operation, node.name);
        CypherExpr::boolean(false)
    });
    Ok(Predicate {
        preceding,
        expr: Some(expr),
    })
}

/// Conjunction of the type's validate rules for `operation` in `phase`.
pub fn validate_predicate<'a>(
    ctx: &mut PlanCtx<'a>,
    node: &'a NodeType,
    variable: &Variable,
    operation: Operation,
    phase: ValidationPhase,
) -> Result<Predicate, QueryPlannerError> {
    let authenticated = ctx.context().is_authenticated;
    let mut preceding = vec![];
    let mut conjuncts = vec![];
    for rule in node.authorization.iter().filter(|rule| {
        rule.kind == RuleKind::Validate && rule.applies_to(operation) && rule.checked_in(phase)
    }) {
        if rule.require_authentication && !authenticated {
            conjuncts.push(CypherExpr::boolean(false));
            continue;
        }
        let compiled = compile_rule_predicate(
            ctx,
            &rule.predicate,
            node,
            variable,
            FilterOptions::authorization_validate(),
        )?;
        preceding.extend(compiled.preceding);
        conjuncts.push(guard(ctx, rule, compiled.expr));
    }

    Ok(Predicate {
        preceding,
        expr: CypherExpr::and_all(conjuncts),
    })
}

/// `CALL apoc.util.validate(NOT (predicate), "<sentinel>", [0])`
pub fn assertion(predicate: CypherExpr, sentinel: &'static str) -> Clause {
    Clause::Procedure(ProcedureCall {
        name: VALIDATE_PROCEDURE,
        args: vec![
            predicate.not(),
            CypherExpr::string(sentinel),
            CypherExpr::List(vec![CypherExpr::integer(0)]),
        ],
    })
}

fn assertion_clauses(predicate: Predicate) -> Vec<Clause> {
    let Predicate { preceding, expr } = predicate;
    let Some(expr) = expr else {
        return vec![];
    };
    let mut clauses = preceding;
    clauses.push(Clause::with_star());
    clauses.push(assertion(expr, FORBIDDEN));
    clauses
}

/// Assertion clauses for the type's validate rules; empty when none apply.
pub fn validate_clauses<'a>(
    ctx: &mut PlanCtx<'a>,
    node: &'a NodeType,
    variable: &Variable,
    operation: Operation,
    phase: ValidationPhase,
) -> Result<Vec<Clause>, QueryPlannerError> {
    let predicate = validate_predicate(ctx, node, variable, operation, phase)?;
    Ok(assertion_clauses(predicate))
}

/// `(this0:Movie AND <Movie rules>) OR (this0:Series AND <Series rules>)`.
///
/// Members without rules of `kind` contribute their bare label test.
fn per_member<'a, F>(
    ctx: &mut PlanCtx<'a>,
    members: &[&'a NodeType],
    variable: &Variable,
    kind: RuleKind,
    operation: Operation,
    mut compile: F,
) -> Result<Predicate, QueryPlannerError>
where
    F: FnMut(&mut PlanCtx<'a>, &'a NodeType) -> Result<Predicate, QueryPlannerError>,
{
    if !members.iter().any(|m| has_rules(m, kind, operation)) {
        return Ok(Predicate::default());
    }

    let mut preceding = vec![];
    let mut branches = Vec::with_capacity(members.len());
    for member in members.iter().copied() {
        let label = CypherExpr::HasLabel {
            variable: variable.clone(),
            label: member.main_label().to_string(),
        };
        let compiled = compile(ctx, member)?;
        preceding.extend(compiled.preceding);
        branches.push(match compiled.expr {
            Some(expr) => CypherExpr::binary(Operator::And, label, expr),
            None => label,
        });
    }
    Ok(Predicate {
        preceding,
        expr: CypherExpr::or_all(branches),
    })
}

pub fn member_filter_predicate<'a>(
    ctx: &mut PlanCtx<'a>,
    members: &[&'a NodeType],
    variable: &Variable,
    operation: Operation,
) -> Result<Predicate, QueryPlannerError> {
    per_member(ctx, members, variable, RuleKind::Filter, operation, |ctx, member| {
        filter_predicate(ctx, member, variable, operation)
    })
}

pub fn member_validate_clauses<'a>(
    ctx: &mut PlanCtx<'a>,
    members: &[&'a NodeType],
    variable: &Variable,
    operation: Operation,
    phase: ValidationPhase,
) -> Result<Vec<Clause>, QueryPlannerError> {
    let predicate = per_member(
        ctx,
        members,
        variable,
        RuleKind::Validate,
        operation,
        |ctx, member| validate_predicate(ctx, member, variable, operation, phase),
    )?;
    Ok(assertion_clauses(predicate))
}
