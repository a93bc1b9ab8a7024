use serde_json::Value;

use crate::graph_catalog::{AuthorizationRule, NodeType};
use crate::query_planner::errors::QueryPlannerError;
use crate::query_planner::filter::{compile_filter, FilterOptions, FilterTarget, Predicate};
use crate::query_planner::plan_ctx::PlanCtx;
use crate::render_plan::{CypherExpr, Operator, Variable};

/// Compile a rule's `where`: `{node: {...}, jwt: {...}, AND/OR/NOT}`
pub(super) fn compile_rule_predicate<'a>(
    ctx: &mut PlanCtx<'a>,
    predicate: &Value,
    node: &'a NodeType,
    variable: &Variable,
    options: FilterOptions,
) -> Result<Predicate, QueryPlannerError> {
    let map = match predicate {
        Value::Null => return Ok(Predicate::default()),
        Value::Object(map) => map,
        other => {
            return Err(QueryPlannerError::schema_mismatch(
                &node.name,
                "authorization",
                format!("rule predicate must be an object, got {}", other),
            ))
        }
    };

    let mut preceding = vec![];
    let mut parts = Vec::with_capacity(map.len());
    for (key, value) in map {
        let compiled = match key.as_str() {
            "node" => compile_filter(ctx, value, &FilterTarget::Node(node), variable, options)?,
            "jwt" => compile_filter(ctx, value, &FilterTarget::Jwt, variable, options)?,
            "NOT" => {
                let inner = compile_rule_predicate(ctx, value, node, variable, options)?;
                Predicate {
                    preceding: inner.preceding,
                    expr: inner.expr.map(CypherExpr::not),
                }
            }
            "AND" | "OR" => {
                let items = value.as_array().ok_or_else(|| {
                    QueryPlannerError::schema_mismatch(
                        &node.name,
                        "authorization",
                        format!("{} expects a list", key),
                    )
                })?;
                let mut nested_preceding = vec![];
                let mut children = Vec::with_capacity(items.len());
                for item in items {
                    let child = compile_rule_predicate(ctx, item, node, variable, options)?;
                    nested_preceding.extend(child.preceding);
                    children.extend(child.expr);
                }
                Predicate {
                    preceding: nested_preceding,
                    expr: if key == "OR" {
                        CypherExpr::or_all(children)
                    } else {
                        CypherExpr::and_all(children)
                    },
                }
            }
            _ => {
                return Err(QueryPlannerError::schema_mismatch(
                    &node.name,
                    "authorization",
                    format!("unknown rule key `{}`", key),
                ))
            }
        };
        preceding.extend(compiled.preceding);
        parts.extend(compiled.expr);
    }

    Ok(Predicate {
        preceding,
        expr: CypherExpr::and_all(parts),
    })
}

/// `($isAuthenticated = true AND (expr))` for rules requiring authentication.
/// A rule with an empty predicate holds for every row it is guarded for.
pub(super) fn guard(
    ctx: &PlanCtx,
    rule: &AuthorizationRule,
    expr: Option<CypherExpr>,
) -> CypherExpr {
    if !rule.require_authentication {
        return expr.unwrap_or_else(|| CypherExpr::boolean(true));
    }
    let authenticated = ctx.is_authenticated().eq(CypherExpr::boolean(true));
    match expr {
        Some(expr) => CypherExpr::binary(Operator::And, authenticated, expr),
        None => authenticated,
    }
}
