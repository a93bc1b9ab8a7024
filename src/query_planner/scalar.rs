//! Scalar values supplied by the client: type checks, temporal wrapping and
//! claim references.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value;

use super::errors::QueryPlannerError;
use super::plan_ctx::PlanCtx;
use crate::graph_catalog::{PropertySchema, ScalarKind};
use crate::render_plan::CypherExpr;

const CLAIM_PREFIX: &str = "$jwt.";

/// `"$jwt.sub"` -> `$jwt.sub`, for values inside authorization rules
pub fn claim_reference(ctx: &PlanCtx, value: &Value) -> Option<CypherExpr> {
    let path = value.as_str()?.strip_prefix(CLAIM_PREFIX)?;
    if path.is_empty() {
        return None;
    }
    Some(
        path.split('.')
            .fold(ctx.jwt(), |expr, segment| expr.property(segment)),
    )
}

/// Parameter for `value`, wrapped in the temporal constructor of `kind`.
pub fn value_param(ctx: &mut PlanCtx, kind: Option<ScalarKind>, value: &Value) -> CypherExpr {
    let param = ctx.param(value.clone());
    match kind.and_then(|k| k.temporal_constructor()) {
        Some(constructor) if !value.is_null() => CypherExpr::function(constructor, vec![param]),
        _ => param,
    }
}

/// Parameter for a list of values of `kind`.
///
/// Temporal lists become a list of individually wrapped parameters so every
/// element is converted.
pub fn list_param(ctx: &mut PlanCtx, kind: Option<ScalarKind>, values: &[Value]) -> CypherExpr {
    if kind.is_some_and(|k| k.is_temporal()) {
        CypherExpr::List(values.iter().map(|v| value_param(ctx, kind, v)).collect())
    } else {
        ctx.param(Value::Array(values.to_vec()))
    }
}

/// Check that `value` is acceptable for a property, allowing list values for
/// list properties.
pub fn check_property_value(
    type_name: &str,
    property: &PropertySchema,
    value: &Value,
) -> Result<(), QueryPlannerError> {
    if value.is_null() {
        return Ok(());
    }
    if property.list {
        let items = value.as_array().ok_or_else(|| {
            invalid_value(type_name, &property.name, "expected a list", value)
        })?;
        return items
            .iter()
            .try_for_each(|item| check_scalar(type_name, &property.name, property.kind, item));
    }
    check_scalar(type_name, &property.name, property.kind, value)
}

/// Check a single (non-list) value against a scalar kind.
pub fn check_scalar(
    type_name: &str,
    field: &str,
    kind: ScalarKind,
    value: &Value,
) -> Result<(), QueryPlannerError> {
    let valid = match (kind, value) {
        (_, Value::Null) => true,
        (ScalarKind::Id, Value::String(_)) => true,
        (ScalarKind::Id, Value::Number(n)) => n.is_i64() || n.is_u64(),
        (ScalarKind::String, Value::String(_)) => true,
        (ScalarKind::Int, Value::Number(n)) => n.is_i64(),
        (ScalarKind::BigInt, Value::Number(n)) => n.is_i64(),
        (ScalarKind::BigInt, Value::String(s)) => s.parse::<i64>().is_ok(),
        (ScalarKind::Float, Value::Number(_)) => true,
        (ScalarKind::Boolean, Value::Bool(_)) => true,
        (kind, Value::String(s)) if kind.is_temporal() => is_valid_temporal(kind, s),
        _ => false,
    };

    if valid {
        Ok(())
    } else {
        Err(invalid_value(
            type_name,
            field,
            &format!("expected a value of type {}", kind),
            value,
        ))
    }
}

fn is_valid_temporal(kind: ScalarKind, s: &str) -> bool {
    match kind {
        ScalarKind::DateTime => DateTime::parse_from_rfc3339(s).is_ok(),
        ScalarKind::LocalDateTime => {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
        }
        ScalarKind::Date => NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok(),
        ScalarKind::Time => {
            DateTime::parse_from_rfc3339(&format!("1970-01-01T{}", s)).is_ok()
                || NaiveTime::parse_from_str(s, "%H:%M:%S%.f").is_ok()
        }
        ScalarKind::LocalTime => NaiveTime::parse_from_str(s, "%H:%M:%S%.f").is_ok(),
        ScalarKind::Duration => {
            s.len() > 1
                && s.starts_with('P')
                && s[1..].chars().all(|c| c.is_ascii_alphanumeric() || c == '.')
        }
        _ => false,
    }
}

fn invalid_value(type_name: &str, field: &str, expected: &str, value: &Value) -> QueryPlannerError {
    QueryPlannerError::invalid_argument(
        format!("{}.{}", type_name, field),
        format!("{}, got {}", expected, value),
    )
}
