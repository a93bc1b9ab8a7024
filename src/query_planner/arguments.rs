//! Paging and ordering arguments shared by list fields, connections and root
//! reads: `sort`, `limit`, `offset`, `first`, `after`.

use serde_json::{Map, Value};

use super::errors::QueryPlannerError;
use crate::render_plan::SortDirection;
use crate::utils::cursor::Cursor;

/// One `{field: ASC|DESC}` entry of a `sort` argument
#[derive(Debug, Clone, PartialEq)]
pub struct SortField {
    pub field: String,
    pub direction: SortDirection,
}

fn parse_direction(argument: &str, value: &Value) -> Result<SortDirection, QueryPlannerError> {
    match value.as_str() {
        Some("ASC") => Ok(SortDirection::Asc),
        Some("DESC") => Ok(SortDirection::Desc),
        _ => Err(QueryPlannerError::invalid_argument(
            argument,
            format!("sort direction must be ASC or DESC, got {}", value),
        )),
    }
}

/// Entries of a `sort` argument as objects, in order. A single object is
/// accepted as a one-element list.
fn sort_entries<'v>(
    argument: &str,
    value: Option<&'v Value>,
) -> Result<Vec<&'v Map<String, Value>>, QueryPlannerError> {
    let entries: Vec<&Value> = match value {
        None => return Ok(vec![]),
        Some(Value::Array(items)) => items.iter().collect(),
        Some(object @ Value::Object(_)) => vec![object],
        Some(other) => {
            return Err(QueryPlannerError::invalid_argument(
                argument,
                format!("expected a list of sort objects, got {}", other),
            ))
        }
    };

    entries
        .into_iter()
        .map(|entry| {
            entry.as_object().ok_or_else(|| {
                QueryPlannerError::invalid_argument(
                    argument,
                    format!("expected a sort object, got {}", entry),
                )
            })
        })
        .collect()
}

/// `[{title: ASC}, {views: DESC}]`
pub fn parse_sort(
    argument: &str,
    value: Option<&Value>,
) -> Result<Vec<SortField>, QueryPlannerError> {
    let mut fields = vec![];
    for entry in sort_entries(argument, value)? {
        for (field, direction) in entry {
            fields.push(SortField {
                field: field.clone(),
                direction: parse_direction(argument, direction)?,
            });
        }
    }
    Ok(fields)
}

/// Which side of a connection edge a sort key reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortSide {
    Node,
    Edge,
}

/// `[{node: {name: ASC}}, {edge: {screenTime: DESC}}]`
pub fn parse_connection_sort(
    argument: &str,
    value: Option<&Value>,
) -> Result<Vec<(SortSide, SortField)>, QueryPlannerError> {
    let mut fields = vec![];
    for entry in sort_entries(argument, value)? {
        for (side, inner) in entry {
            let side = match side.as_str() {
                "node" => SortSide::Node,
                "edge" => SortSide::Edge,
                other => {
                    return Err(QueryPlannerError::invalid_argument(
                        argument,
                        format!("connection sort keys are `node` and `edge`, got `{}`", other),
                    ))
                }
            };
            for field in parse_sort(argument, Some(inner))? {
                fields.push((side, field));
            }
        }
    }
    Ok(fields)
}

/// Non-negative integer argument such as `limit`, `offset` or `first`
pub fn parse_count(
    argument: &str,
    value: Option<&Value>,
) -> Result<Option<u32>, QueryPlannerError> {
    let Some(value) = value else {
        return Ok(None);
    };
    value
        .as_u64()
        .and_then(|n| u32::try_from(n).ok())
        .map(Some)
        .ok_or_else(|| {
            QueryPlannerError::invalid_argument(
                argument,
                format!("expected a non-negative integer, got {}", value),
            )
        })
}

/// `after` cursor of a connection
pub fn parse_cursor(value: Option<&Value>) -> Result<Option<Cursor>, QueryPlannerError> {
    let Some(value) = value else {
        return Ok(None);
    };
    let token = value.as_str().ok_or_else(|| {
        QueryPlannerError::invalid_argument(
            "after",
            format!("expected a cursor string, got {}", value),
        )
    })?;
    Cursor::decode(token)
        .map(Some)
        .map_err(|source| QueryPlannerError::InvalidCursor {
            cursor: token.to_string(),
            source,
        })
}
