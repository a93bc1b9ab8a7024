//! Post-processing of raw result rows.
//!
//! The compiled query returns cursors as raw sort-key tuples. Compilation
//! records where they sit in a [`ResultShape`]; [`shape_result`] walks a row
//! along that shape and swaps every tuple for its opaque encoding.

use serde::Serialize;
use serde_json::Value;

use crate::utils::cursor::Cursor;

/// Where a compiled query's result holds values that need rewriting
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "of", rename_all = "camelCase")]
pub enum ResultShape {
    /// Passed through unchanged
    Scalar,
    /// Response key and shape of each field worth visiting
    Object(Vec<(String, ResultShape)>),
    List(Box<ResultShape>),
    /// Raw sort-key tuple, replaced by its encoded cursor
    Cursor,
}

impl ResultShape {
    pub fn list(item: ResultShape) -> Self {
        ResultShape::List(Box::new(item))
    }

    /// Whether anything under this shape is rewritten
    pub fn has_cursors(&self) -> bool {
        match self {
            ResultShape::Scalar => false,
            ResultShape::Cursor => true,
            ResultShape::List(item) => item.has_cursors(),
            ResultShape::Object(fields) => fields.iter().any(|(_, shape)| shape.has_cursors()),
        }
    }

    /// Object shape keeping only fields that contain cursors; polymorphic
    /// members contribute to one merged object
    pub(crate) fn object(fields: Vec<(String, ResultShape)>) -> Self {
        let mut kept: Vec<(String, ResultShape)> = Vec::with_capacity(fields.len());
        for (key, shape) in fields {
            if !shape.has_cursors() || kept.iter().any(|(existing, _)| *existing == key) {
                continue;
            }
            kept.push((key, shape));
        }
        if kept.is_empty() {
            ResultShape::Scalar
        } else {
            ResultShape::Object(kept)
        }
    }
}

/// Rewrite `value` in place according to `shape`.
///
/// Values that do not have the recorded structure (nulls, absent keys) are
/// left alone.
pub fn shape_result(value: &mut Value, shape: &ResultShape) {
    match (shape, value) {
        (ResultShape::Scalar, _) => {}
        (ResultShape::Cursor, value) => {
            let cursor = match value {
                Value::Array(keys) if !keys.is_empty() => Cursor::Keyset(keys.clone()),
                Value::Number(n) => match n.as_u64() {
                    Some(offset) => Cursor::Offset(offset),
                    None => return,
                },
                _ => return,
            };
            *value = Value::String(cursor.encode());
        }
        (ResultShape::List(item), Value::Array(items)) => {
            for element in items.iter_mut() {
                shape_result(element, item);
            }
        }
        (ResultShape::Object(fields), Value::Object(map)) => {
            for (key, field_shape) in fields {
                if let Some(field) = map.get_mut(key) {
                    shape_result(field, field_shape);
                }
            }
        }
        (shape, other) => {
            log::trace!("Result value {} does not match shape {:?}", other, shape);
        }
    }
}

/// Shape every row of a result set
pub fn shape_rows(rows: &mut [Value], shape: &ResultShape) {
    if !shape.has_cursors() {
        return;
    }
    for row in rows {
        shape_result(row, shape);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn connection_shape() -> ResultShape {
        ResultShape::object(vec![
            (
                "edges".to_string(),
                ResultShape::list(ResultShape::object(vec![
                    ("cursor".to_string(), ResultShape::Cursor),
                    ("node".to_string(), ResultShape::Scalar),
                ])),
            ),
            ("totalCount".to_string(), ResultShape::Scalar),
            (
                "pageInfo".to_string(),
                ResultShape::object(vec![
                    ("startCursor".to_string(), ResultShape::Cursor),
                    ("endCursor".to_string(), ResultShape::Cursor),
                ]),
            ),
        ])
    }

    #[test]
    fn test_cursors_are_encoded_and_decodable() {
        let mut row = json!({
            "edges": [
                {"cursor": ["Heat", "m1"], "node": {"title": "Heat"}},
                {"cursor": ["Ronin", "m2"], "node": {"title": "Ronin"}}
            ],
            "totalCount": 2,
            "pageInfo": {"startCursor": ["Heat", "m1"], "endCursor": ["Ronin", "m2"]}
        });
        shape_result(&mut row, &connection_shape());

        let first = row["edges"][0]["cursor"].as_str().unwrap();
        assert_eq!(
            Cursor::decode(first).unwrap(),
            Cursor::Keyset(vec![json!("Heat"), json!("m1")])
        );
        assert_eq!(row["pageInfo"]["endCursor"], row["edges"][1]["cursor"]);
        assert_eq!(row["edges"][0]["node"], json!({"title": "Heat"}));
        assert_eq!(row["totalCount"], json!(2));
    }

    #[test]
    fn test_empty_page_keeps_null_cursors() {
        let mut row = json!({
            "edges": [],
            "totalCount": 0,
            "pageInfo": {"startCursor": null, "endCursor": null}
        });
        shape_result(&mut row, &connection_shape());
        assert_eq!(row["pageInfo"]["startCursor"], Value::Null);
    }

    #[test]
    fn test_object_shape_drops_plain_fields() {
        let shape = ResultShape::object(vec![
            ("title".to_string(), ResultShape::Scalar),
            ("actors".to_string(), ResultShape::list(ResultShape::Scalar)),
        ]);
        assert_eq!(shape, ResultShape::Scalar);
        assert!(!shape.has_cursors());
    }
}
