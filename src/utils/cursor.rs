//! Opaque pagination cursors
//!
//! A cursor is base64 over a small JSON document:
//!
//! ```text
//! keyset:  ["The Matrix", "m1"]     sort-key tuple of the edge, tie-breaker last
//! offset:  {"offset": 4}            zero-based position of the edge
//! ```
//!
//! Connections always hand out keyset cursors. Offset cursors are still
//! accepted on input for clients holding cursors from an offset-paginated API.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CursorError {
    #[error("cursor is not valid base64")]
    Encoding,
    #[error("cursor payload is not valid JSON")]
    Payload,
    #[error("cursor payload has unexpected shape: {0}")]
    Shape(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cursor {
    Offset(u64),
    Keyset(Vec<Value>),
}

impl Cursor {
    pub fn encode(&self) -> String {
        let payload = match self {
            Cursor::Offset(offset) => json!({ "offset": offset }),
            Cursor::Keyset(values) => Value::Array(values.clone()),
        };
        STANDARD.encode(payload.to_string())
    }

    pub fn decode(token: &str) -> Result<Cursor, CursorError> {
        let bytes = STANDARD.decode(token).map_err(|_| CursorError::Encoding)?;
        let payload: Value = serde_json::from_slice(&bytes).map_err(|_| CursorError::Payload)?;

        match payload {
            Value::Array(values) if !values.is_empty() => Ok(Cursor::Keyset(values)),
            Value::Array(_) => Err(CursorError::Shape("empty key tuple".to_string())),
            Value::Object(map) if map.len() == 1 => map
                .get("offset")
                .and_then(Value::as_u64)
                .map(Cursor::Offset)
                .ok_or_else(|| {
                    CursorError::Shape("offset must be a non-negative integer".to_string())
                }),
            other => Err(CursorError::Shape(other.to_string())),
        }
    }
}

impl FromStr for Cursor {
    type Err = CursorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Cursor::decode(s)
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyset_cursor_roundtrip() {
        let cursor = Cursor::Keyset(vec![json!("The Matrix"), json!(1999), json!(null)]);
        assert_eq!(Cursor::decode(&cursor.encode()), Ok(cursor));
    }

    #[test]
    fn test_offset_cursor_roundtrip() {
        let cursor = Cursor::Offset(41);
        let token = cursor.to_string();
        assert_eq!(token.parse::<Cursor>(), Ok(cursor));
    }

    #[test]
    fn test_rejects_malformed_tokens() {
        assert_eq!(Cursor::decode("%%%"), Err(CursorError::Encoding));
        assert_eq!(
            Cursor::decode(&STANDARD.encode("not json")),
            Err(CursorError::Payload)
        );
        assert!(matches!(
            Cursor::decode(&STANDARD.encode("[]")),
            Err(CursorError::Shape(_))
        ));
        assert!(matches!(
            Cursor::decode(&STANDARD.encode(r#"{"offset": -1}"#)),
            Err(CursorError::Shape(_))
        ));
        assert!(matches!(
            Cursor::decode(&STANDARD.encode("\"abc\"")),
            Err(CursorError::Shape(_))
        ));
    }
}
