use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Caller identity as established by the transport layer.
///
/// Claims are trusted as-is; token verification happens upstream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionContext {
    pub is_authenticated: bool,
    #[serde(default)]
    pub jwt: Option<Map<String, Value>>,
}

impl ExecutionContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Authenticated caller; non-object claims are treated as empty
    pub fn authenticated(claims: Value) -> Self {
        ExecutionContext {
            is_authenticated: true,
            jwt: match claims {
                Value::Object(map) => Some(map),
                _ => Some(Map::new()),
            },
        }
    }

    /// Claims as the value bound to `$jwt`
    pub fn jwt_value(&self) -> Value {
        self.jwt
            .as_ref()
            .map(|claims| Value::Object(claims.clone()))
            .unwrap_or(Value::Null)
    }
}
