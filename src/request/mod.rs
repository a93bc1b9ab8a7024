//! Structured client request: root operation, arguments and resolve tree.
//!
//! The resolve tree is produced by the API layer after parsing and
//! validating the client document. Field names are the ones exposed by the
//! schema (`actors`, `actorsConnection`, `actorsAggregate`); their meaning is
//! looked up in the schema model during planning.

mod context;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use context::ExecutionContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RequestKind {
    /// List read (`movies`)
    Read,
    /// Relay-style connection read (`moviesConnection`)
    Connection,
    /// Aggregation read (`moviesAggregate`)
    Aggregate,
    Create,
    Update,
    Delete,
}

/// Selected fields of one object, with per-type fields for polymorphic values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    #[serde(default)]
    pub fields: Vec<SelectedField>,
    /// Fields selected through `... on Type` fragments
    #[serde(default)]
    pub by_type: BTreeMap<String, Vec<SelectedField>>,
}

impl Selection {
    pub fn new(fields: Vec<SelectedField>) -> Self {
        Selection {
            fields,
            by_type: BTreeMap::new(),
        }
    }

    /// Plain fields by name
    pub fn of(names: &[&str]) -> Self {
        Self::new(names.iter().map(|name| SelectedField::new(*name)).collect())
    }

    pub fn on_type(mut self, type_name: impl Into<String>, fields: Vec<SelectedField>) -> Self {
        self.by_type.insert(type_name.into(), fields);
        self
    }

    /// Fields that apply to a concrete type: shared fields first, then the
    /// type's fragment fields
    pub fn fields_for<'s>(&'s self, type_name: &str) -> impl Iterator<Item = &'s SelectedField> {
        self.fields
            .iter()
            .chain(self.by_type.get(type_name).into_iter().flatten())
    }

    pub fn field(&self, name: &str) -> Option<&SelectedField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.by_type.values().all(Vec::is_empty)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedField {
    pub name: String,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub args: Map<String, Value>,
    #[serde(default)]
    pub selection: Selection,
}

impl SelectedField {
    pub fn new(name: impl Into<String>) -> Self {
        SelectedField {
            name: name.into(),
            alias: None,
            args: Map::new(),
            selection: Selection::default(),
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Arguments from a JSON object; anything else is ignored
    pub fn args(mut self, args: Value) -> Self {
        if let Value::Object(map) = args {
            self.args = map;
        }
        self
    }

    pub fn select(mut self, selection: Selection) -> Self {
        self.selection = selection;
        self
    }

    /// Key under which the value appears in the result
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub fn arg(&self, name: &str) -> Option<&Value> {
        self.args.get(name).filter(|v| !v.is_null())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub kind: RequestKind,
    /// Node or interface type the root operates on
    pub type_name: String,
    #[serde(default)]
    pub args: Map<String, Value>,
    #[serde(default)]
    pub selection: Selection,
}

impl Request {
    pub fn new(kind: RequestKind, type_name: impl Into<String>) -> Self {
        Request {
            kind,
            type_name: type_name.into(),
            args: Map::new(),
            selection: Selection::default(),
        }
    }

    pub fn read(type_name: impl Into<String>) -> Self {
        Self::new(RequestKind::Read, type_name)
    }

    pub fn connection(type_name: impl Into<String>) -> Self {
        Self::new(RequestKind::Connection, type_name)
    }

    pub fn aggregate(type_name: impl Into<String>) -> Self {
        Self::new(RequestKind::Aggregate, type_name)
    }

    pub fn create(type_name: impl Into<String>) -> Self {
        Self::new(RequestKind::Create, type_name)
    }

    pub fn update(type_name: impl Into<String>) -> Self {
        Self::new(RequestKind::Update, type_name)
    }

    pub fn delete(type_name: impl Into<String>) -> Self {
        Self::new(RequestKind::Delete, type_name)
    }

    pub fn args(mut self, args: Value) -> Self {
        if let Value::Object(map) = args {
            self.args = map;
        }
        self
    }

    pub fn select(mut self, selection: Selection) -> Self {
        self.selection = selection;
        self
    }

    pub fn arg(&self, name: &str) -> Option<&Value> {
        self.args.get(name).filter(|v| !v.is_null())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_deserialization() {
        let request: Request = serde_json::from_value(json!({
            "kind": "read",
            "typeName": "Movie",
            "args": {"where": {"id_EQ": "1"}},
            "selection": {
                "fields": [
                    {"name": "id"},
                    {"name": "actors", "alias": "cast", "selection": {"fields": [{"name": "name"}]}}
                ]
            }
        }))
        .unwrap();

        assert_eq!(request.kind, RequestKind::Read);
        assert_eq!(request.arg("where"), Some(&json!({"id_EQ": "1"})));
        let actors = request.selection.field("actors").unwrap();
        assert_eq!(actors.response_key(), "cast");
        assert_eq!(actors.selection.fields.len(), 1);
    }

    #[test]
    fn test_fields_for_merges_fragments() {
        let selection = Selection::of(&["__typename"])
            .on_type("Movie", vec![SelectedField::new("title")])
            .on_type("Series", vec![SelectedField::new("episodes")]);

        let movie: Vec<&str> = selection
            .fields_for("Movie")
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(movie, vec!["__typename", "title"]);
        assert_eq!(selection.fields_for("Genre").count(), 1);
    }
}
