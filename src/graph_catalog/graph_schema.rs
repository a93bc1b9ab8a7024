use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use super::authorization::{AuthenticationRequirement, AuthorizationRule};
use super::errors::GraphSchemaError;

/// Scalar kinds a property may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarKind {
    #[serde(rename = "ID")]
    Id,
    String,
    Int,
    Float,
    BigInt,
    Boolean,
    DateTime,
    LocalDateTime,
    Date,
    Time,
    LocalTime,
    Duration,
}

impl ScalarKind {
    pub fn is_numeric(&self) -> bool {
        matches!(self, ScalarKind::Int | ScalarKind::Float | ScalarKind::BigInt)
    }

    pub fn is_string_like(&self) -> bool {
        matches!(self, ScalarKind::Id | ScalarKind::String)
    }

    pub fn is_temporal(&self) -> bool {
        self.temporal_constructor().is_some()
    }

    /// Cypher function used to turn a parameter into a value of this kind.
    pub fn temporal_constructor(&self) -> Option<&'static str> {
        match self {
            ScalarKind::DateTime => Some("datetime"),
            ScalarKind::LocalDateTime => Some("localdatetime"),
            ScalarKind::Date => Some("date"),
            ScalarKind::Time => Some("time"),
            ScalarKind::LocalTime => Some("localtime"),
            ScalarKind::Duration => Some("duration"),
            _ => None,
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScalarKind::Id => "ID",
            ScalarKind::String => "String",
            ScalarKind::Int => "Int",
            ScalarKind::Float => "Float",
            ScalarKind::BigInt => "BigInt",
            ScalarKind::Boolean => "Boolean",
            ScalarKind::DateTime => "DateTime",
            ScalarKind::LocalDateTime => "LocalDateTime",
            ScalarKind::Date => "Date",
            ScalarKind::Time => "Time",
            ScalarKind::LocalTime => "LocalTime",
            ScalarKind::Duration => "Duration",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PropertySchema {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ScalarKind,
    /// List-valued property (e.g. `[String!]`)
    #[serde(default)]
    pub list: bool,
    #[serde(default = "default_true")]
    pub nullable: bool,
    #[serde(default)]
    pub unique: bool,
    /// Value written on create when the input omits the property
    #[serde(default)]
    pub default: Option<serde_json::Value>,
    /// Optional: name of the property as stored in the database
    /// Example: `title` exposed as `name` => alias: Some("title")
    #[serde(default)]
    pub alias: Option<String>,
}

impl PropertySchema {
    pub fn new(name: impl Into<String>, kind: ScalarKind) -> Self {
        PropertySchema {
            name: name.into(),
            kind,
            list: false,
            nullable: true,
            unique: false,
            default: None,
            alias: None,
        }
    }

    /// Stored property name (alias if configured)
    pub fn db_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Out,
    In,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Out => f.write_str("OUT"),
            Direction::In => f.write_str("IN"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Cardinality {
    One,
    Many,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelationshipField {
    /// Field name exposed to clients (e.g. "actors")
    pub name: String,
    /// Relationship type stored in the graph (e.g. "ACTED_IN")
    #[serde(rename = "type")]
    pub rel_type: String,
    /// Name of a node, interface or union type
    pub target: String,
    pub direction: Direction,
    #[serde(default = "default_cardinality")]
    pub cardinality: Cardinality,
    /// Only meaningful for `ONE`: whether the related node may be absent
    #[serde(default = "default_true")]
    pub nullable: bool,
    /// Optional: name of the relationship properties type carried by the edge
    #[serde(default)]
    pub properties: Option<String>,
    #[serde(default = "default_true")]
    pub aggregate: bool,
}

fn default_cardinality() -> Cardinality {
    Cardinality::Many
}

impl RelationshipField {
    pub fn is_list(&self) -> bool {
        self.cardinality == Cardinality::Many
    }

    pub fn connection_field_name(&self) -> String {
        format!("{}Connection", self.name)
    }

    pub fn aggregate_field_name(&self) -> String {
        format!("{}Aggregate", self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LimitSettings {
    #[serde(default)]
    pub default: Option<u32>,
    #[serde(default)]
    pub max: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeType {
    /// Type name exposed to clients; also `__typename`
    pub name: String,
    /// Primary label, defaults to the type name
    #[serde(default)]
    pub label: Option<String>,
    /// Additional labels every node of this type carries
    #[serde(default)]
    pub additional_labels: Vec<String>,
    #[serde(default)]
    pub properties: Vec<PropertySchema>,
    #[serde(default)]
    pub relationships: Vec<RelationshipField>,
    #[serde(default)]
    pub authorization: Vec<AuthorizationRule>,
    #[serde(default)]
    pub authentication: Option<AuthenticationRequirement>,
    #[serde(default)]
    pub limit: Option<LimitSettings>,
}

impl NodeType {
    pub fn new(name: impl Into<String>) -> Self {
        NodeType {
            name: name.into(),
            label: None,
            additional_labels: vec![],
            properties: vec![],
            relationships: vec![],
            authorization: vec![],
            authentication: None,
            limit: None,
        }
    }

    pub fn main_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    /// All labels in declaration order, primary label first
    pub fn labels(&self) -> Vec<&str> {
        let mut labels = vec![self.main_label()];
        labels.extend(self.additional_labels.iter().map(|l| l.as_str()));
        labels
    }

    pub fn property(&self, name: &str) -> Option<&PropertySchema> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn relationship(&self, name: &str) -> Option<&RelationshipField> {
        self.relationships.iter().find(|r| r.name == name)
    }

    /// Property used to break ties when ordering: the first unique property
    pub fn tie_breaker(&self) -> Option<&PropertySchema> {
        self.properties.iter().find(|p| p.unique && !p.list)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InterfaceType {
    pub name: String,
    /// Fields every member must expose
    #[serde(default)]
    pub properties: Vec<PropertySchema>,
    #[serde(default)]
    pub relationships: Vec<RelationshipField>,
    pub members: Vec<String>,
}

impl InterfaceType {
    pub fn property(&self, name: &str) -> Option<&PropertySchema> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn relationship(&self, name: &str) -> Option<&RelationshipField> {
        self.relationships.iter().find(|r| r.name == name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnionType {
    pub name: String,
    pub members: Vec<String>,
}

/// Properties stored on a relationship
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelationshipProperties {
    pub name: String,
    #[serde(default)]
    pub properties: Vec<PropertySchema>,
}

impl RelationshipProperties {
    pub fn property(&self, name: &str) -> Option<&PropertySchema> {
        self.properties.iter().find(|p| p.name == name)
    }
}

/// Resolved target of a relationship field.
///
/// Polymorphic targets carry their concrete members so every pass over them
/// is an exhaustive match rather than a lookup through a shared base.
#[derive(Debug, Clone)]
pub enum TargetType<'a> {
    Node(&'a NodeType),
    Interface {
        interface: &'a InterfaceType,
        members: Vec<&'a NodeType>,
    },
    Union {
        union: &'a UnionType,
        members: Vec<&'a NodeType>,
    },
}

impl<'a> TargetType<'a> {
    pub fn name(&self) -> &'a str {
        match self {
            TargetType::Node(node) => &node.name,
            TargetType::Interface { interface, .. } => &interface.name,
            TargetType::Union { union, .. } => &union.name,
        }
    }

    /// Concrete node types reachable through this target
    pub fn members(&self) -> Vec<&'a NodeType> {
        match self {
            TargetType::Node(node) => vec![*node],
            TargetType::Interface { members, .. } | TargetType::Union { members, .. } => {
                members.clone()
            }
        }
    }

    pub fn is_polymorphic(&self) -> bool {
        !matches!(self, TargetType::Node(_))
    }

    /// Property shared by every node the target can resolve to; unions
    /// declare none
    pub fn property(&self, name: &str) -> Option<&'a PropertySchema> {
        match self {
            TargetType::Node(node) => node.property(name),
            TargetType::Interface { interface, .. } => interface.property(name),
            TargetType::Union { .. } => None,
        }
    }

    pub fn as_node(&self) -> Option<&'a NodeType> {
        match self {
            TargetType::Node(node) => Some(node),
            _ => None,
        }
    }
}

/// Immutable schema model consumed by the compiler.
///
/// Built once at startup and shared read-only between compilations.
#[derive(Debug, Clone)]
pub struct GraphSchema {
    nodes: Vec<NodeType>,
    interfaces: Vec<InterfaceType>,
    unions: Vec<UnionType>,
    relationship_properties: Vec<RelationshipProperties>,
    node_index: HashMap<String, usize>,
    interface_index: HashMap<String, usize>,
    union_index: HashMap<String, usize>,
    properties_index: HashMap<String, usize>,
}

impl GraphSchema {
    pub fn build(
        nodes: Vec<NodeType>,
        interfaces: Vec<InterfaceType>,
        unions: Vec<UnionType>,
        relationship_properties: Vec<RelationshipProperties>,
    ) -> GraphSchema {
        fn index_by<T>(items: &[T], name: impl Fn(&T) -> &str) -> HashMap<String, usize> {
            items
                .iter()
                .enumerate()
                .map(|(i, item)| (name(item).to_string(), i))
                .collect()
        }

        GraphSchema {
            node_index: index_by(&nodes, |n| &n.name),
            interface_index: index_by(&interfaces, |i| &i.name),
            union_index: index_by(&unions, |u| &u.name),
            properties_index: index_by(&relationship_properties, |p| &p.name),
            nodes,
            interfaces,
            unions,
            relationship_properties,
        }
    }

    pub fn nodes(&self) -> &[NodeType] {
        &self.nodes
    }

    pub fn interfaces(&self) -> &[InterfaceType] {
        &self.interfaces
    }

    pub fn unions(&self) -> &[UnionType] {
        &self.unions
    }

    pub fn relationship_properties(&self) -> &[RelationshipProperties] {
        &self.relationship_properties
    }

    pub fn get_node_opt(&self, name: &str) -> Option<&NodeType> {
        self.node_index.get(name).map(|&i| &self.nodes[i])
    }

    pub fn get_node(&self, name: &str) -> Result<&NodeType, GraphSchemaError> {
        self.get_node_opt(name).ok_or_else(|| GraphSchemaError::Node {
            node_label: name.to_string(),
        })
    }

    pub fn get_interface_opt(&self, name: &str) -> Option<&InterfaceType> {
        self.interface_index.get(name).map(|&i| &self.interfaces[i])
    }

    pub fn get_union_opt(&self, name: &str) -> Option<&UnionType> {
        self.union_index.get(name).map(|&i| &self.unions[i])
    }

    pub fn get_relationship_properties(
        &self,
        name: &str,
    ) -> Result<&RelationshipProperties, GraphSchemaError> {
        self.properties_index
            .get(name)
            .map(|&i| &self.relationship_properties[i])
            .ok_or_else(|| GraphSchemaError::RelationshipProperties {
                name: name.to_string(),
            })
    }

    /// Resolve a type name to a node, interface or union target.
    pub fn target_type(&self, name: &str) -> Result<TargetType<'_>, GraphSchemaError> {
        if let Some(node) = self.get_node_opt(name) {
            return Ok(TargetType::Node(node));
        }
        if let Some(interface) = self.get_interface_opt(name) {
            let members = self.resolve_members(&interface.members)?;
            return Ok(TargetType::Interface { interface, members });
        }
        if let Some(union) = self.get_union_opt(name) {
            let members = self.resolve_members(&union.members)?;
            return Ok(TargetType::Union { union, members });
        }
        Err(GraphSchemaError::UnknownType {
            type_name: name.to_string(),
        })
    }

    fn resolve_members(&self, names: &[String]) -> Result<Vec<&NodeType>, GraphSchemaError> {
        names.iter().map(|m| self.get_node(m)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_type_resolution() {
        let movie = NodeType::new("Movie");
        let series = NodeType::new("Series");
        let schema = GraphSchema::build(
            vec![movie, series],
            vec![InterfaceType {
                name: "Production".to_string(),
                properties: vec![],
                relationships: vec![],
                members: vec!["Movie".to_string(), "Series".to_string()],
            }],
            vec![],
            vec![],
        );

        assert!(matches!(schema.target_type("Movie"), Ok(TargetType::Node(_))));
        let production = schema.target_type("Production").unwrap();
        assert!(production.is_polymorphic());
        assert_eq!(production.members().len(), 2);
        assert!(schema.target_type("Nope").is_err());
    }

    #[test]
    fn test_property_alias_and_labels() {
        let mut node = NodeType::new("Movie");
        node.additional_labels = vec!["Production".to_string()];
        let mut title = PropertySchema::new("name", ScalarKind::String);
        title.alias = Some("title".to_string());
        node.properties.push(title);

        assert_eq!(node.labels(), vec!["Movie", "Production"]);
        assert_eq!(node.property("name").unwrap().db_name(), "title");
        assert!(node.tie_breaker().is_none());
    }
}
