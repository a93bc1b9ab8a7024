use super::errors::GraphSchemaError;
use super::graph_schema::{GraphSchema, InterfaceType, NodeType, RelationshipProperties, UnionType};
use super::schema_validator::SchemaValidator;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Schema models are produced by the upstream schema compiler and handed over
/// as YAML or JSON with the following structure:
///
/// ```yaml
/// name: movies                  # Optional schema name
/// graph_schema:
///   nodes:
///     - name: Movie             # Type name (also __typename)
///       label: Movie            # Optional, defaults to name
///       properties:
///         - { name: id, type: ID, unique: true, nullable: false }
///         - { name: title, type: String }
///       relationships:
///         - name: actors
///           type: ACTED_IN
///           target: Actor
///           direction: IN
///           properties: ActedIn
///       authorization:
///         - kind: filter
///           where: { node: { owner: { id_EQ: "$jwt.sub" } } }
///   interfaces: []
///   unions: []
///   relationship_properties:
///     - name: ActedIn
///       properties:
///         - { name: screenTime, type: Int }
/// ```
///
/// # Usage
///
/// ```ignore
/// let schema = GraphSchemaConfig::from_yaml_file("schema.yaml")?.to_graph_schema()?;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSchemaConfig {
    /// Optional schema name (used in log output only)
    #[serde(default)]
    pub name: Option<String>,
    pub graph_schema: GraphSchemaDefinition,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphSchemaDefinition {
    pub nodes: Vec<NodeType>,
    #[serde(default)]
    pub interfaces: Vec<InterfaceType>,
    #[serde(default)]
    pub unions: Vec<UnionType>,
    #[serde(default)]
    pub relationship_properties: Vec<RelationshipProperties>,
}

impl GraphSchemaConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, GraphSchemaError> {
        serde_yaml::from_str(yaml).map_err(|e| GraphSchemaError::ConfigParseError {
            error: e.to_string(),
        })
    }

    pub fn from_json_str(json: &str) -> Result<Self, GraphSchemaError> {
        serde_json::from_str(json).map_err(|e| GraphSchemaError::ConfigParseError {
            error: e.to_string(),
        })
    }

    /// Load from a file; `.json` files are parsed as JSON, everything else as YAML
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, GraphSchemaError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| GraphSchemaError::ConfigReadError {
            error: format!("{}: {}", path.display(), e),
        })?;

        if path.extension().is_some_and(|ext| ext == "json") {
            Self::from_json_str(&content)
        } else {
            Self::from_yaml_str(&content)
        }
    }

    /// Build the immutable schema model and check its structural invariants.
    pub fn to_graph_schema(&self) -> Result<GraphSchema, GraphSchemaError> {
        let definition = &self.graph_schema;
        let schema = GraphSchema::build(
            definition.nodes.clone(),
            definition.interfaces.clone(),
            definition.unions.clone(),
            definition.relationship_properties.clone(),
        );

        SchemaValidator::new(&schema).validate()?;

        log::info!(
            "Loaded graph schema '{}': {} node types, {} interfaces, {} unions",
            self.name.as_deref().unwrap_or("default"),
            schema.nodes().len(),
            schema.interfaces().len(),
            schema.unions().len()
        );
        Ok(schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph_catalog::graph_schema::{Cardinality, Direction, ScalarKind};

    const MOVIES_YAML: &str = r#"
name: movies
graph_schema:
  nodes:
    - name: Movie
      properties:
        - { name: id, type: ID, unique: true, nullable: false }
        - { name: title, type: String }
        - { name: released, type: DateTime }
      relationships:
        - name: actors
          type: ACTED_IN
          target: Actor
          direction: IN
          properties: ActedIn
        - name: director
          type: DIRECTED
          target: Person
          direction: IN
          cardinality: ONE
    - name: Actor
      properties:
        - { name: name, type: String }
    - name: Person
      properties:
        - { name: name, type: String }
  relationship_properties:
    - name: ActedIn
      properties:
        - { name: screenTime, type: Int }
"#;

    #[test]
    fn test_load_yaml_schema() {
        let config = GraphSchemaConfig::from_yaml_str(MOVIES_YAML).unwrap();
        let schema = config.to_graph_schema().unwrap();

        let movie = schema.get_node("Movie").unwrap();
        assert_eq!(movie.main_label(), "Movie");
        assert_eq!(movie.property("released").unwrap().kind, ScalarKind::DateTime);
        assert!(movie.property("id").unwrap().unique);

        let actors = movie.relationship("actors").unwrap();
        assert_eq!(actors.direction, Direction::In);
        assert_eq!(actors.cardinality, Cardinality::Many);
        assert_eq!(actors.properties.as_deref(), Some("ActedIn"));

        let director = movie.relationship("director").unwrap();
        assert_eq!(director.cardinality, Cardinality::One);
    }

    #[test]
    fn test_dangling_target_is_rejected() {
        let yaml = r#"
graph_schema:
  nodes:
    - name: Movie
      relationships:
        - { name: actors, type: ACTED_IN, target: Ghost, direction: IN }
"#;
        let config = GraphSchemaConfig::from_yaml_str(yaml).unwrap();
        assert!(matches!(
            config.to_graph_schema(),
            Err(GraphSchemaError::InvalidReference { .. })
        ));
    }

    #[test]
    fn test_malformed_yaml() {
        let result = GraphSchemaConfig::from_yaml_str("graph_schema: [");
        assert!(matches!(result, Err(GraphSchemaError::ConfigParseError { .. })));
    }
}
