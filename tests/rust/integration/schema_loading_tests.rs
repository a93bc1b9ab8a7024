use cypher_compiler::config::{CompilerConfig, ConfigError};
use cypher_compiler::errors::RequestError;
use cypher_compiler::graph_catalog::errors::GraphSchemaError;
use cypher_compiler::graph_catalog::GraphSchemaConfig;

use super::test_schemas::notes_schema;

#[test]
fn test_json_and_yaml_definitions_agree() {
    let json = r#"{
        "graph_schema": {
            "nodes": [
                {"name": "Clip", "properties": [{"name": "id", "type": "ID", "unique": true}]}
            ]
        }
    }"#;
    let yaml = r#"
graph_schema:
  nodes:
    - name: Clip
      properties:
        - { name: id, type: ID, unique: true }
"#;
    let from_json = GraphSchemaConfig::from_json_str(json)
        .and_then(|c| c.to_graph_schema())
        .unwrap();
    let from_yaml = GraphSchemaConfig::from_yaml_str(yaml)
        .and_then(|c| c.to_graph_schema())
        .unwrap();

    assert_eq!(
        from_json.get_node("Clip").unwrap(),
        from_yaml.get_node("Clip").unwrap()
    );
    assert!(notes_schema().get_node("Post").is_ok());
}

#[test]
fn test_dangling_relationship_target_is_rejected() {
    let yaml = r#"
graph_schema:
  nodes:
    - name: Note
      relationships:
        - { name: clippedFrom, type: CLIPPED_FROM, target: Clip, direction: OUT }
"#;
    let err = GraphSchemaConfig::from_yaml_str(yaml)
        .and_then(|c| c.to_graph_schema())
        .unwrap_err();
    assert!(matches!(err, GraphSchemaError::InvalidReference { .. }));

    let err: RequestError = err.into();
    assert!(!err.is_client_error());
}

#[test]
fn test_unknown_rule_operation_is_rejected() {
    let yaml = r#"
graph_schema:
  nodes:
    - name: Post
      authorization:
        - kind: validate
          operations: [PUBLISH]
          where: { node: { id_EQ: "$jwt.sub" } }
"#;
    assert!(matches!(
        GraphSchemaConfig::from_yaml_str(yaml),
        Err(GraphSchemaError::ConfigParseError { .. })
    ));
}

#[test]
fn test_compiler_config_limits_are_ordered() {
    let config = CompilerConfig::from_yaml_str("default_limit: 10\nmax_limit: 50\n").unwrap();
    assert_eq!(config.default_limit, Some(10));
    assert!(config.allow_deprecated_aliases);

    assert!(matches!(
        CompilerConfig::from_yaml_str("default_limit: 100\nmax_limit: 50\n"),
        Err(ConfigError::LimitOrder {
            default: 100,
            max: 50
        })
    ));
}
