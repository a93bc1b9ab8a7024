//! Schemas shared by the integration tests

use cypher_compiler::config::CompilerConfig;
use cypher_compiler::graph_catalog::{GraphSchema, GraphSchemaConfig};
use cypher_compiler::request::{ExecutionContext, Request};
use cypher_compiler::{compile, CompiledQuery};

pub const NOTES_SCHEMA: &str = r#"
name: notes
graph_schema:
  nodes:
    - name: Movie
      properties:
        - { name: id, type: ID, unique: true, nullable: false }
        - { name: title, type: String }
        - { name: released, type: Date }
      relationships:
        - { name: actors, type: ACTED_IN, target: Actor, direction: IN, properties: ActedIn }
        - { name: director, type: DIRECTED, target: Person, direction: IN, cardinality: ONE }
    - name: Actor
      properties:
        - { name: id, type: ID, unique: true }
        - { name: name, type: String }
    - name: Person
      properties:
        - { name: id, type: ID, unique: true }
        - { name: name, type: String }
    - name: Note
      properties:
        - { name: id, type: ID, unique: true }
        - { name: markedAsDone, type: Boolean }
      relationships:
        - { name: clippedFrom, type: CLIPPED_FROM, target: Clip, direction: OUT, cardinality: ONE }
    - name: Clip
      properties:
        - { name: id, type: ID, unique: true }
    - name: User
      properties:
        - { name: id, type: ID, unique: true }
    - name: Post
      properties:
        - { name: id, type: ID, unique: true }
        - { name: content, type: String }
      relationships:
        - { name: owner, type: HAS_POST, target: User, direction: IN, cardinality: ONE, nullable: false }
      authorization:
        - kind: filter
          where: { node: { owner: { id_EQ: "$jwt.sub" } } }
        - kind: filter
          requireAuthentication: false
          where: { jwt: { roles_INCLUDES: "admin" } }
        - kind: validate
          operations: [CREATE, UPDATE, DELETE]
          where: { node: { owner: { id_EQ: "$jwt.sub" } } }
    - name: Audit
      properties:
        - { name: id, type: ID, unique: true }
      authentication:
        operations: [READ, CREATE]
  relationship_properties:
    - name: ActedIn
      properties:
        - { name: role, type: String }
"#;

pub fn notes_schema() -> GraphSchema {
    GraphSchemaConfig::from_yaml_str(NOTES_SCHEMA)
        .and_then(|config| config.to_graph_schema())
        .unwrap_or_else(|e| panic!("notes schema must load: {}", e))
}

/// Compile with the default configuration, panicking on failure
pub fn compile_ok(request: &Request, context: &ExecutionContext) -> CompiledQuery {
    let _ = env_logger::builder().is_test(true).try_init();
    compile(&notes_schema(), request, context, &CompilerConfig::default())
        .unwrap_or_else(|e| panic!("{:?} failed to compile: {}", request.kind, e))
}
