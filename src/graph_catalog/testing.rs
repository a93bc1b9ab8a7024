//! Shared schema fixtures for unit tests.

use super::config::GraphSchemaConfig;
use super::graph_schema::GraphSchema;

pub const TEST_SCHEMA_YAML: &str = r#"
name: test
graph_schema:
  nodes:
    - name: Movie
      properties:
        - { name: id, type: ID, unique: true, nullable: false }
        - { name: title, type: String }
        - { name: rating, type: Float }
        - { name: views, type: Int, default: 0 }
        - { name: released, type: DateTime }
        - { name: tags, type: String, list: true }
        - { name: published, type: Boolean }
      relationships:
        - { name: actors, type: ACTED_IN, target: Actor, direction: IN, properties: ActedIn }
        - { name: director, type: DIRECTED, target: Person, direction: IN, cardinality: ONE }
        - { name: genres, type: IN_GENRE, target: Genre, direction: OUT }
    - name: Series
      properties:
        - { name: id, type: ID, unique: true, nullable: false }
        - { name: title, type: String }
        - { name: episodes, type: Int }
      relationships:
        - { name: actors, type: ACTED_IN, target: Actor, direction: IN, properties: ActedIn }
    - name: Actor
      properties:
        - { name: id, type: ID, unique: true }
        - { name: name, type: String }
        - { name: age, type: Int }
      relationships:
        - { name: actedIn, type: ACTED_IN, target: Production, direction: OUT, properties: ActedIn }
        - { name: credits, type: CREDITED, target: Credit, direction: OUT }
    - name: Person
      properties:
        - { name: id, type: ID, unique: true }
        - { name: name, type: String }
    - name: Genre
      properties:
        - { name: name, type: String, unique: true }
      limit: { default: 20, max: 100 }
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
        - { name: name, type: String }
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
    - name: Secret
      properties:
        - { name: id, type: ID, unique: true }
      authentication:
        operations: [READ]
      authorization:
        - kind: filter
          where: { jwt: { roles_INCLUDES: "admin" } }
  interfaces:
    - name: Production
      properties:
        - { name: title, type: String }
      relationships:
        - { name: actors, type: ACTED_IN, target: Actor, direction: IN, properties: ActedIn }
      members: [Movie, Series]
  unions:
    - name: Credit
      members: [Movie, Series]
  relationship_properties:
    - name: ActedIn
      properties:
        - { name: screenTime, type: Int }
        - { name: role, type: String }
"#;

pub fn test_schema() -> GraphSchema {
    GraphSchemaConfig::from_yaml_str(TEST_SCHEMA_YAML)
        .and_then(|config| config.to_graph_schema())
        .expect("test schema must load")
}
