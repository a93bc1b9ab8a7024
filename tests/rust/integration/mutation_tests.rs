use serde_json::json;

use cypher_compiler::compile;
use cypher_compiler::config::CompilerConfig;
use cypher_compiler::errors::RequestError;
use cypher_compiler::request::{ExecutionContext, Request, SelectedField, Selection};

use super::test_schemas::{compile_ok, notes_schema};

#[test]
fn test_create_with_nested_create_and_connect() {
    let request = Request::create("Movie")
        .args(json!({"input": [{
            "id": "m1",
            "title": "Heat",
            "actors": {"create": [{"node": {"name": "Al"}, "edge": {"role": "Neil"}}]},
            "director": {"connect": {"where": {"node": {"name_EQ": "Mann"}}}}
        }]}))
        .select(Selection::new(vec![
            SelectedField::new("title"),
            SelectedField::new("actors").select(Selection::of(&["name"])),
        ]));
    let compiled = compile_ok(&request, &ExecutionContext::anonymous());
    let cypher = &compiled.cypher;

    let created = cypher.find("CREATE (this1:Actor)").unwrap();
    let connected = cypher.find("MERGE (this0)<-[:DIRECTED]-(this").unwrap();
    let checked = cypher.find("\"@cypher-compiler/RELATIONSHIP-CARDINALITY\"").unwrap();
    assert!(created < connected && connected < checked, "{}", cypher);
    assert!(cypher.contains("UNWIND [this0] AS this"));
    assert!(cypher.contains("RETURN this { .title, actors: var"));

    assert_eq!(
        compiled.expected_summary_keys,
        vec!["nodesCreated", "relationshipsCreated", "propertiesSet"]
    );
    assert_eq!(compiled.summary.nodes_created, 2);
    assert_eq!(compiled.summary.relationships_created, 2);
}

#[test]
fn test_delete_counts_cascaded_nodes() {
    let request = Request::delete("Movie").args(json!({
        "where": {"id_EQ": "m1"},
        "delete": {"actors": [{"where": {"node": {"name_EQ": "Al"}}}]}
    }));
    let compiled = compile_ok(&request, &ExecutionContext::anonymous());

    let nested = compiled.cypher.find("DETACH DELETE this1").unwrap();
    let root = compiled.cypher.rfind("DETACH DELETE this").unwrap();
    assert!(nested < root);
    assert_eq!(compiled.expected_summary_keys, vec!["nodesDeleted"]);
    assert_eq!(compiled.summary.nodes_deleted, 2);
}

#[test]
fn test_update_operators() {
    let request = Request::update("Movie")
        .args(json!({
            "where": {"id_EQ": "m1"},
            "update": {"title_SET": "Heat (1995)", "released_SET": "1995-12-15"}
        }))
        .select(Selection::of(&["title"]));
    let compiled = compile_ok(&request, &ExecutionContext::anonymous());

    assert_eq!(
        compiled.cypher,
        "MATCH (this:Movie)
WHERE this.id = $param0
SET this.title = $param1, this.released = date($param2)
RETURN this { .title } AS this"
    );
    assert_eq!(compiled.expected_summary_keys, vec!["propertiesSet"]);
}

#[test]
fn test_deprecated_set_alias_follows_configuration() {
    let schema = notes_schema();
    let request = Request::update("Movie").args(json!({"update": {"title": "Heat"}}));
    let context = ExecutionContext::anonymous();

    assert!(compile(&schema, &request, &context, &CompilerConfig::default()).is_ok());

    let strict = CompilerConfig {
        allow_deprecated_aliases: false,
        ..CompilerConfig::default()
    };
    let err = compile(&schema, &request, &context, &strict).unwrap_err();
    assert!(matches!(err, RequestError::Planning(_)));
}

#[test]
fn test_invalid_input_emits_nothing() {
    let schema = notes_schema();
    let config = CompilerConfig::default();
    let context = ExecutionContext::anonymous();

    // one invalid item fails the whole request
    let request = Request::create("Movie").args(json!({"input": [
        {"id": "m1", "title": "Heat"},
        {"title": "Ronin"}
    ]}));
    assert!(compile(&schema, &request, &context, &config).is_err());

    let request = Request::update("Movie").args(json!({"update": {"title_SET": "a", "title": "b"}}));
    assert!(compile(&schema, &request, &context, &config).is_err());
}
