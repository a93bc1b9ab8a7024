use serde_json::json;

use cypher_compiler::compile;
use cypher_compiler::config::CompilerConfig;
use cypher_compiler::errors::RequestError;
use cypher_compiler::query_planner::errors::QueryPlannerError;
use cypher_compiler::request::{ExecutionContext, Request, Selection};

use super::test_schemas::{compile_ok, notes_schema};

fn posts() -> Request {
    Request::read("Post").select(Selection::of(&["id"]))
}

#[test]
fn test_admin_role_admits_rows_regardless_of_owner() {
    let context = ExecutionContext::authenticated(json!({"roles": ["admin"]}));
    let compiled = compile_ok(&posts(), &context);

    assert_eq!(
        compiled.cypher,
        "MATCH (this:Post)
CALL {
    WITH this
    OPTIONAL MATCH (this)<-[:HAS_POST]-(this0:User)
    WITH *, count(this0) AS var1
    RETURN (var1 <> 0 AND ($jwt.sub IS NOT NULL AND this0.id = $jwt.sub)) AS var2
}
WITH *
WHERE (($isAuthenticated = true AND var2 = true) OR ($jwt.roles IS NOT NULL AND $param0 IN $jwt.roles))
RETURN this { .id } AS this"
    );
    assert_eq!(compiled.params["param0"], json!("admin"));
    assert_eq!(compiled.params["jwt"], json!({"roles": ["admin"]}));
    assert_eq!(compiled.params["isAuthenticated"], json!(true));
}

#[test]
fn test_anonymous_caller_keeps_rules_without_authentication() {
    let compiled = compile_ok(&posts(), &ExecutionContext::anonymous());
    assert_eq!(
        compiled.cypher,
        "MATCH (this:Post)\nWHERE ($jwt.roles IS NOT NULL AND $param0 IN $jwt.roles)\nRETURN this { .id } AS this"
    );
}

#[test]
fn test_authentication_requirement_refuses_anonymous() {
    let schema = notes_schema();
    let config = CompilerConfig::default();
    let anonymous = ExecutionContext::anonymous();

    let read = Request::read("Audit").select(Selection::of(&["id"]));
    let err = compile(&schema, &read, &anonymous, &config).unwrap_err();
    assert!(matches!(
        err,
        RequestError::Planning(QueryPlannerError::Unauthenticated { .. })
    ));
    assert!(err.is_client_error());

    let create = Request::create("Audit").args(json!({"input": {"id": "a1"}}));
    assert!(compile(&schema, &create, &anonymous, &config).is_err());

    let authenticated = ExecutionContext::authenticated(json!({"sub": "u1"}));
    assert!(compile(&schema, &read, &authenticated, &config).is_ok());
}

#[test]
fn test_validate_rules_become_assertions() {
    let context = ExecutionContext::authenticated(json!({"sub": "u1"}));
    let request = Request::update("Post")
        .args(json!({"where": {"id_EQ": "p1"}, "update": {"content_SET": "edited"}}))
        .select(Selection::of(&["id"]));
    let compiled = compile_ok(&request, &context);

    let set = compiled.cypher.find("SET this.content").unwrap();
    let assertions: Vec<usize> = compiled
        .cypher
        .match_indices("\"@cypher-compiler/FORBIDDEN\"")
        .map(|(at, _)| at)
        .collect();
    // checked once before the write and once after it
    assert_eq!(assertions.len(), 2, "{}", compiled.cypher);
    assert!(assertions[0] < set && set < assertions[1]);

    let denied = RequestError::from_execution_message(
        "Failed to invoke procedure `apoc.util.validate`: @cypher-compiler/FORBIDDEN",
    );
    assert!(matches!(denied, Some(RequestError::AuthorizationDenied)));
}
