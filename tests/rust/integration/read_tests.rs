use serde_json::{json, Value};

use cypher_compiler::compile;
use cypher_compiler::config::CompilerConfig;
use cypher_compiler::errors::RequestError;
use cypher_compiler::query_planner::errors::QueryPlannerError;
use cypher_compiler::request::{ExecutionContext, Request, SelectedField, Selection};
use cypher_compiler::result_shaper::shape_rows;
use cypher_compiler::utils::cursor::Cursor;

use super::test_schemas::{compile_ok, notes_schema};

#[test]
fn test_read_by_id() {
    let request = Request::read("Movie")
        .args(json!({"where": {"id_EQ": "1"}}))
        .select(Selection::of(&["id"]));
    let compiled = compile_ok(&request, &ExecutionContext::anonymous());

    assert_eq!(
        compiled.cypher,
        "MATCH (this:Movie)\nWHERE this.id = $param0\nRETURN this { .id } AS this"
    );
    assert_eq!(Value::Object(compiled.params), json!({"param0": "1"}));
    assert!(compiled.expected_summary_keys.is_empty());
}

#[test]
fn test_negation_and_to_one_relationship_filter() {
    let request = Request::read("Note")
        .args(json!({"where": {
            "NOT": {"markedAsDone_EQ": true},
            "clippedFrom": {"id_EQ": "1234"}
        }}))
        .select(Selection::of(&["id"]));
    let compiled = compile_ok(&request, &ExecutionContext::anonymous());

    assert_eq!(
        compiled.cypher,
        "MATCH (this:Note)
OPTIONAL MATCH (this)-[:CLIPPED_FROM]->(this0:Clip)
WITH *, count(this0) AS var1
WITH *
WHERE (NOT (this.markedAsDone = $param0) AND (var1 <> 0 AND this0.id = $param1))
RETURN this { .id } AS this"
    );
    assert_eq!(compiled.params["param0"], json!(true));
    assert_eq!(compiled.params["param1"], json!("1234"));
}

#[test]
fn test_temporal_values_are_converted() {
    let request = Request::read("Movie")
        .args(json!({"where": {"released_GTE": "2020-01-01"}}))
        .select(Selection::of(&["title"]));
    let compiled = compile_ok(&request, &ExecutionContext::anonymous());
    assert!(compiled.cypher.contains("WHERE this.released >= date($param0)"));
}

#[test]
fn test_none_is_the_negation_of_some() {
    let filter = |quantifier: &str| {
        Request::read("Movie")
            .args(json!({"where": {format!("actors_{}", quantifier): {"name_EQ": "Keanu"}}}))
            .select(Selection::of(&["id"]))
    };
    let some = compile_ok(&filter("SOME"), &ExecutionContext::anonymous());
    let none = compile_ok(&filter("NONE"), &ExecutionContext::anonymous());

    assert_eq!(some.cypher.replace("} > 0", "} = 0"), none.cypher);
    assert_eq!(some.params, none.params);
}

#[test]
fn test_compilation_is_deterministic() {
    let request = Request::read("Movie")
        .args(json!({"where": {"OR": [{"title_CONTAINS": "Heat"}, {"actors_SOME": {"name_EQ": "Al"}}]}}))
        .select(Selection::new(vec![
            SelectedField::new("title"),
            SelectedField::new("actors")
                .args(json!({"where": {"name_STARTS_WITH": "A"}}))
                .select(Selection::of(&["name"])),
            SelectedField::new("director").select(Selection::of(&["name"])),
        ]));
    let context = ExecutionContext::authenticated(json!({"sub": "u1"}));

    let first = compile_ok(&request, &context);
    let second = compile_ok(&request, &context);
    assert_eq!(first, second);
    assert_eq!(
        first.params.keys().collect::<Vec<_>>(),
        vec!["param0", "param1", "param2"]
    );
}

fn movies_connection(args: Value) -> Request {
    Request::connection("Movie").args(args).select(Selection::new(vec![
        SelectedField::new("edges").select(Selection::new(vec![
            SelectedField::new("cursor"),
            SelectedField::new("node").select(Selection::of(&["title"])),
        ])),
        SelectedField::new("pageInfo").select(Selection::of(&["hasNextPage", "endCursor"])),
    ]))
}

#[test]
fn test_connection_cursors_resume_the_page() {
    let first_page = compile_ok(
        &movies_connection(json!({"first": 1, "sort": [{"node": {"title": "ASC"}}]})),
        &ExecutionContext::anonymous(),
    );
    assert!(first_page.result_shape.has_cursors());

    // what the database would return for the first page
    let mut rows = vec![json!({
        "edges": [{"cursor": ["Heat", "m1"], "node": {"title": "Heat"}}],
        "pageInfo": {"hasNextPage": true, "endCursor": ["Heat", "m1"]}
    })];
    shape_rows(&mut rows, &first_page.result_shape);

    let end_cursor = rows[0]["pageInfo"]["endCursor"]
        .as_str()
        .expect("cursor is encoded")
        .to_string();
    assert_eq!(rows[0]["edges"][0]["cursor"], json!(end_cursor));
    assert_eq!(
        end_cursor.parse::<Cursor>().unwrap(),
        Cursor::Keyset(vec![json!("Heat"), json!("m1")])
    );

    let second_page = compile_ok(
        &movies_connection(json!({
            "first": 1,
            "after": end_cursor,
            "sort": [{"node": {"title": "ASC"}}]
        })),
        &ExecutionContext::anonymous(),
    );
    assert!(second_page.cypher.contains("this.title > $param0"), "{}", second_page.cypher);
    assert_eq!(second_page.params["param0"], json!("Heat"));
    assert_eq!(second_page.params["param1"], json!("m1"));
}

#[test]
fn test_null_sort_key_resumes_among_nulls() {
    let after = Cursor::Keyset(vec![Value::Null, json!("m1")]).encode();
    let compiled = compile_ok(
        &movies_connection(json!({
            "first": 1,
            "after": after,
            "sort": [{"node": {"title": "ASC"}}]
        })),
        &ExecutionContext::anonymous(),
    );

    assert!(
        compiled.cypher.contains("WHERE (this.title IS NULL AND this.id > $param0)"),
        "{}",
        compiled.cypher
    );
    assert_eq!(compiled.params["param0"], json!("m1"));
    assert!(compiled.params.values().all(|value| !value.is_null()));
}

#[test]
fn test_oversized_paging_is_a_client_error() {
    let schema = notes_schema();
    let config = CompilerConfig::default();
    let context = ExecutionContext::anonymous();

    let request = movies_connection(json!({"first": 4294967295u64}));
    let err = compile(&schema, &request, &context, &config).unwrap_err();
    assert!(matches!(
        err,
        RequestError::Planning(QueryPlannerError::InvalidArgument { .. })
    ));
    assert!(err.is_client_error());

    let request = movies_connection(json!({"after": Cursor::Offset(u64::MAX).encode()}));
    let err = compile(&schema, &request, &context, &config).unwrap_err();
    assert!(matches!(
        err,
        RequestError::Planning(QueryPlannerError::InvalidCursor { .. })
    ));
}
