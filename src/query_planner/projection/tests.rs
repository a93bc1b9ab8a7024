use serde_json::json;

use crate::config::CompilerConfig;
use crate::cypher_generator::{generate_cypher, GeneratedCypher};
use crate::graph_catalog::testing::test_schema;
use crate::query_planner::errors::QueryPlannerError;
use crate::query_planner::plan_ctx::PlanCtx;
use crate::query_planner::plan_request;
use crate::request::{ExecutionContext, Request, SelectedField, Selection};
use crate::result_shaper::ResultShape;
use crate::utils::cursor::Cursor;

fn compile(request: &Request) -> Result<(GeneratedCypher, ResultShape), QueryPlannerError> {
    let schema = test_schema();
    let context = ExecutionContext::anonymous();
    let config = CompilerConfig::default();
    let mut ctx = PlanCtx::new(&schema, &context, &config);
    let (tree, shape) = plan_request(&mut ctx, request)?;
    Ok((generate_cypher(&tree).unwrap(), shape))
}

#[test]
fn test_list_relationship_runs_in_subquery() {
    let request = Request::read("Movie").select(Selection::new(vec![
        SelectedField::new("title"),
        SelectedField::new("actors").select(Selection::of(&["name"])),
    ]));
    let (generated, _) = compile(&request).unwrap();

    assert_eq!(
        generated.cypher,
        "MATCH (this:Movie)
CALL {
    WITH this
    MATCH (this)<-[:ACTED_IN]-(this0:Actor)
    RETURN collect(this0 { .name }) AS var1
}
RETURN this { .title, actors: var1 } AS this"
    );
    assert!(generated.params.is_empty());
}

#[test]
fn test_to_one_relationship_takes_head() {
    let request = Request::read("Movie").select(Selection::new(vec![
        SelectedField::new("director").select(Selection::of(&["name"])),
    ]));
    let (generated, _) = compile(&request).unwrap();

    assert!(generated
        .cypher
        .contains("RETURN head(collect(this0 { .name })) AS var1"));
    assert!(generated.cypher.ends_with("RETURN this { director: var1 } AS this"));
}

#[test]
fn test_aliased_fields_keep_response_keys() {
    let request = Request::read("Movie").select(Selection::new(vec![
        SelectedField::new("title").alias("name"),
        SelectedField::new("actors")
            .alias("cast")
            .args(json!({"where": {"age_GT": 30}}))
            .select(Selection::of(&["name"])),
    ]));
    let (generated, _) = compile(&request).unwrap();

    assert!(generated.cypher.contains("WHERE this0.age > $param0"));
    assert!(generated
        .cypher
        .ends_with("RETURN this { name: this.title, cast: var1 } AS this"));
    assert_eq!(generated.params["param0"], json!(30));
}

#[test]
fn test_polymorphic_relationship_projects_each_member() {
    let request = Request::read("Actor").select(Selection::new(vec![
        SelectedField::new("actedIn").select(
            Selection::of(&["title"]).on_type("Series", vec![SelectedField::new("episodes")]),
        ),
    ]));
    let (generated, _) = compile(&request).unwrap();

    assert!(
        generated.cypher.contains(
            "CASE WHEN this0:Movie THEN this0 { __typename: \"Movie\", .title } \
             WHEN this0:Series THEN this0 { __typename: \"Series\", .title, .episodes } END"
        ),
        "{}",
        generated.cypher
    );
}

#[test]
fn test_unknown_field_is_refused() {
    let request = Request::read("Movie").select(Selection::of(&["budget"]));
    assert!(matches!(
        compile(&request),
        Err(QueryPlannerError::SchemaMismatch { field, .. }) if field == "budget"
    ));
}

#[test]
fn test_sort_and_type_limits() {
    let request = Request::read("Movie")
        .args(json!({"sort": [{"title": "DESC"}], "offset": 10, "limit": 5}))
        .select(Selection::of(&["title"]));
    let (generated, _) = compile(&request).unwrap();
    assert_eq!(
        generated.cypher,
        "MATCH (this:Movie)
WITH *
ORDER BY this.title DESC
SKIP $param0
LIMIT $param1
RETURN this { .title } AS this"
    );

    let request = Request::read("Genre").select(Selection::of(&["name"]));
    let (generated, _) = compile(&request).unwrap();
    assert_eq!(generated.params["param0"], json!(20));

    let request = Request::read("Genre")
        .args(json!({"limit": 500}))
        .select(Selection::of(&["name"]));
    let (generated, _) = compile(&request).unwrap();
    assert_eq!(generated.params["param0"], json!(100));

    let request = Request::read("Movie")
        .args(json!({"sort": [{"tags": "ASC"}]}))
        .select(Selection::of(&["title"]));
    assert!(matches!(
        compile(&request),
        Err(QueryPlannerError::SchemaMismatch { .. })
    ));
}

fn actors_connection(args: serde_json::Value) -> Request {
    Request::read("Movie").select(Selection::new(vec![SelectedField::new("actorsConnection")
        .args(args)
        .select(Selection::new(vec![
            SelectedField::new("totalCount"),
            SelectedField::new("edges").select(Selection::new(vec![
                SelectedField::new("cursor"),
                SelectedField::new("node").select(Selection::of(&["name"])),
                SelectedField::new("properties").select(Selection::of(&["role"])),
            ])),
            SelectedField::new("pageInfo").select(Selection::of(&["hasNextPage", "endCursor"])),
        ]))]))
}

#[test]
fn test_connection_pages_with_keyset_cursor() {
    let (generated, shape) =
        compile(&actors_connection(json!({"first": 2, "sort": [{"node": {"name": "ASC"}}]})))
            .unwrap();
    let cypher = &generated.cypher;

    assert!(cypher.contains("MATCH (this)<-[this0:ACTED_IN]-(this1:Actor)"), "{}", cypher);
    assert!(cypher.contains("ORDER BY this1.name ASC, this1.id ASC"), "{}", cypher);
    assert!(cypher.contains("cursor: [this1.name, this1.id]"), "{}", cypher);
    assert!(cypher.contains("properties: this0 { .role }"), "{}", cypher);
    // one row past the page to learn whether another page follows
    assert_eq!(generated.params["param0"], json!(3));
    assert_eq!(generated.params["param1"], json!(2));
    assert!(shape.has_cursors());

    let after = Cursor::Keyset(vec![json!("Al"), json!("a1")]).encode();
    let (generated, _) = compile(&actors_connection(json!({
        "first": 2,
        "after": after,
        "sort": [{"node": {"name": "ASC"}}]
    })))
    .unwrap();
    assert!(generated.cypher.contains("this1.name > $param0"), "{}", generated.cypher);
    assert!(generated.cypher.contains("this1.id > $param1"), "{}", generated.cypher);
    assert_eq!(generated.params["param0"], json!("Al"));
}

#[test]
fn test_connection_cursor_must_match_sort() {
    let after = Cursor::Keyset(vec![json!("a1")]).encode();
    let request = actors_connection(json!({"after": after, "sort": [{"node": {"name": "ASC"}}]}));
    assert!(matches!(
        compile(&request),
        Err(QueryPlannerError::InvalidCursor { .. })
    ));

    let request = actors_connection(json!({"after": "not a cursor"}));
    assert!(matches!(
        compile(&request),
        Err(QueryPlannerError::InvalidCursor { .. })
    ));
}

#[test]
fn test_connection_cursor_orders_nulls_like_order_by() {
    let page_after = |values: Vec<serde_json::Value>, direction: &str| {
        let after = Cursor::Keyset(values).encode();
        compile(&actors_connection(json!({
            "after": after,
            "sort": [{"node": {"name": direction}}]
        })))
        .unwrap()
        .0
    };

    // ascending, nulls come last and follow every value
    let generated = page_after(vec![json!("Al"), json!("a1")], "ASC");
    assert!(
        generated.cypher.contains(
            "((this1.name > $param0 OR this1.name IS NULL) OR \
             (this1.name = $param0 AND (this1.id > $param1 OR this1.id IS NULL)))"
        ),
        "{}",
        generated.cypher
    );

    let generated = page_after(vec![json!(null), json!("a1")], "ASC");
    assert!(
        generated
            .cypher
            .contains("(this1.name IS NULL AND (this1.id > $param0 OR this1.id IS NULL))"),
        "{}",
        generated.cypher
    );
    assert_eq!(generated.params["param0"], json!("a1"));
    assert!(generated.params.values().all(|value| !value.is_null()));

    // descending, nulls come first and every value follows them
    let generated = page_after(vec![json!(null), json!("a1")], "DESC");
    assert!(
        generated.cypher.contains(
            "(this1.name IS NOT NULL OR \
             (this1.name IS NULL AND (this1.id > $param0 OR this1.id IS NULL)))"
        ),
        "{}",
        generated.cypher
    );
}

#[test]
fn test_connection_offsets_stay_in_range() {
    let request = actors_connection(json!({"first": u32::MAX}));
    assert!(matches!(
        compile(&request),
        Err(QueryPlannerError::InvalidArgument { argument, .. }) if argument == "first"
    ));

    for offset in [u64::MAX, u64::from(u32::MAX)] {
        let after = Cursor::Offset(offset).encode();
        assert!(matches!(
            compile(&actors_connection(json!({"after": after}))),
            Err(QueryPlannerError::InvalidCursor { .. })
        ));
    }

    let after = Cursor::Offset(4).encode();
    let (generated, _) = compile(&actors_connection(json!({"first": 2, "after": after}))).unwrap();
    assert!(generated.cypher.contains("SKIP $param0"), "{}", generated.cypher);
    assert_eq!(generated.params["param0"], json!(5));
}

#[test]
fn test_relationship_aggregate_selection() {
    let request = Request::read("Movie").select(Selection::new(vec![
        SelectedField::new("actorsAggregate").select(Selection::new(vec![
            SelectedField::new("count"),
            SelectedField::new("node").select(Selection::new(vec![
                SelectedField::new("age").select(Selection::of(&["min", "average"])),
            ])),
            SelectedField::new("edge").select(Selection::new(vec![
                SelectedField::new("screenTime").select(Selection::of(&["sum"])),
            ])),
        ])),
    ]));
    let (generated, _) = compile(&request).unwrap();

    assert!(
        generated.cypher.contains(
            "RETURN { count: count(this1), node: { age: { min: min(this1.age), average: avg(this1.age) } }, \
             edge: { screenTime: { sum: sum(this0.screenTime) } } } AS var2"
        ),
        "{}",
        generated.cypher
    );

    let request = Request::read("Movie").select(Selection::new(vec![
        SelectedField::new("actorsAggregate").select(Selection::new(vec![
            SelectedField::new("node").select(Selection::new(vec![
                SelectedField::new("name").select(Selection::of(&["sum"])),
            ])),
        ])),
    ]));
    assert!(matches!(
        compile(&request),
        Err(QueryPlannerError::SchemaMismatch { .. })
    ));
}
