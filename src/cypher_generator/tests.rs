use serde_json::json;

use super::*;
use crate::graph_catalog::Direction;
use crate::render_plan::clause::Clause;
use crate::render_plan::{
    CypherExpr, MapProjectionItem, MatchClause, NodePattern, Operator, Param, Pattern,
    ProjectionItem, RelationshipPattern, Variable, VariableKind,
};

fn pattern_var(id: usize) -> Variable {
    Variable::Allocated {
        id,
        kind: VariableKind::Pattern,
    }
}

fn value_var(id: usize) -> Variable {
    Variable::Allocated {
        id,
        kind: VariableKind::Value,
    }
}

fn param(id: usize, value: serde_json::Value) -> CypherExpr {
    CypherExpr::Param(Param { id, value })
}

#[test]
fn test_simple_match_return() {
    let this = Variable::this();
    let mut tree = ClauseTree::new();
    tree.push(Clause::Match(MatchClause {
        optional: false,
        patterns: vec![Pattern::node(NodePattern::new(
            this.clone(),
            vec!["Movie".to_string()],
        ))],
        predicate: Some(this.property("id").eq(param(0, json!("1")))),
    }));
    tree.push(Clause::return_items(vec![ProjectionItem::aliased(
        CypherExpr::MapProjection {
            variable: this.clone(),
            items: vec![MapProjectionItem::Property("id".to_string())],
        },
        &this,
    )]));

    let generated = generate_cypher(&tree).unwrap();
    assert_eq!(
        generated.cypher,
        "MATCH (this:Movie)\nWHERE this.id = $param0\nRETURN this { .id } AS this"
    );
    assert_eq!(generated.params.get("param0"), Some(&json!("1")));
}

#[test]
fn test_names_follow_text_order_not_allocation_order() {
    // Allocated in reverse; emitted names must still count up left to right
    let this = Variable::this();
    let actor = pattern_var(7);
    let rel = pattern_var(9);
    let collected = value_var(3);

    let mut body = ClauseTree::new();
    body.push(Clause::Match(MatchClause {
        optional: false,
        patterns: vec![Pattern::hop(
            NodePattern::bound(&this),
            RelationshipPattern {
                variable: Some(rel.clone()),
                rel_type: "ACTED_IN".to_string(),
                direction: Direction::In,
            },
            NodePattern::new(actor.clone(), vec!["Actor".to_string()]),
        )],
        predicate: Some(CypherExpr::binary(
            Operator::StartsWith,
            actor.property("name"),
            param(5, json!("Ke")),
        )),
    }));
    body.push(Clause::return_items(vec![ProjectionItem::aliased(
        CypherExpr::function("collect", vec![actor.expr()]),
        &collected,
    )]));

    let mut tree = ClauseTree::new();
    tree.push(Clause::Match(MatchClause {
        optional: false,
        patterns: vec![Pattern::node(NodePattern::new(
            this.clone(),
            vec!["Movie".to_string()],
        ))],
        predicate: Some(this.property("title").eq(param(2, json!("Matrix")))),
    }));
    tree.push(Clause::call(vec![this.clone()], body));

    let generated = generate_cypher(&tree).unwrap();
    assert_eq!(
        generated.cypher,
        "MATCH (this:Movie)\n\
         WHERE this.title = $param0\n\
         CALL {\n    \
             WITH this\n    \
             MATCH (this)<-[this0:ACTED_IN]-(this1:Actor)\n    \
             WHERE this1.name STARTS WITH $param1\n    \
             RETURN collect(this1) AS var2\n\
         }"
    );
    let keys: Vec<&String> = generated.params.keys().collect();
    assert_eq!(keys, vec!["param0", "param1"]);
}

#[test]
fn test_shared_param_registered_once() {
    let this = Variable::this();
    let shared = param(0, json!(5));
    let predicate = CypherExpr::and_all(vec![
        CypherExpr::binary(Operator::GreaterThan, this.property("a"), shared.clone()),
        CypherExpr::binary(Operator::LessThan, this.property("b"), shared),
    ])
    .unwrap();

    let mut tree = ClauseTree::new();
    tree.push(Clause::filter(predicate));
    let generated = generate_cypher(&tree).unwrap();
    assert_eq!(
        generated.cypher,
        "WITH *\nWHERE (this.a > $param0 AND this.b < $param0)"
    );
    assert_eq!(generated.params.len(), 1);
}

#[test]
fn test_named_params_and_union_branches() {
    let jwt = CypherExpr::NamedParam {
        name: "jwt",
        value: json!({"sub": "u1"}),
    };
    let node = pattern_var(0);
    let branch = |label: &str| {
        let mut tree = ClauseTree::new();
        tree.push(Clause::Match(MatchClause {
            optional: false,
            patterns: vec![Pattern::node(NodePattern::new(
                node.clone(),
                vec![label.to_string()],
            ))],
            predicate: Some(node.property("owner").eq(jwt.clone().property("sub"))),
        }));
        tree.push(Clause::return_items(vec![ProjectionItem::aliased(
            node.expr(),
            &Variable::this(),
        )]));
        tree
    };

    let mut tree = ClauseTree::new();
    tree.push(Clause::Call(crate::render_plan::CallClause {
        imports: vec![],
        branches: vec![branch("Movie"), branch("Series")],
        union_all: false,
    }));
    let generated = generate_cypher(&tree).unwrap();
    assert!(generated.cypher.contains("\n    UNION\n"));
    assert!(generated.cypher.contains("WHERE this0.owner = $jwt.sub"));
    assert_eq!(generated.params.get("jwt"), Some(&json!({"sub": "u1"})));

    let mut tree = ClauseTree::new();
    tree.push(Clause::Call(crate::render_plan::CallClause {
        imports: vec![],
        branches: vec![branch("Movie"), branch("Series")],
        union_all: true,
    }));
    let generated = generate_cypher(&tree).unwrap();
    assert!(generated.cypher.contains("\n    UNION ALL\n"));
}

#[test]
fn test_empty_subquery_is_rejected() {
    let mut tree = ClauseTree::new();
    tree.push(Clause::call(vec![], ClauseTree::new()));
    assert_eq!(
        generate_cypher(&tree),
        Err(CypherGeneratorError::EmptySubquery)
    );
}
