//! Mutation builder: create, update and delete roots and the nested
//! relationship operations under them.
//!
//! Every nested operation runs in its own `CALL` subquery importing the
//! parent variable and ending in `RETURN count(*)`, so it never changes the
//! number of parent rows:
//!
//! ```text
//! CALL {
//!     WITH this
//!     MATCH (this1:Actor)
//!     WHERE this1.name = $param1
//!     MERGE (this)<-[this2:ACTED_IN]-(this1)
//!     RETURN count(*) AS var3
//! }
//! ```
//!
//! Within one relationship field the operations run in a fixed order:
//! delete, disconnect, update, create, connect, connectOrCreate. To-one
//! fields touched by a mutation are re-counted afterwards and asserted.

mod connect;
mod create;
mod delete;
mod disconnect;
mod properties;
mod update;


use serde_json::{Map, Value};

use super::authorization::{self, RELATIONSHIP_CARDINALITY};
use super::errors::QueryPlannerError;
use super::pattern::{match_node, node_pattern, root_match, root_node};
use super::plan_ctx::PlanCtx;
use super::projection::project_target;
use crate::graph_catalog::{
    NodeType, Operation, RelationshipField, TargetType, ValidationPhase,
};
use crate::request::Request;
use crate::render_plan::clause::Clause;
use crate::render_plan::{
    ClauseTree, CypherExpr, DeleteClause, MatchClause, NodePattern, Operator, Pattern,
    ProjectionItem, RelationshipPattern, UnwindClause, Variable,
};
use crate::result_shaper::ResultShape;

/// Node variable bound during a mutation, with its concrete type
#[derive(Debug, Clone)]
pub(crate) struct Bound<'a> {
    pub node: &'a NodeType,
    pub variable: Variable,
}

/// Which relationship operations an input may carry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Create,
    Update,
}

const OPERATION_ORDER: [&str; 6] = [
    "delete",
    "disconnect",
    "update",
    "create",
    "connect",
    "connectOrCreate",
];

impl Mode {
    fn allows(self, operation: &str) -> bool {
        match self {
            Mode::Create => matches!(operation, "create" | "connect" | "connectOrCreate"),
            Mode::Update => operation == "where" || OPERATION_ORDER.contains(&operation),
        }
    }
}

/// `[{...}, {...}]` or a single `{...}`
fn input_items<'v>(
    argument: &str,
    value: &'v Value,
) -> Result<Vec<&'v Map<String, Value>>, QueryPlannerError> {
    match value {
        Value::Array(items) => items.iter().map(|item| input_object(argument, item)).collect(),
        Value::Object(map) => Ok(vec![map]),
        _ => Err(QueryPlannerError::invalid_argument(
            argument,
            "expected an object or a list of objects",
        )),
    }
}

fn input_object<'v>(
    argument: &str,
    value: &'v Value,
) -> Result<&'v Map<String, Value>, QueryPlannerError> {
    value
        .as_object()
        .ok_or_else(|| QueryPlannerError::invalid_argument(argument, "expected an object"))
}

fn get<'v>(map: &'v Map<String, Value>, key: &str) -> Option<&'v Value> {
    map.get(key).filter(|v| !v.is_null())
}

/// Inputs per concrete member: node targets take the input as is,
/// polymorphic targets key it by member type name
fn member_inputs<'a, 'v>(
    target: &TargetType<'a>,
    argument: &str,
    value: &'v Value,
) -> Result<Vec<(&'a NodeType, &'v Value)>, QueryPlannerError> {
    if let TargetType::Node(node) = target {
        return Ok(vec![(*node, value)]);
    }
    let members = target.members();
    input_object(argument, value)?
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(name, value)| {
            members
                .iter()
                .find(|member| member.name == *name)
                .map(|member| (*member, value))
                .ok_or_else(|| {
                    QueryPlannerError::schema_mismatch(target.name(), name, "not a member type")
                })
        })
        .collect()
}

/// `(parent)-[edge:TYPE]->(related)` between two bound variables
fn edge_pattern(
    parent: &Variable,
    field: &RelationshipField,
    edge: Option<&Variable>,
    related: &Variable,
) -> Pattern {
    Pattern::hop(
        NodePattern::bound(parent),
        RelationshipPattern {
            variable: edge.cloned(),
            rel_type: field.rel_type.clone(),
            direction: field.direction,
        },
        NodePattern::bound(related),
    )
}

/// Close a nested operation body and run it under `parent`
fn nested_call(ctx: &mut PlanCtx, parent: &Variable, body: Vec<Clause>) -> Clause {
    let mut tree = ClauseTree::from(body);
    let count = ctx.value_var();
    tree.push(Clause::return_items(vec![ProjectionItem::aliased(
        CypherExpr::CountStar,
        &count,
    )]));
    Clause::call(vec![parent.clone()], tree)
}

/// Recount a to-one relationship and assert it holds one node (or at most
/// one when nullable)
fn cardinality_clauses(
    ctx: &mut PlanCtx,
    bound: &Bound,
    field: &RelationshipField,
    target: &TargetType,
) -> Vec<Clause> {
    let edge = ctx.pattern_var();
    let count = ctx.value_var();
    let end = NodePattern {
        variable: None,
        labels: target
            .as_node()
            .map(|node| node.labels().into_iter().map(String::from).collect())
            .unwrap_or_default(),
        properties: vec![],
    };
    let mut body = ClauseTree::new();
    body.push(Clause::Match(MatchClause {
        optional: false,
        patterns: vec![Pattern::hop(
            NodePattern::bound(&bound.variable),
            RelationshipPattern {
                variable: Some(edge.clone()),
                rel_type: field.rel_type.clone(),
                direction: field.direction,
            },
            end,
        )],
        predicate: None,
    }));
    body.push(Clause::return_items(vec![ProjectionItem::aliased(
        CypherExpr::function("count", vec![edge.expr()]),
        &count,
    )]));

    let operator = if field.nullable {
        Operator::LessThanEqual
    } else {
        Operator::Equal
    };
    vec![
        Clause::call(vec![bound.variable.clone()], body),
        Clause::with_star(),
        authorization::assertion(
            CypherExpr::binary(operator, count.expr(), CypherExpr::integer(1)),
            RELATIONSHIP_CARDINALITY,
        ),
    ]
}

/// Relationship operations in a create or update input of `bound`, followed
/// by the cardinality checks of the to-one fields they may have changed.
fn relationship_operations<'a>(
    ctx: &mut PlanCtx<'a>,
    bound: &Bound<'a>,
    input: &Map<String, Value>,
    mode: Mode,
) -> Result<Vec<Clause>, QueryPlannerError> {
    let mut clauses = vec![];
    let mut to_one: Vec<&'a RelationshipField> = vec![];

    for (key, value) in input {
        let Some(field) = bound.node.relationship(key) else {
            continue;
        };
        if value.is_null() {
            continue;
        }
        let target = ctx.schema().target_type(&field.target)?;
        for (member, member_value) in member_inputs(&target, key, value)? {
            let items = match mode {
                Mode::Create => vec![input_object(key, member_value)?],
                Mode::Update => input_items(key, member_value)?,
            };
            for item in items {
                clauses.extend(field_operations(ctx, bound, field, member, item, mode)?);
            }
        }
        if !field.is_list() {
            to_one.push(field);
        }
    }

    if mode == Mode::Create {
        for field in &bound.node.relationships {
            if !field.is_list() && !field.nullable && !to_one.iter().any(|f| f.name == field.name) {
                to_one.push(field);
            }
        }
    }
    for field in to_one {
        let target = ctx.schema().target_type(&field.target)?;
        clauses.extend(cardinality_clauses(ctx, bound, field, &target));
    }
    Ok(clauses)
}

/// The operations of one relationship input item, in execution order
fn field_operations<'a>(
    ctx: &mut PlanCtx<'a>,
    parent: &Bound<'a>,
    field: &RelationshipField,
    member: &'a NodeType,
    item: &Map<String, Value>,
    mode: Mode,
) -> Result<Vec<Clause>, QueryPlannerError> {
    if let Some(key) = item.keys().find(|key| !mode.allows(key)) {
        return Err(QueryPlannerError::invalid_argument(
            format!("{}.{}", field.name, key),
            "not a relationship operation here",
        ));
    }

    let mut clauses = vec![];
    for operation in OPERATION_ORDER {
        let Some(value) = get(item, operation) else {
            continue;
        };
        let nested = match operation {
            "delete" => delete::delete_related(ctx, parent, field, member, value)?,
            "disconnect" => disconnect::disconnect(ctx, parent, field, member, value)?,
            "update" => {
                update::update_related(ctx, parent, field, member, get(item, "where"), value)?
            }
            "create" => create::create_related(ctx, parent, field, member, value)?,
            "connect" => connect::connect(ctx, parent, field, member, value)?,
            _ => connect::connect_or_create(ctx, parent, field, member, value)?,
        };
        clauses.extend(nested);
    }
    Ok(clauses)
}

/// Operations keyed by relationship field, as in nested `connect`,
/// `disconnect` and `delete` inputs
fn keyed_operations<'a, F>(
    ctx: &mut PlanCtx<'a>,
    parent: &Bound<'a>,
    argument: &str,
    input: &Value,
    mut operation: F,
) -> Result<Vec<Clause>, QueryPlannerError>
where
    F: FnMut(
        &mut PlanCtx<'a>,
        &Bound<'a>,
        &'a RelationshipField,
        &'a NodeType,
        &Value,
    ) -> Result<Vec<Clause>, QueryPlannerError>,
{
    let mut clauses = vec![];
    for (key, value) in input_object(argument, input)? {
        if value.is_null() {
            continue;
        }
        let field = parent
            .node
            .relationship(key)
            .ok_or_else(|| QueryPlannerError::unknown_field(&parent.node.name, key))?;
        let target = ctx.schema().target_type(&field.target)?;
        for (member, member_value) in member_inputs(&target, key, value)? {
            clauses.extend(operation(ctx, parent, field, member, member_value)?);
        }
    }
    Ok(clauses)
}

/// Projection of the mutated nodes, one row each
fn project_mutated<'a>(
    ctx: &mut PlanCtx<'a>,
    bound: &Bound<'a>,
    request: &Request,
) -> Result<(Vec<Clause>, ResultShape), QueryPlannerError> {
    let target = TargetType::Node(bound.node);
    let projected = project_target(ctx, &target, &bound.variable, &request.selection)?;
    let mut clauses = projected.clauses;
    clauses.push(Clause::return_items(vec![ProjectionItem::aliased(
        projected.expr,
        &bound.variable,
    )]));
    Ok((clauses, projected.shape))
}

/// `CALL { CREATE (this0:Movie) ... RETURN this0 } ... UNWIND [this0, ...] AS this`
pub(super) fn plan_create<'a>(
    ctx: &mut PlanCtx<'a>,
    request: &Request,
) -> Result<(Vec<Clause>, ResultShape), QueryPlannerError> {
    let node = root_node(ctx, &request.type_name, "create")?;
    let input = request
        .arg("input")
        .ok_or_else(|| QueryPlannerError::invalid_argument("input", "required"))?;
    let items = input_items("input", input)?;
    if items.is_empty() {
        return Err(QueryPlannerError::invalid_argument(
            "input",
            "at least one node to create is required",
        ));
    }

    let mut clauses = Vec::with_capacity(items.len() + 2);
    let mut created = Vec::with_capacity(items.len());
    for item in items {
        let variable = ctx.pattern_var();
        let bound = Bound {
            node,
            variable: variable.clone(),
        };
        let mut body = ClauseTree::from(create::create_node(ctx, &bound, item, None)?);
        body.push(Clause::return_items(vec![ProjectionItem::variable(&variable)]));
        clauses.push(Clause::call(vec![], body));
        created.push(variable.expr());
    }

    let this = Variable::this();
    clauses.push(Clause::Unwind(UnwindClause {
        expr: CypherExpr::List(created),
        alias: this.clone(),
    }));
    let (projection, shape) = project_mutated(ctx, &Bound { node, variable: this }, request)?;
    clauses.extend(projection);
    Ok((clauses, shape))
}

/// `MATCH (this:Movie) ... SET ... RETURN this { ... } AS this`
pub(super) fn plan_update<'a>(
    ctx: &mut PlanCtx<'a>,
    request: &Request,
) -> Result<(Vec<Clause>, ResultShape), QueryPlannerError> {
    let node = root_node(ctx, &request.type_name, "update")?;
    let this = Variable::this();
    let bound = Bound {
        node,
        variable: this.clone(),
    };

    let mut clauses = match_node(
        ctx,
        root_match(&this, node),
        node,
        &this,
        request.arg("where"),
        Operation::Update,
        Some(ValidationPhase::Before),
    )?;
    if let Some(input) = request.arg("update") {
        clauses.extend(update::update_node(ctx, &bound, input_object("update", input)?)?);
    }
    clauses.extend(authorization::validate_clauses(
        ctx,
        node,
        &this,
        Operation::Update,
        ValidationPhase::After,
    )?);

    let (projection, shape) = project_mutated(ctx, &bound, request)?;
    clauses.extend(projection);
    Ok((clauses, shape))
}

/// `MATCH (this:Movie) ... DETACH DELETE this`
pub(super) fn plan_delete<'a>(
    ctx: &mut PlanCtx<'a>,
    request: &Request,
) -> Result<(Vec<Clause>, ResultShape), QueryPlannerError> {
    let node = root_node(ctx, &request.type_name, "delete")?;
    let this = Variable::this();
    let bound = Bound {
        node,
        variable: this.clone(),
    };

    let mut clauses = match_node(
        ctx,
        root_match(&this, node),
        node,
        &this,
        request.arg("where"),
        Operation::Delete,
        Some(ValidationPhase::Before),
    )?;
    if let Some(nested) = request.arg("delete") {
        clauses.extend(delete::nested_deletes(ctx, &bound, nested)?);
    }
    clauses.push(Clause::Delete(DeleteClause {
        detach: true,
        targets: vec![this],
    }));
    ctx.summary_mut().nodes_deleted += 1;
    Ok((clauses, ResultShape::Scalar))
}

/// `CREATE (this0:Movie)` pattern of a fresh node
fn create_pattern(bound: &Bound) -> Pattern {
    Pattern::node(node_pattern(&bound.variable, bound.node))
}
