//! Root planners of the read requests: lists, connections and aggregations.

use serde_json::{Map, Value};

use super::arguments::{parse_count, parse_sort};
use super::errors::QueryPlannerError;
use super::filter::{compile_filter, FilterOptions, FilterTarget, Predicate};
use super::pattern::{bind_guarded, match_node, root_match, root_node};
use super::plan_ctx::PlanCtx;
use super::projection::{
    aggregate_fields, connection_clauses, order_and_page, paged, project_node, project_target,
    sort_expr, AggregateSource, ConnectionArgs, ConnectionInput, Source,
};
use crate::graph_catalog::{Operation, TargetType, ValidationPhase};
use crate::request::Request;
use crate::render_plan::clause::Clause;
use crate::render_plan::{
    CallClause, ClauseTree, CypherExpr, OrderByItem, ProjectionItem, Variable,
};
use crate::result_shaper::ResultShape;

fn arg<'v>(args: &'v Map<String, Value>, name: &str) -> Option<&'v Value> {
    args.get(name).filter(|v| !v.is_null())
}

/// `MATCH (this:Movie) WHERE ... RETURN this { ... } AS this`
pub(super) fn plan_read<'a>(
    ctx: &mut PlanCtx<'a>,
    request: &Request,
) -> Result<(Vec<Clause>, ResultShape), QueryPlannerError> {
    let target = ctx.schema().target_type(&request.type_name)?;
    let TargetType::Node(node) = target else {
        return plan_polymorphic_read(ctx, &target, request);
    };

    let this = Variable::this();
    let mut clauses = match_node(
        ctx,
        root_match(&this, node),
        node,
        &this,
        request.arg("where"),
        Operation::Read,
        Some(ValidationPhase::After),
    )?;
    let projected = project_target(ctx, &target, &this, &request.selection)?;
    clauses.extend(projected.clauses);
    clauses.extend(order_and_page(ctx, &target, &this, &request.args)?);
    clauses.push(Clause::return_items(vec![ProjectionItem::aliased(
        projected.expr,
        &this,
    )]));
    Ok((clauses, projected.shape))
}

/// Reads over an interface: one `UNION ALL` branch per member, each
/// returning the member's projection and the shared sort values, sorted and
/// paged after the union. Branches are never deduplicated: distinct nodes
/// may project to equal rows.
fn plan_polymorphic_read<'a>(
    ctx: &mut PlanCtx<'a>,
    target: &TargetType<'a>,
    request: &Request,
) -> Result<(Vec<Clause>, ResultShape), QueryPlannerError> {
    let filter_target = FilterTarget::for_target(target).ok_or_else(|| {
        QueryPlannerError::schema_mismatch(target.name(), "where", "unions cannot be read directly")
    })?;
    let sort = parse_sort("sort", arg(&request.args, "sort"))?;
    let sort_values: Vec<Variable> = sort.iter().map(|_| ctx.value_var()).collect();
    let this = Variable::this();

    let mut branches = vec![];
    let mut shape = vec![];
    for member in target.members() {
        let node = ctx.pattern_var();
        let user = match request.arg("where") {
            Some(filter) => {
                compile_filter(ctx, filter, &filter_target, &node, FilterOptions::user())?
            }
            None => Predicate::default(),
        };
        let mut body = ClauseTree::from(bind_guarded(
            ctx,
            root_match(&node, member),
            &TargetType::Node(member),
            &node,
            user,
            Operation::Read,
            Some(ValidationPhase::After),
        )?);

        let projected = project_node(ctx, member, &Source::bound(&node), &request.selection, true)?;
        body.extend(projected.clauses);
        shape.extend(projected.shape);

        let mut items = vec![ProjectionItem::aliased(
            CypherExpr::MapProjection {
                variable: node.clone(),
                items: projected.items,
            },
            &this,
        )];
        for (field, value) in sort.iter().zip(&sort_values) {
            items.push(ProjectionItem::aliased(sort_expr(target, &node, field)?, value));
        }
        body.push(Clause::return_items(items));
        branches.push(body);
    }

    let mut clauses = vec![Clause::Call(CallClause {
        imports: vec![],
        branches,
        union_all: true,
    })];
    let order_by = sort
        .iter()
        .zip(&sort_values)
        .map(|(field, value)| OrderByItem {
            expr: value.expr(),
            direction: field.direction,
        })
        .collect();
    let offset = parse_count("offset", arg(&request.args, "offset"))?;
    let limit = ctx.effective_limit(None, parse_count("limit", arg(&request.args, "limit"))?);
    clauses.extend(paged(ctx, order_by, offset, limit));
    clauses.push(Clause::return_items(vec![ProjectionItem::variable(&this)]));
    Ok((clauses, ResultShape::object(shape)))
}

/// `MATCH ... WITH collect(...) ... RETURN { edges: ..., totalCount: ... } AS this`
pub(super) fn plan_connection<'a>(
    ctx: &mut PlanCtx<'a>,
    request: &Request,
) -> Result<(Vec<Clause>, ResultShape), QueryPlannerError> {
    let node = root_node(ctx, &request.type_name, "connection")?;
    let this = Variable::this();
    let mut clauses = match_node(
        ctx,
        root_match(&this, node),
        node,
        &this,
        request.arg("where"),
        Operation::Read,
        Some(ValidationPhase::After),
    )?;

    let input = ConnectionInput {
        name: format!("{}Connection", node.name),
        target: TargetType::Node(node),
        node: this.clone(),
        edge: None,
    };
    let args = ConnectionArgs {
        args: &request.args,
        selection: &request.selection,
    };
    let (paging, value, shape) = connection_clauses(ctx, &input, args)?;
    clauses.extend(paging);
    clauses.push(Clause::return_items(vec![ProjectionItem::aliased(value, &this)]));
    Ok((clauses, shape))
}

/// `MATCH ... RETURN { count: count(this), title: { shortest: ... } } AS this`
pub(super) fn plan_aggregate<'a>(
    ctx: &mut PlanCtx<'a>,
    request: &Request,
) -> Result<(Vec<Clause>, ResultShape), QueryPlannerError> {
    let node = root_node(ctx, &request.type_name, "aggregate")?;
    let target = TargetType::Node(node);
    let this = Variable::this();
    let mut clauses = match_node(
        ctx,
        root_match(&this, node),
        node,
        &this,
        request.arg("where"),
        Operation::Aggregate,
        None,
    )?;

    let mut entries = Vec::with_capacity(request.selection.fields.len());
    for selected in &request.selection.fields {
        let value = if selected.name == "count" {
            CypherExpr::function("count", vec![this.expr()])
        } else {
            aggregate_fields(ctx, AggregateSource::Target(&target), &this, selected)?
        };
        entries.push((selected.response_key().to_string(), value));
    }
    clauses.push(Clause::return_items(vec![ProjectionItem::aliased(
        CypherExpr::Map(entries),
        &this,
    )]));
    Ok((clauses, ResultShape::Scalar))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompilerConfig;
    use crate::cypher_generator::{Emitter, ToCypher};
    use crate::graph_catalog::testing::test_schema;
    use crate::request::{ExecutionContext, SelectedField, Selection};
    use serde_json::json;

    fn emit(clauses: Vec<Clause>) -> (String, Emitter) {
        let mut emitter = Emitter::new();
        let text = ClauseTree::from(clauses).to_cypher(&mut emitter).unwrap();
        (text, emitter)
    }

    #[test]
    fn test_plain_read() {
        let schema = test_schema();
        let context = ExecutionContext::anonymous();
        let config = CompilerConfig::default();
        let mut ctx = PlanCtx::new(&schema, &context, &config);

        let request = Request::read("Movie")
            .args(json!({"where": {"title_EQ": "Heat"}}))
            .select(Selection::of(&["title", "rating"]));
        let (clauses, shape) = plan_read(&mut ctx, &request).unwrap();
        let (text, _) = emit(clauses);

        assert_eq!(
            text,
            "MATCH (this:Movie)\nWHERE this.title = $param0\nRETURN this { .title, .rating } AS this"
        );
        assert_eq!(shape, ResultShape::Scalar);
    }

    #[test]
    fn test_interface_read_unions_members() {
        let schema = test_schema();
        let context = ExecutionContext::anonymous();
        let config = CompilerConfig::default();
        let mut ctx = PlanCtx::new(&schema, &context, &config);

        let request = Request::read("Production")
            .args(json!({"sort": [{"title": "ASC"}], "limit": 5}))
            .select(Selection::of(&["title"]));
        let (clauses, _) = plan_read(&mut ctx, &request).unwrap();
        let (text, _) = emit(clauses);

        assert_eq!(
            text,
            "CALL {\n    MATCH (this0:Movie)\n    RETURN this0 { __typename: \"Movie\", .title } AS this, this0.title AS var1\n    UNION ALL\n    MATCH (this2:Series)\n    RETURN this2 { __typename: \"Series\", .title } AS this, this2.title AS var1\n}\nWITH *\nORDER BY var1 ASC\nLIMIT $param0\nRETURN this"
        );
    }

    #[test]
    fn test_aggregate_read() {
        let schema = test_schema();
        let context = ExecutionContext::anonymous();
        let config = CompilerConfig::default();
        let mut ctx = PlanCtx::new(&schema, &context, &config);

        let request = Request::aggregate("Movie").select(Selection::new(vec![
            SelectedField::new("count"),
            SelectedField::new("rating").select(Selection::of(&["min", "max"])),
        ]));
        let (clauses, _) = plan_aggregate(&mut ctx, &request).unwrap();
        let (text, _) = emit(clauses);

        assert_eq!(
            text,
            "MATCH (this:Movie)\nRETURN { count: count(this), rating: { min: min(this.rating), max: max(this.rating) } } AS this"
        );
    }

    #[test]
    fn test_connection_over_interface_is_refused() {
        let schema = test_schema();
        let context = ExecutionContext::anonymous();
        let config = CompilerConfig::default();
        let mut ctx = PlanCtx::new(&schema, &context, &config);

        let request = Request::connection("Production").select(Selection::of(&["totalCount"]));
        assert!(matches!(
            plan_connection(&mut ctx, &request),
            Err(QueryPlannerError::SchemaMismatch { .. })
        ));
    }
}
