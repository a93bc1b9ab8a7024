//! Aggregation selections: `count` plus per-field reducers, computed in one
//! subquery over the related rows.

use super::{traverse, Source};
use crate::graph_catalog::{
    Operation, PropertySchema, RelationshipField, RelationshipProperties, ScalarKind, TargetType,
};
use crate::query_planner::errors::QueryPlannerError;
use crate::query_planner::pattern::match_target;
use crate::query_planner::plan_ctx::PlanCtx;
use crate::request::SelectedField;
use crate::render_plan::clause::Clause;
use crate::render_plan::{ClauseTree, CypherExpr, Literal, Operator, ProjectionItem, Variable};
use crate::result_shaper::ResultShape;

/// Where aggregated fields are looked up
#[derive(Clone, Copy)]
pub enum AggregateSource<'s> {
    Target(&'s TargetType<'s>),
    Edge(&'s RelationshipProperties),
}

impl<'s> AggregateSource<'s> {
    fn name(&self) -> &str {
        match self {
            AggregateSource::Target(target) => target.name(),
            AggregateSource::Edge(properties) => &properties.name,
        }
    }

    fn property(&self, name: &str) -> Option<&'s PropertySchema> {
        match self {
            AggregateSource::Target(target) => target.property(name),
            AggregateSource::Edge(properties) => properties.property(name),
        }
    }
}

/// ```text
/// reduce(acc = null, item IN collect(x) |
///     CASE WHEN acc IS NULL OR size(item) <op> size(acc) THEN item ELSE acc END)
/// ```
fn by_length(ctx: &mut PlanCtx, subject: CypherExpr, operator: Operator) -> CypherExpr {
    let accumulator = ctx.value_var();
    let item = ctx.value_var();
    let size = |variable: &Variable| CypherExpr::function("size", vec![variable.expr()]);
    let replace = CypherExpr::binary(
        Operator::Or,
        accumulator.expr().is_null(),
        CypherExpr::binary(operator, size(&item), size(&accumulator)),
    );
    CypherExpr::Reduce {
        accumulator: accumulator.clone(),
        init: Box::new(CypherExpr::Literal(Literal::Null)),
        item: item.clone(),
        list: Box::new(CypherExpr::function("collect", vec![subject])),
        expr: Box::new(CypherExpr::Case {
            branches: vec![(replace, item.expr())],
            otherwise: Some(Box::new(accumulator.expr())),
        }),
    }
}

fn reducer(
    ctx: &mut PlanCtx,
    owner: &str,
    property: &PropertySchema,
    reducer: &str,
    subject: CypherExpr,
) -> Result<CypherExpr, QueryPlannerError> {
    let kind = property.kind;
    let expr = match reducer {
        "min" if kind.is_numeric() || kind.is_temporal() => {
            CypherExpr::function("min", vec![subject])
        }
        "max" if kind.is_numeric() || kind.is_temporal() => {
            CypherExpr::function("max", vec![subject])
        }
        "average" if kind.is_numeric() => CypherExpr::function("avg", vec![subject]),
        "sum" if kind.is_numeric() => CypherExpr::function("sum", vec![subject]),
        "shortest" if kind.is_string_like() => by_length(ctx, subject, Operator::LessThan),
        "longest" if kind.is_string_like() => by_length(ctx, subject, Operator::GreaterThan),
        _ => {
            return Err(QueryPlannerError::schema_mismatch(
                owner,
                &property.name,
                format!("`{}` is not an aggregate of {} fields", reducer, kind),
            ))
        }
    };
    Ok(expr)
}

/// `{ min: min(this.views), average: avg(this.views) }` for one selected field
pub fn aggregate_fields(
    ctx: &mut PlanCtx,
    source: AggregateSource,
    variable: &Variable,
    selected: &SelectedField,
) -> Result<CypherExpr, QueryPlannerError> {
    let property = source
        .property(&selected.name)
        .filter(|p| !p.list && p.kind != ScalarKind::Boolean)
        .ok_or_else(|| QueryPlannerError::unknown_field(source.name(), &selected.name))?;

    let mut entries = Vec::with_capacity(selected.selection.fields.len());
    for field in &selected.selection.fields {
        let subject = variable.property(property.db_name());
        let value = reducer(ctx, source.name(), property, &field.name, subject)?;
        entries.push((field.response_key().to_string(), value));
    }
    Ok(CypherExpr::Map(entries))
}

/// `CALL { WITH this MATCH ... RETURN { count: count(this1), node: { ... } } AS var2 }`
pub(super) fn project_aggregate<'a>(
    ctx: &mut PlanCtx<'a>,
    owner: &str,
    field: &RelationshipField,
    source: &Source,
    selected: &SelectedField,
) -> Result<(Clause, Variable, ResultShape), QueryPlannerError> {
    let name = field.aggregate_field_name();
    let selects_edge = selected.selection.fields.iter().any(|f| f.name == "edge");
    let properties = match (&field.properties, selects_edge) {
        (Some(properties), true) => Some(ctx.schema().get_relationship_properties(properties)?),
        (None, true) => {
            return Err(QueryPlannerError::schema_mismatch(
                owner,
                &name,
                "relationship carries no properties to aggregate",
            ))
        }
        (_, false) => None,
    };
    let (target, related, edge, clause) = traverse(ctx, field, source, properties.is_some())?;

    let mut body = ClauseTree::from(match_target(
        ctx,
        clause,
        &target,
        &related,
        selected.arg("where"),
        Operation::Aggregate,
        None,
    )?);

    let mut entries = Vec::with_capacity(selected.selection.fields.len());
    for sub in &selected.selection.fields {
        let value = match (sub.name.as_str(), &edge, properties) {
            ("count", _, _) => CypherExpr::function("count", vec![related.expr()]),
            ("node", _, _) => {
                let mut fields = Vec::with_capacity(sub.selection.fields.len());
                for aggregated in &sub.selection.fields {
                    let source = AggregateSource::Target(&target);
                    let value = aggregate_fields(ctx, source, &related, aggregated)?;
                    fields.push((aggregated.response_key().to_string(), value));
                }
                CypherExpr::Map(fields)
            }
            ("edge", Some(edge), Some(properties)) => {
                let mut fields = Vec::with_capacity(sub.selection.fields.len());
                for aggregated in &sub.selection.fields {
                    let source = AggregateSource::Edge(properties);
                    let value = aggregate_fields(ctx, source, edge, aggregated)?;
                    fields.push((aggregated.response_key().to_string(), value));
                }
                CypherExpr::Map(fields)
            }
            _ => return Err(QueryPlannerError::unknown_field(&name, &sub.name)),
        };
        entries.push((sub.response_key().to_string(), value));
    }

    let result = ctx.value_var();
    body.push(Clause::return_items(vec![ProjectionItem::aliased(
        CypherExpr::Map(entries),
        &result,
    )]));
    Ok((
        Clause::call(vec![source.variable.clone()], body),
        result,
        ResultShape::Scalar,
    ))
}
