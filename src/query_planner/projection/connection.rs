//! Relay-style connections.
//!
//! The filtered rows are collected once so `totalCount` sees the whole set,
//! then unwound again inside a subquery that applies the cursor, sorts and
//! fetches one row more than the page size to learn whether a next page
//! exists:
//!
//! ```text
//! WITH collect({ node: this1, relationship: this0 }) AS var2
//! WITH var2, size(var2) AS var3
//! CALL {
//!     WITH var2
//!     UNWIND var2 AS var4
//!     WITH var4.node AS this1, var4.relationship AS this0
//!     WITH *
//!     ORDER BY this1.name ASC, this1.id ASC
//!     LIMIT $param0
//!     RETURN collect({ node: this1 { .name }, cursor: [this1.name, this1.id] }) AS var5
//! }
//! WITH var3, var5[..$param1] AS var6, size(var5) > $param1 AS var7
//! ```
//!
//! Cursors are the raw sort-key tuple of an edge, tie-breaker last; the
//! result shaper encodes them.

use serde_json::{json, Map, Value};

use super::{project_target, property_item, traverse, Source, TYPENAME};
use crate::graph_catalog::{
    NodeType, Operation, RelationshipField, RelationshipProperties, ScalarKind, TargetType,
    ValidationPhase,
};
use crate::query_planner::arguments::{parse_connection_sort, parse_count, parse_cursor, SortSide};
use crate::query_planner::errors::QueryPlannerError;
use crate::query_planner::filter::{compile_connection_filter, FilterOptions, Predicate};
use crate::query_planner::pattern::bind_guarded;
use crate::query_planner::plan_ctx::PlanCtx;
use crate::query_planner::scalar::value_param;
use crate::request::{SelectedField, Selection};
use crate::render_plan::clause::Clause;
use crate::render_plan::{
    ClauseTree, CypherExpr, MapProjectionItem, Operator, OrderByItem, ProjectionItem,
    SortDirection, UnwindClause, Variable,
};
use crate::result_shaper::ResultShape;
use crate::utils::cursor::{Cursor, CursorError};

const CURSOR_KEY: &str = "cursor";

/// Rows a connection pages over, already bound and filtered
pub struct ConnectionInput<'a> {
    /// Connection field name, for error messages
    pub name: String,
    pub target: TargetType<'a>,
    pub node: Variable,
    /// Relationship variable and its property type for nested connections
    pub edge: Option<(Variable, &'a RelationshipProperties)>,
}

/// Arguments and selection of the connection field
#[derive(Clone, Copy)]
pub struct ConnectionArgs<'r> {
    pub args: &'r Map<String, Value>,
    pub selection: &'r Selection,
}

impl<'r> ConnectionArgs<'r> {
    fn arg(&self, name: &str) -> Option<&'r Value> {
        self.args.get(name).filter(|v| !v.is_null())
    }
}

/// One ordering key; its value is part of every cursor
struct SortKey {
    expr: CypherExpr,
    direction: SortDirection,
    kind: Option<ScalarKind>,
    nullable: bool,
}

impl ConnectionInput<'_> {
    fn sort_keys(&self, args: ConnectionArgs) -> Result<Vec<SortKey>, QueryPlannerError> {
        let mut keys = vec![];
        for (side, sort) in parse_connection_sort("sort", args.arg("sort"))? {
            let (variable, property) = match (side, &self.edge) {
                (SortSide::Node, _) => (&self.node, self.target.property(&sort.field)),
                (SortSide::Edge, Some((edge, properties))) => {
                    (edge, properties.property(&sort.field))
                }
                (SortSide::Edge, None) => {
                    return Err(QueryPlannerError::schema_mismatch(
                        &self.name,
                        "edge",
                        "connection edges carry no properties",
                    ))
                }
            };
            let property = property
                .filter(|p| !p.list)
                .ok_or_else(|| QueryPlannerError::unknown_field(&self.name, &sort.field))?;
            keys.push(SortKey {
                expr: variable.property(property.db_name()),
                direction: sort.direction,
                kind: Some(property.kind),
                nullable: property.nullable,
            });
        }

        let tie_breaker = match self.target.as_node().and_then(NodeType::tie_breaker) {
            Some(property) => SortKey {
                expr: self.node.property(property.db_name()),
                direction: SortDirection::Asc,
                kind: Some(property.kind),
                nullable: property.nullable,
            },
            None => SortKey {
                expr: CypherExpr::function("elementId", vec![self.node.expr()]),
                direction: SortDirection::Asc,
                kind: None,
                nullable: false,
            },
        };
        if !keys.iter().any(|key| key.expr == tie_breaker.expr) {
            keys.push(tie_breaker);
        }
        Ok(keys)
    }
}

/// Rows strictly after the cursor in the order given by `keys`:
/// `(k0 > $v0) OR (k0 = $v0 AND k1 > $v1) OR ...`
///
/// Nulls sort last ascending and first descending. Null cursor values
/// compare with `IS NULL` and are never passed as parameters.
fn keyset_predicate(
    ctx: &mut PlanCtx,
    keys: &[SortKey],
    values: &[Value],
    token: &str,
) -> Result<CypherExpr, QueryPlannerError> {
    if values.len() != keys.len() {
        return Err(QueryPlannerError::InvalidCursor {
            cursor: token.to_string(),
            source: CursorError::Shape(format!(
                "expected {} sort keys, found {}",
                keys.len(),
                values.len()
            )),
        });
    }

    let bounds: Vec<Option<CypherExpr>> = keys
        .iter()
        .zip(values)
        .map(|(key, value)| (!value.is_null()).then(|| value_param(ctx, key.kind, value)))
        .collect();

    let mut disjuncts = Vec::with_capacity(keys.len());
    for (i, key) in keys.iter().enumerate() {
        let Some(after) = key.after(bounds[i].as_ref()) else {
            continue;
        };
        let mut parts: Vec<CypherExpr> = keys[..i]
            .iter()
            .zip(&bounds)
            .map(|(previous, bound)| previous.equals(bound.as_ref()))
            .collect();
        parts.push(after);
        disjuncts.extend(CypherExpr::and_all(parts));
    }
    // every key ascending at null: the cursor is on the last row
    Ok(CypherExpr::or_all(disjuncts).unwrap_or_else(|| CypherExpr::boolean(false)))
}

impl SortKey {
    fn equals(&self, bound: Option<&CypherExpr>) -> CypherExpr {
        match bound {
            Some(bound) => self.expr.clone().eq(bound.clone()),
            None => self.expr.clone().is_null(),
        }
    }

    /// Values strictly after `bound`, `None` when nothing follows it
    fn after(&self, bound: Option<&CypherExpr>) -> Option<CypherExpr> {
        match (self.direction, bound) {
            (SortDirection::Asc, Some(bound)) => {
                let greater =
                    CypherExpr::binary(Operator::GreaterThan, self.expr.clone(), bound.clone());
                if self.nullable {
                    CypherExpr::or_all(vec![greater, self.expr.clone().is_null()])
                } else {
                    Some(greater)
                }
            }
            (SortDirection::Asc, None) => None,
            (SortDirection::Desc, Some(bound)) => Some(CypherExpr::binary(
                Operator::LessThan,
                self.expr.clone(),
                bound.clone(),
            )),
            (SortDirection::Desc, None) => Some(self.expr.clone().is_not_null()),
        }
    }
}

/// Entries of each collected edge and what they need computed first
struct EdgeMap {
    clauses: Vec<Clause>,
    entries: Vec<(String, CypherExpr)>,
    shape: Vec<(String, ResultShape)>,
    cursor_key: Option<String>,
}

fn edge_map<'a>(
    ctx: &mut PlanCtx<'a>,
    input: &ConnectionInput<'a>,
    selection: &Selection,
    keys: &[SortKey],
) -> Result<EdgeMap, QueryPlannerError> {
    let cursor = || CypherExpr::List(keys.iter().map(|key| key.expr.clone()).collect());
    let mut map = EdgeMap {
        clauses: vec![],
        entries: vec![],
        shape: vec![],
        cursor_key: None,
    };

    let edge_fields = selection
        .fields
        .iter()
        .filter(|f| f.name == "edges")
        .flat_map(|f| f.selection.fields.iter());
    for selected in edge_fields {
        let key = selected.response_key().to_string();
        if map.entries.iter().any(|(existing, _)| *existing == key) {
            continue;
        }
        let (value, shape) = match selected.name.as_str() {
            CURSOR_KEY => {
                map.cursor_key.get_or_insert_with(|| key.clone());
                (cursor(), ResultShape::Cursor)
            }
            "node" => {
                let projected =
                    project_target(ctx, &input.target, &input.node, &selected.selection)?;
                map.clauses.extend(projected.clauses);
                (projected.expr, projected.shape)
            }
            "properties" => {
                let Some((edge, properties)) = &input.edge else {
                    return Err(QueryPlannerError::schema_mismatch(
                        &input.name,
                        "properties",
                        "connection edges carry no properties",
                    ));
                };
                (edge_properties(edge, properties, &selected.selection)?, ResultShape::Scalar)
            }
            _ => {
                return Err(QueryPlannerError::unknown_field(
                    format!("{}.edges", input.name),
                    &selected.name,
                ))
            }
        };
        map.entries.push((key.clone(), value));
        map.shape.push((key, shape));
    }

    let page_info_cursor = selection
        .fields
        .iter()
        .filter(|f| f.name == "pageInfo")
        .flat_map(|f| f.selection.fields.iter())
        .any(|f| f.name == "startCursor" || f.name == "endCursor");
    if page_info_cursor && map.cursor_key.is_none() {
        map.entries.push((CURSOR_KEY.to_string(), cursor()));
        map.cursor_key = Some(CURSOR_KEY.to_string());
    }
    Ok(map)
}

fn edge_properties(
    edge: &Variable,
    properties: &RelationshipProperties,
    selection: &Selection,
) -> Result<CypherExpr, QueryPlannerError> {
    let mut items = Vec::with_capacity(selection.fields.len());
    for selected in &selection.fields {
        let key = selected.response_key();
        if selected.name == TYPENAME {
            items.push(MapProjectionItem::Entry(
                key.to_string(),
                CypherExpr::string(&properties.name),
            ));
            continue;
        }
        let property = properties
            .property(&selected.name)
            .ok_or_else(|| QueryPlannerError::unknown_field(&properties.name, &selected.name))?;
        items.push(property_item(edge, key, property));
    }
    Ok(CypherExpr::MapProjection {
        variable: edge.clone(),
        items,
    })
}

/// Clauses paging the bound rows plus the connection value they produce.
pub fn connection_clauses<'a>(
    ctx: &mut PlanCtx<'a>,
    input: &ConnectionInput<'a>,
    args: ConnectionArgs,
) -> Result<(Vec<Clause>, CypherExpr, ResultShape), QueryPlannerError> {
    let keys = input.sort_keys(args)?;
    let first = parse_count("first", args.arg("first"))?;
    let limit = ctx.effective_limit(input.target.as_node(), first);
    let after = parse_cursor(args.arg("after"))?;

    let mut clauses = vec![];
    let edges = ctx.value_var();
    let mut collected = vec![("node".to_string(), input.node.expr())];
    if let Some((edge, _)) = &input.edge {
        collected.push(("relationship".to_string(), edge.expr()));
    }
    clauses.push(Clause::with_items(vec![ProjectionItem::aliased(
        CypherExpr::function("collect", vec![CypherExpr::Map(collected)]),
        &edges,
    )]));
    let total = ctx.value_var();
    clauses.push(Clause::with_items(vec![
        ProjectionItem::variable(&edges),
        ProjectionItem::aliased(CypherExpr::function("size", vec![edges.expr()]), &total),
    ]));

    let row = ctx.value_var();
    let mut page_body = ClauseTree::new();
    page_body.push(Clause::Unwind(UnwindClause {
        expr: edges.expr(),
        alias: row.clone(),
    }));
    let mut rebind = vec![ProjectionItem::aliased(row.expr().property("node"), &input.node)];
    if let Some((edge, _)) = &input.edge {
        rebind.push(ProjectionItem::aliased(row.expr().property("relationship"), edge));
    }
    page_body.push(Clause::with_items(rebind));

    let token = args.arg("after").and_then(Value::as_str).unwrap_or_default();
    let mut skip = None;
    match &after {
        Some(Cursor::Keyset(values)) => {
            page_body.push(Clause::filter(keyset_predicate(ctx, &keys, values, token)?));
        }
        Some(Cursor::Offset(offset)) => {
            let next = offset
                .checked_add(1)
                .and_then(|next| u32::try_from(next).ok())
                .ok_or_else(|| QueryPlannerError::InvalidCursor {
                    cursor: token.to_string(),
                    source: CursorError::Shape(format!("offset {} is out of range", offset)),
                })?;
            skip = Some(next);
        }
        None => {}
    }

    let edge_values = edge_map(ctx, input, args.selection, &keys)?;
    page_body.extend(edge_values.clauses);
    let order_by = keys
        .iter()
        .map(|key| OrderByItem {
            expr: key.expr.clone(),
            direction: key.direction,
        })
        .collect();
    let fetch = match limit {
        Some(limit) => Some(limit.checked_add(1).ok_or_else(|| {
            QueryPlannerError::invalid_argument("first", format!("{} is out of range", limit))
        })?),
        None => None,
    };
    page_body.extend(super::paged(ctx, order_by, skip, fetch));
    let page = ctx.value_var();
    page_body.push(Clause::return_items(vec![ProjectionItem::aliased(
        CypherExpr::function("collect", vec![CypherExpr::Map(edge_values.entries)]),
        &page,
    )]));
    clauses.push(Clause::call(vec![edges], page_body));

    let (page, has_next) = match limit {
        Some(limit) => {
            let size = ctx.param(json!(limit));
            let sliced = ctx.value_var();
            let has_next = ctx.value_var();
            clauses.push(Clause::with_items(vec![
                ProjectionItem::variable(&total),
                ProjectionItem::aliased(
                    CypherExpr::Slice {
                        list: Box::new(page.expr()),
                        from: None,
                        to: Some(Box::new(size.clone())),
                    },
                    &sliced,
                ),
                ProjectionItem::aliased(
                    CypherExpr::binary(
                        Operator::GreaterThan,
                        CypherExpr::function("size", vec![page.expr()]),
                        size,
                    ),
                    &has_next,
                ),
            ]));
            (sliced.expr(), has_next.expr())
        }
        None => (page.expr(), CypherExpr::boolean(false)),
    };

    let mut entries = vec![];
    let mut shape = vec![];
    for selected in &args.selection.fields {
        let key = selected.response_key().to_string();
        match selected.name.as_str() {
            "totalCount" => entries.push((key, total.expr())),
            "edges" => {
                entries.push((key.clone(), page.clone()));
                let edge_shape = ResultShape::object(edge_values.shape.clone());
                shape.push((key, ResultShape::list(edge_shape)));
            }
            "pageInfo" => {
                let (info, info_shape) = page_info(
                    &input.name,
                    selected,
                    &page,
                    &has_next,
                    after.is_some(),
                    edge_values.cursor_key.as_deref(),
                )?;
                entries.push((key.clone(), info));
                shape.push((key, info_shape));
            }
            _ => return Err(QueryPlannerError::unknown_field(&input.name, &selected.name)),
        }
    }

    Ok((clauses, CypherExpr::Map(entries), ResultShape::object(shape)))
}

fn page_info(
    connection: &str,
    selected: &SelectedField,
    page: &CypherExpr,
    has_next: &CypherExpr,
    has_previous: bool,
    cursor_key: Option<&str>,
) -> Result<(CypherExpr, ResultShape), QueryPlannerError> {
    let edge_cursor = |function: &'static str| {
        let cursor_key = cursor_key.unwrap_or(CURSOR_KEY);
        CypherExpr::function(function, vec![page.clone()]).property(cursor_key)
    };

    let mut entries = vec![];
    let mut shape = vec![];
    for field in &selected.selection.fields {
        let key = field.response_key().to_string();
        let value = match field.name.as_str() {
            "hasNextPage" => has_next.clone(),
            "hasPreviousPage" => CypherExpr::boolean(has_previous),
            "startCursor" => {
                shape.push((key.clone(), ResultShape::Cursor));
                edge_cursor("head")
            }
            "endCursor" => {
                shape.push((key.clone(), ResultShape::Cursor));
                edge_cursor("last")
            }
            _ => {
                return Err(QueryPlannerError::unknown_field(
                    format!("{}.pageInfo", connection),
                    &field.name,
                ))
            }
        };
        entries.push((key, value));
    }
    Ok((CypherExpr::Map(entries), ResultShape::object(shape)))
}

/// `CALL { WITH this MATCH ... <connection clauses> RETURN { edges, ... } AS var9 }`
pub(super) fn project_connection<'a>(
    ctx: &mut PlanCtx<'a>,
    field: &RelationshipField,
    source: &Source,
    selected: &SelectedField,
) -> Result<(Clause, Variable, ResultShape), QueryPlannerError> {
    let properties = match &field.properties {
        Some(name) => Some(ctx.schema().get_relationship_properties(name)?),
        None => None,
    };
    let (target, related, edge, clause) = traverse(ctx, field, source, properties.is_some())?;

    let user = match selected.arg("where") {
        Some(filter) => compile_connection_filter(
            ctx,
            filter,
            field,
            &target,
            &related,
            edge.as_ref(),
            FilterOptions::user(),
        )?,
        None => Predicate::default(),
    };
    let mut body = ClauseTree::from(bind_guarded(
        ctx,
        clause,
        &target,
        &related,
        user,
        Operation::Read,
        Some(ValidationPhase::After),
    )?);

    let input = ConnectionInput {
        name: field.connection_field_name(),
        target,
        node: related,
        edge: edge.zip(properties),
    };
    let (clauses, value, shape) = connection_clauses(
        ctx,
        &input,
        ConnectionArgs {
            args: &selected.args,
            selection: &selected.selection,
        },
    )?;
    body.extend(clauses);

    let result = ctx.value_var();
    body.push(Clause::return_items(vec![ProjectionItem::aliased(value, &result)]));
    Ok((
        Clause::call(vec![source.variable.clone()], body),
        result,
        shape,
    ))
}
