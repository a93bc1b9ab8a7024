//! `<rel>Aggregate` filters.
//!
//! ```text
//! CALL {
//!     WITH this
//!     MATCH (this)<-[this1:ACTED_IN]-(this0:Actor)
//!     RETURN (count(this0) > $param0 AND avg(this0.age) >= $param1) AS var2
//! }
//! ...
//! WHERE var2 = true
//! ```

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};

use super::relationship::Traversal;
use super::FilterCompiler;
use crate::graph_catalog::{PropertySchema, RelationshipField, ScalarKind, TargetType};
use crate::query_planner::errors::QueryPlannerError;
use crate::query_planner::scalar::{check_scalar, value_param};
use crate::render_plan::clause::Clause;
use crate::render_plan::{
    ClauseTree, CypherExpr, MatchClause, Operator, ProjectionItem, Variable,
};

lazy_static! {
    static ref COUNT_KEY: Regex =
        Regex::new(r"^count(?:_(?P<op>EQUAL|GTE|GT|LTE|LT))?$").unwrap();
    static ref FIELD_KEY: Regex = Regex::new(concat!(
        r"^(?P<field>.+?)_",
        r"(?P<reducer>AVERAGE_LENGTH|LONGEST_LENGTH|SHORTEST_LENGTH|AVERAGE|MIN|MAX|SUM)_",
        r"(?P<op>EQUAL|GTE|GT|LTE|LT)$",
    ))
    .unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reducer {
    Average,
    Min,
    Max,
    Sum,
    AverageLength,
    LongestLength,
    ShortestLength,
}

impl Reducer {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "AVERAGE" => Reducer::Average,
            "MIN" => Reducer::Min,
            "MAX" => Reducer::Max,
            "SUM" => Reducer::Sum,
            "AVERAGE_LENGTH" => Reducer::AverageLength,
            "LONGEST_LENGTH" => Reducer::LongestLength,
            "SHORTEST_LENGTH" => Reducer::ShortestLength,
            _ => return None,
        })
    }

    fn supports(&self, kind: ScalarKind) -> bool {
        match self {
            Reducer::Average | Reducer::Sum => kind.is_numeric(),
            Reducer::Min | Reducer::Max => kind.is_numeric() || kind.is_temporal(),
            Reducer::AverageLength | Reducer::LongestLength | Reducer::ShortestLength => {
                kind.is_string_like()
            }
        }
    }

    fn apply(&self, subject: CypherExpr) -> CypherExpr {
        let size = |subject| CypherExpr::function("size", vec![subject]);
        let (name, argument) = match self {
            Reducer::Average => ("avg", subject),
            Reducer::Min => ("min", subject),
            Reducer::Max => ("max", subject),
            Reducer::Sum => ("sum", subject),
            Reducer::AverageLength => ("avg", size(subject)),
            Reducer::LongestLength => ("max", size(subject)),
            Reducer::ShortestLength => ("min", size(subject)),
        };
        CypherExpr::function(name, vec![argument])
    }

    /// Kind of the reduced value, used to type-check the comparison operand
    fn result_kind(&self, kind: ScalarKind) -> ScalarKind {
        match self {
            Reducer::Average => ScalarKind::Float,
            Reducer::Min | Reducer::Max | Reducer::Sum => kind,
            Reducer::AverageLength => ScalarKind::Float,
            Reducer::LongestLength | Reducer::ShortestLength => ScalarKind::Int,
        }
    }
}

fn comparison(op: &str) -> Operator {
    match op {
        "GT" => Operator::GreaterThan,
        "GTE" => Operator::GreaterThanEqual,
        "LT" => Operator::LessThan,
        "LTE" => Operator::LessThanEqual,
        _ => Operator::Equal,
    }
}

/// Which side of the traversal a field comparison reads
enum Side<'t> {
    Node(&'t TargetType<'t>, &'t Variable),
    Edge(&'t [PropertySchema], &'t Variable),
}

impl<'c, 'a> FilterCompiler<'c, 'a> {
    pub(super) fn compile_aggregate(
        &mut self,
        field: &RelationshipField,
        value: &Value,
        source: &Variable,
    ) -> Result<Option<CypherExpr>, QueryPlannerError> {
        let argument = field.aggregate_field_name();
        if !self.options.allows_preceding() {
            return Err(QueryPlannerError::invalid_argument(
                argument,
                "aggregate filters are not supported inside relationship filters",
            ));
        }
        let map = match value {
            Value::Null => return Ok(None),
            Value::Object(map) => map,
            other => {
                return Err(QueryPlannerError::invalid_argument(
                    argument,
                    format!("expected an object, got {}", other),
                ))
            }
        };

        let traversal = self.traversal(field, field.properties.is_some(), source)?;
        let Some(condition) = self.aggregate_condition(field, map, &traversal)? else {
            return Ok(None);
        };

        let result = self.ctx.value_var();
        let mut body = ClauseTree::new();
        body.push(Clause::Match(MatchClause {
            optional: false,
            patterns: vec![traversal.pattern.clone()],
            predicate: traversal.restriction.clone(),
        }));
        body.push(Clause::return_items(vec![ProjectionItem::aliased(condition, &result)]));
        self.preceding.push(Clause::call(vec![source.clone()], body));

        Ok(Some(result.expr().eq(CypherExpr::boolean(true))))
    }

    fn aggregate_condition(
        &mut self,
        field: &RelationshipField,
        map: &Map<String, Value>,
        traversal: &Traversal<'a>,
    ) -> Result<Option<CypherExpr>, QueryPlannerError> {
        let argument = field.aggregate_field_name();
        let mut parts = Vec::with_capacity(map.len());

        for (key, value) in map {
            let part = match key.as_str() {
                "AND" | "OR" => {
                    let items = value.as_array().ok_or_else(|| {
                        QueryPlannerError::invalid_argument(
                            key,
                            format!("expected a list, got {}", value),
                        )
                    })?;
                    let mut children = Vec::with_capacity(items.len());
                    for item in items {
                        let item = item.as_object().ok_or_else(|| {
                            QueryPlannerError::invalid_argument(
                                key,
                                format!("expected an object, got {}", item),
                            )
                        })?;
                        children.extend(self.aggregate_condition(field, item, traversal)?);
                    }
                    if key == "OR" {
                        CypherExpr::or_all(children)
                    } else {
                        CypherExpr::and_all(children)
                    }
                }
                "NOT" => {
                    let inner = value.as_object().ok_or_else(|| {
                        QueryPlannerError::invalid_argument(
                            key,
                            format!("expected an object, got {}", value),
                        )
                    })?;
                    self.aggregate_condition(field, inner, traversal)?
                        .map(CypherExpr::not)
                }
                "node" => {
                    let side = Side::Node(&traversal.target, &traversal.related);
                    self.field_conditions(&argument, value, side)?
                }
                "edge" => {
                    let (Some(properties), Some(edge)) = (&field.properties, &traversal.edge) else {
                        return Err(QueryPlannerError::schema_mismatch(
                            argument,
                            "edge",
                            "relationship carries no properties",
                        ));
                    };
                    let properties = self.ctx.schema().get_relationship_properties(properties)?;
                    let side = Side::Edge(&properties.properties, edge);
                    self.field_conditions(&argument, value, side)?
                }
                _ => {
                    let captures = COUNT_KEY
                        .captures(key)
                        .ok_or_else(|| QueryPlannerError::unknown_field(&argument, key))?;
                    let operator = comparison(captures.name("op").map_or("EQUAL", |m| m.as_str()));
                    if !value.is_i64() {
                        return Err(QueryPlannerError::invalid_argument(
                            format!("{}.{}", argument, key),
                            format!("expected an integer, got {}", value),
                        ));
                    }
                    let count = CypherExpr::function("count", vec![traversal.related.expr()]);
                    Some(CypherExpr::binary(operator, count, self.ctx.param(value.clone())))
                }
            };
            parts.extend(part);
        }
        Ok(CypherExpr::and_all(parts))
    }

    /// `{age_AVERAGE_GTE: 30, name_SHORTEST_LENGTH_LT: 4}`
    fn field_conditions(
        &mut self,
        argument: &str,
        value: &Value,
        side: Side,
    ) -> Result<Option<CypherExpr>, QueryPlannerError> {
        let map = value.as_object().ok_or_else(|| {
            QueryPlannerError::invalid_argument(
                argument,
                format!("expected an object, got {}", value),
            )
        })?;

        let mut parts = Vec::with_capacity(map.len());
        for (key, operand) in map {
            let captures = FIELD_KEY
                .captures(key)
                .ok_or_else(|| QueryPlannerError::unknown_field(argument, key))?;
            let name = &captures["field"];
            let reducer = Reducer::parse(&captures["reducer"])
                .ok_or_else(|| QueryPlannerError::unknown_field(argument, key))?;
            let operator = comparison(&captures["op"]);

            let (property, variable) = match &side {
                Side::Node(target, variable) => (target.property(name), *variable),
                Side::Edge(properties, variable) => {
                    (properties.iter().find(|p| p.name == name), *variable)
                }
            };
            let property =
                property.ok_or_else(|| QueryPlannerError::unknown_field(argument, name))?;
            if property.list || !reducer.supports(property.kind) {
                return Err(QueryPlannerError::schema_mismatch(
                    argument,
                    key,
                    format!("reducer is not declared for {} fields", property.kind),
                ));
            }

            let kind = reducer.result_kind(property.kind);
            check_scalar(argument, key, kind, operand)?;
            let subject = reducer.apply(variable.property(property.db_name()));
            let operand = value_param(self.ctx, Some(kind), operand);
            parts.push(CypherExpr::binary(operator, subject, operand));
        }
        Ok(CypherExpr::and_all(parts))
    }
}
