//! Relationship filters.
//!
//! Quantified filters (`actors_SOME`, `actorsConnection_NONE`) always compile
//! to a `COUNT { }` subquery compared against a constant. Bare to-one filters
//! (`owner: {...}`) follow the compiler's [`ToOneStrategy`].

use serde_json::Value;

use super::operators::Quantifier;
use super::{FilterCompiler, FilterOptions, FilterTarget, Predicate, ToOneStrategy};
use crate::graph_catalog::{RelationshipField, TargetType};
use crate::query_planner::errors::QueryPlannerError;
use crate::query_planner::pattern::{bind, label_restriction, relationship_pattern};
use crate::render_plan::clause::Clause;
use crate::render_plan::{
    ClauseTree, CountSubquery, CypherExpr, MatchClause, Operator, Pattern, ProjectionItem,
    Variable,
};

/// Related end of a relationship filter
pub(super) struct Traversal<'a> {
    pub target: TargetType<'a>,
    pub related: Variable,
    pub edge: Option<Variable>,
    pub pattern: Pattern,
    /// Label disjunction for polymorphic targets
    pub restriction: Option<CypherExpr>,
}

impl Traversal<'_> {
    pub fn count(&self, predicate: Option<CypherExpr>) -> CypherExpr {
        CypherExpr::CountSubquery(Box::new(CountSubquery {
            pattern: self.pattern.clone(),
            predicate: CypherExpr::conjoin(self.restriction.clone(), predicate),
        }))
    }

    fn match_clause(&self, optional: bool) -> MatchClause {
        MatchClause {
            optional,
            patterns: vec![self.pattern.clone()],
            predicate: self.restriction.clone(),
        }
    }
}

/// `(count <> 0 AND inner)`
fn exists_and(count: &Variable, inner: Option<CypherExpr>) -> CypherExpr {
    let exists = CypherExpr::binary(Operator::NotEqual, count.expr(), CypherExpr::integer(0));
    match inner {
        Some(inner) => CypherExpr::binary(Operator::And, exists, inner),
        None => exists,
    }
}

fn count_of(variable: &Variable) -> CypherExpr {
    CypherExpr::function("count", vec![variable.expr()])
}

impl<'c, 'a> FilterCompiler<'c, 'a> {
    pub(super) fn traversal(
        &mut self,
        field: &RelationshipField,
        with_edge: bool,
        source: &Variable,
    ) -> Result<Traversal<'a>, QueryPlannerError> {
        let target = self.ctx.schema().target_type(&field.target)?;
        let related = self.ctx.pattern_var();
        let edge = if with_edge {
            Some(self.ctx.pattern_var())
        } else {
            None
        };
        let pattern = relationship_pattern(source, field, edge.as_ref(), &target, &related);
        let restriction = label_restriction(&related, &target);
        Ok(Traversal {
            target,
            related,
            edge,
            pattern,
            restriction,
        })
    }

    pub(super) fn compile_relationship(
        &mut self,
        owner: &str,
        field: &RelationshipField,
        quantifier: Option<Quantifier>,
        connection: bool,
        value: &Value,
        source: &Variable,
    ) -> Result<Option<CypherExpr>, QueryPlannerError> {
        let quantifier = match (quantifier, field.is_list()) {
            (Some(quantifier), true) => Some(quantifier),
            (Some(quantifier), false) => {
                return Err(QueryPlannerError::schema_mismatch(
                    owner,
                    &field.name,
                    format!("_{} applies to list relationships only", quantifier.name()),
                ))
            }
            (None, true) => {
                self.check_deprecated_alias(owner, &field.name)?;
                Some(Quantifier::Some)
            }
            (None, false) => None,
        };

        let with_edge = connection && field.properties.is_some();
        let traversal = self.traversal(field, with_edge, source)?;
        match quantifier {
            Some(quantifier) => {
                self.compile_quantified(quantifier, field, connection, value, traversal)
            }
            None => self.compile_to_one(field, connection, value, source, traversal),
        }
    }

    /// Filter over the related end, compiled by a nested compiler.
    fn compile_related(
        &mut self,
        field: &RelationshipField,
        connection: bool,
        value: &Value,
        traversal: &Traversal<'a>,
        options: FilterOptions,
    ) -> Result<Predicate, QueryPlannerError> {
        let mut nested = self.nested(options);
        let expr = if connection {
            nested.compile_connection(
                field,
                value,
                &traversal.target,
                &traversal.related,
                traversal.edge.as_ref(),
            )?
        } else {
            nested.compile_for_target(value, &traversal.target, &traversal.related)?
        };
        Ok(Predicate {
            preceding: nested.preceding,
            expr,
        })
    }

    /// `{node: {...}, edge: {...}}` with AND/OR/NOT
    pub(super) fn compile_connection(
        &mut self,
        field: &RelationshipField,
        value: &Value,
        target: &TargetType<'a>,
        related: &Variable,
        edge: Option<&Variable>,
    ) -> Result<Option<CypherExpr>, QueryPlannerError> {
        let map = match value {
            Value::Null => return Ok(None),
            Value::Object(map) => map,
            other => {
                return Err(QueryPlannerError::invalid_argument(
                    field.connection_field_name(),
                    format!("expected an object, got {}", other),
                ))
            }
        };

        let mut parts = Vec::with_capacity(map.len());
        for (key, sub) in map {
            let predicate = match key.as_str() {
                "AND" | "OR" => {
                    let items = sub.as_array().ok_or_else(|| {
                        QueryPlannerError::invalid_argument(
                            key,
                            format!("expected a list, got {}", sub),
                        )
                    })?;
                    let mut children = Vec::with_capacity(items.len());
                    for item in items {
                        let child = self.compile_connection(field, item, target, related, edge)?;
                        children.extend(child);
                    }
                    if key == "OR" {
                        CypherExpr::or_all(children)
                    } else {
                        CypherExpr::and_all(children)
                    }
                }
                "NOT" => self
                    .compile_connection(field, sub, target, related, edge)?
                    .map(CypherExpr::not),
                "node" => self.compile_for_target(sub, target, related)?,
                "edge" => {
                    let (Some(properties), Some(edge)) = (&field.properties, edge) else {
                        return Err(QueryPlannerError::schema_mismatch(
                            field.connection_field_name(),
                            "edge",
                            "relationship carries no properties",
                        ));
                    };
                    let properties = self.ctx.schema().get_relationship_properties(properties)?;
                    self.compile(sub, &FilterTarget::Edge(properties), edge)?
                }
                _ => {
                    return Err(QueryPlannerError::unknown_field(
                        field.connection_field_name(),
                        key,
                    ))
                }
            };
            parts.extend(predicate);
        }
        Ok(CypherExpr::and_all(parts))
    }

    fn compile_quantified(
        &mut self,
        quantifier: Quantifier,
        field: &RelationshipField,
        connection: bool,
        value: &Value,
        traversal: Traversal<'a>,
    ) -> Result<Option<CypherExpr>, QueryPlannerError> {
        let inner = self
            .compile_related(field, connection, value, &traversal, self.options.inline())?
            .expr;

        let (predicate, operator, expected) = match quantifier {
            Quantifier::Some => (inner, Operator::GreaterThan, 0),
            Quantifier::None => (inner, Operator::Equal, 0),
            Quantifier::Single => (inner, Operator::Equal, 1),
            Quantifier::All => match inner {
                // every related node passes an empty filter
                None => return Ok(None),
                Some(inner) => (Some(inner.not()), Operator::Equal, 0),
            },
        };
        Ok(Some(CypherExpr::binary(
            operator,
            traversal.count(predicate),
            CypherExpr::integer(expected),
        )))
    }

    fn compile_to_one(
        &mut self,
        field: &RelationshipField,
        connection: bool,
        value: &Value,
        source: &Variable,
        traversal: Traversal<'a>,
    ) -> Result<Option<CypherExpr>, QueryPlannerError> {
        if value.is_null() {
            return Ok(Some(CypherExpr::binary(
                Operator::Equal,
                traversal.count(None),
                CypherExpr::integer(0),
            )));
        }

        match self.options.to_one {
            ToOneStrategy::Inline => {
                let inner = self
                    .compile_related(field, connection, value, &traversal, self.options)?
                    .expr;
                Ok(Some(CypherExpr::binary(
                    Operator::GreaterThan,
                    traversal.count(inner),
                    CypherExpr::integer(0),
                )))
            }
            ToOneStrategy::OptionalMatch => {
                let inner = self
                    .compile_related(field, connection, value, &traversal, self.options.inline())?
                    .expr;
                let count = self.ctx.value_var();
                self.preceding.push(Clause::Match(traversal.match_clause(true)));
                self.preceding.push(Clause::with_items(vec![
                    ProjectionItem::Star,
                    ProjectionItem::aliased(count_of(&traversal.related), &count),
                ]));
                Ok(Some(exists_and(&count, inner)))
            }
            ToOneStrategy::FilterSubquery => {
                let count = self.ctx.value_var();
                let result = self.ctx.value_var();
                let inner =
                    self.compile_related(field, connection, value, &traversal, self.options)?;

                let mut body = ClauseTree::new();
                body.push(Clause::Match(traversal.match_clause(true)));
                body.push(Clause::with_items(vec![
                    ProjectionItem::Star,
                    ProjectionItem::aliased(count_of(&traversal.related), &count),
                ]));
                body.extend(inner.preceding);
                body.push(Clause::return_items(vec![ProjectionItem::aliased(
                    exists_and(&count, inner.expr),
                    &result,
                )]));

                self.preceding.push(Clause::call(vec![source.clone()], body));
                Ok(Some(result.expr().eq(CypherExpr::boolean(true))))
            }
            ToOneStrategy::ValidateSubquery => {
                let result = self.ctx.value_var();
                let inner =
                    self.compile_related(field, connection, value, &traversal, self.options)?;

                let mut body = ClauseTree::from(bind(traversal.match_clause(false), inner));
                body.push(Clause::return_items(vec![ProjectionItem::aliased(
                    CypherExpr::binary(
                        Operator::NotEqual,
                        count_of(&traversal.related),
                        CypherExpr::integer(0),
                    ),
                    &result,
                )]));

                self.preceding.push(Clause::call(vec![source.clone()], body));
                Ok(Some(result.expr().eq(CypherExpr::boolean(true))))
            }
        }
    }
}
