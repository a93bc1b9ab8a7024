//! Predicate compiler: `where` objects to boolean expressions.
//!
//! A filter compiles to a [`Predicate`]: the boolean expression plus any
//! clauses that must run ahead of the `WHERE` consuming it (to-one
//! relationship counts, aggregate subqueries). Wherever no clause can precede
//! the predicate, as inside a `COUNT { }` subquery, the compiler switches to
//! [`ToOneStrategy::Inline`] and emits existential subqueries only.

mod aggregate;
pub mod operators;
mod relationship;

use serde_json::{Map, Value};

use self::operators::{split_quantifier_key, split_scalar_key, Quantifier, ScalarOperator};
use super::errors::QueryPlannerError;
use super::plan_ctx::PlanCtx;
use super::scalar::{check_scalar, claim_reference, list_param, value_param};
use crate::graph_catalog::{
    InterfaceType, NodeType, PropertySchema, RelationshipField, RelationshipProperties, ScalarKind,
    TargetType,
};
use crate::render_plan::clause::Clause;
use crate::render_plan::{CypherExpr, Operator, Variable};

/// How a bare to-one relationship filter (`owner: {...}`) is compiled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToOneStrategy {
    /// `OPTIONAL MATCH` + `WITH *, count(x) AS varN` ahead of the `WHERE`
    OptionalMatch,
    /// `CALL { OPTIONAL MATCH ... RETURN <test> AS varN }`, for authorization filters
    FilterSubquery,
    /// `CALL { MATCH ... WHERE inner RETURN count(x) <> 0 AS varN }`, for
    /// authorization assertions where a missing node must fail
    ValidateSubquery,
    /// `COUNT { MATCH ... WHERE inner } > 0`
    Inline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterOptions {
    pub to_one: ToOneStrategy,
    /// Resolve `"$jwt.<path>"` string values to claim references
    pub allow_claims: bool,
}

impl FilterOptions {
    pub fn user() -> Self {
        FilterOptions {
            to_one: ToOneStrategy::OptionalMatch,
            allow_claims: false,
        }
    }

    pub fn authorization_filter() -> Self {
        FilterOptions {
            to_one: ToOneStrategy::FilterSubquery,
            allow_claims: true,
        }
    }

    pub fn authorization_validate() -> Self {
        FilterOptions {
            to_one: ToOneStrategy::ValidateSubquery,
            allow_claims: true,
        }
    }

    pub fn inline(self) -> Self {
        FilterOptions {
            to_one: ToOneStrategy::Inline,
            ..self
        }
    }

    fn allows_preceding(&self) -> bool {
        self.to_one != ToOneStrategy::Inline
    }
}

/// Boolean expression plus the clauses that must be bound before it
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    pub preceding: Vec<Clause>,
    pub expr: Option<CypherExpr>,
}

impl Predicate {
    pub fn expr(expr: CypherExpr) -> Self {
        Predicate {
            preceding: vec![],
            expr: Some(expr),
        }
    }

    /// Conjunction; preceding clauses keep their order, `self` first
    pub fn and(mut self, other: Predicate) -> Predicate {
        self.preceding.extend(other.preceding);
        self.expr = CypherExpr::conjoin(self.expr, other.expr);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.preceding.is_empty() && self.expr.is_none()
    }
}

/// What a filter object's keys are resolved against
#[derive(Debug, Clone)]
pub enum FilterTarget<'a> {
    Node(&'a NodeType),
    Interface {
        interface: &'a InterfaceType,
        members: Vec<&'a NodeType>,
    },
    /// Properties of the relationship itself (`edge` filters)
    Edge(&'a RelationshipProperties),
    /// Claims of the caller (`jwt` filters in authorization rules)
    Jwt,
}

impl<'a> FilterTarget<'a> {
    /// Filter target of a relationship's node end. Unions have no shared
    /// fields; their filters are keyed per member instead.
    pub fn for_target(target: &TargetType<'a>) -> Option<Self> {
        match target {
            TargetType::Node(node) => Some(FilterTarget::Node(node)),
            TargetType::Interface { interface, members } => Some(FilterTarget::Interface {
                interface,
                members: members.clone(),
            }),
            TargetType::Union { .. } => None,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            FilterTarget::Node(node) => &node.name,
            FilterTarget::Interface { interface, .. } => &interface.name,
            FilterTarget::Edge(properties) => &properties.name,
            FilterTarget::Jwt => "jwt",
        }
    }

    pub fn property(&self, name: &str) -> Option<&'a PropertySchema> {
        match self {
            FilterTarget::Node(node) => node.property(name),
            FilterTarget::Interface { interface, .. } => interface.property(name),
            FilterTarget::Edge(properties) => properties.property(name),
            FilterTarget::Jwt => None,
        }
    }

    pub fn relationship(&self, name: &str) -> Option<&'a RelationshipField> {
        match self {
            FilterTarget::Node(node) => node.relationship(name),
            FilterTarget::Interface { interface, .. } => interface.relationship(name),
            FilterTarget::Edge(_) | FilterTarget::Jwt => None,
        }
    }
}

/// Meaning of one key of a filter object
enum FilterKey<'a> {
    Scalar {
        property: &'a PropertySchema,
        operator: ScalarOperator,
        deprecated: bool,
    },
    Relationship {
        field: &'a RelationshipField,
        quantifier: Option<Quantifier>,
        connection: bool,
    },
    Aggregate {
        field: &'a RelationshipField,
    },
    TypenameIn,
}

fn resolve_key<'a>(target: &FilterTarget<'a>, key: &str) -> Option<FilterKey<'a>> {
    if let Some(property) = target.property(key) {
        return Some(FilterKey::Scalar {
            property,
            operator: ScalarOperator::Eq,
            deprecated: true,
        });
    }
    if let Some(field) = target.relationship(key) {
        return Some(FilterKey::Relationship {
            field,
            quantifier: None,
            connection: false,
        });
    }
    if let Some(field) = key
        .strip_suffix("Connection")
        .and_then(|name| target.relationship(name))
    {
        return Some(FilterKey::Relationship {
            field,
            quantifier: None,
            connection: true,
        });
    }
    if let Some(field) = key
        .strip_suffix("Aggregate")
        .and_then(|name| target.relationship(name))
        .filter(|field| field.aggregate)
    {
        return Some(FilterKey::Aggregate { field });
    }
    if let Some((name, quantifier)) = split_quantifier_key(key) {
        if let Some(field) = target.relationship(name) {
            return Some(FilterKey::Relationship {
                field,
                quantifier: Some(quantifier),
                connection: false,
            });
        }
        if let Some(field) = name
            .strip_suffix("Connection")
            .and_then(|name| target.relationship(name))
        {
            return Some(FilterKey::Relationship {
                field,
                quantifier: Some(quantifier),
                connection: true,
            });
        }
    }
    if let Some((name, operator)) = split_scalar_key(key) {
        if let Some(property) = target.property(name) {
            return Some(FilterKey::Scalar {
                property,
                operator,
                deprecated: false,
            });
        }
    }
    if key == "typename_IN" && matches!(target, FilterTarget::Interface { .. }) {
        return Some(FilterKey::TypenameIn);
    }
    None
}

/// Compile a `where` object against `target`, bound to `variable`.
pub fn compile_filter<'a>(
    ctx: &mut PlanCtx<'a>,
    filter: &Value,
    target: &FilterTarget<'a>,
    variable: &Variable,
    options: FilterOptions,
) -> Result<Predicate, QueryPlannerError> {
    let mut compiler = FilterCompiler::new(ctx, options);
    let expr = compiler.compile(filter, target, variable)?;
    Ok(Predicate {
        preceding: compiler.preceding,
        expr,
    })
}

/// Compile a `where` object over a relationship target, which may be a union.
pub fn compile_target_filter<'a>(
    ctx: &mut PlanCtx<'a>,
    filter: &Value,
    target: &TargetType<'a>,
    variable: &Variable,
    options: FilterOptions,
) -> Result<Predicate, QueryPlannerError> {
    let mut compiler = FilterCompiler::new(ctx, options);
    let expr = compiler.compile_for_target(filter, target, variable)?;
    Ok(Predicate {
        preceding: compiler.preceding,
        expr,
    })
}

/// Compile a connection `where` (`{node: {...}, edge: {...}}`) over a bound
/// traversal; `edge` is required when the filter tests edge properties.
#[allow(clippy::too_many_arguments)]
pub fn compile_connection_filter<'a>(
    ctx: &mut PlanCtx<'a>,
    filter: &Value,
    field: &RelationshipField,
    target: &TargetType<'a>,
    related: &Variable,
    edge: Option<&Variable>,
    options: FilterOptions,
) -> Result<Predicate, QueryPlannerError> {
    let mut compiler = FilterCompiler::new(ctx, options);
    let expr = compiler.compile_connection(field, filter, target, related, edge)?;
    Ok(Predicate {
        preceding: compiler.preceding,
        expr,
    })
}

pub(crate) struct FilterCompiler<'c, 'a> {
    ctx: &'c mut PlanCtx<'a>,
    options: FilterOptions,
    preceding: Vec<Clause>,
}

impl<'c, 'a> FilterCompiler<'c, 'a> {
    pub(crate) fn new(ctx: &'c mut PlanCtx<'a>, options: FilterOptions) -> Self {
        FilterCompiler {
            ctx,
            options,
            preceding: vec![],
        }
    }

    /// Compiler over the same context with other options and its own
    /// preceding clauses
    fn nested(&mut self, options: FilterOptions) -> FilterCompiler<'_, 'a> {
        FilterCompiler {
            ctx: &mut *self.ctx,
            options,
            preceding: vec![],
        }
    }

    pub(crate) fn compile(
        &mut self,
        filter: &Value,
        target: &FilterTarget<'a>,
        variable: &Variable,
    ) -> Result<Option<CypherExpr>, QueryPlannerError> {
        match filter {
            Value::Null => Ok(None),
            Value::Object(map) => self.compile_map(map, target, variable),
            other => Err(QueryPlannerError::invalid_argument(
                format!("{} filter", target.name()),
                format!("expected an object, got {}", other),
            )),
        }
    }

    /// Filter over a relationship's node end. Union filters are keyed by
    /// member type name: `{Movie: {...}, Series: {...}}`.
    pub(crate) fn compile_for_target(
        &mut self,
        filter: &Value,
        target: &TargetType<'a>,
        variable: &Variable,
    ) -> Result<Option<CypherExpr>, QueryPlannerError> {
        if let Some(filter_target) = FilterTarget::for_target(target) {
            return self.compile(filter, &filter_target, variable);
        }

        let map = match filter {
            Value::Null => return Ok(None),
            Value::Object(map) => map,
            other => {
                return Err(QueryPlannerError::invalid_argument(
                    format!("{} filter", target.name()),
                    format!("expected an object keyed by member type, got {}", other),
                ))
            }
        };

        let members = target.members();
        let mut branches = Vec::with_capacity(map.len());
        for (type_name, member_filter) in map {
            let member = members
                .iter()
                .copied()
                .find(|m| m.name == *type_name)
                .ok_or_else(|| {
                    let reason = "not a member type";
                    QueryPlannerError::schema_mismatch(target.name(), type_name, reason)
                })?;
            let label = CypherExpr::HasLabel {
                variable: variable.clone(),
                label: member.main_label().to_string(),
            };
            let predicate = self.compile(member_filter, &FilterTarget::Node(member), variable)?;
            branches.push(match predicate {
                Some(predicate) => CypherExpr::binary(Operator::And, label, predicate),
                None => label,
            });
        }
        Ok(CypherExpr::or_all(branches))
    }

    fn compile_map(
        &mut self,
        map: &Map<String, Value>,
        target: &FilterTarget<'a>,
        variable: &Variable,
    ) -> Result<Option<CypherExpr>, QueryPlannerError> {
        let mut predicates = Vec::with_capacity(map.len());
        for (key, value) in map {
            let predicate = match key.as_str() {
                "AND" => self.compile_logical(key, Operator::And, value, target, variable)?,
                "OR" => self.compile_logical(key, Operator::Or, value, target, variable)?,
                "NOT" => self.compile(value, target, variable)?.map(CypherExpr::not),
                _ => self.compile_field(key, value, target, variable)?,
            };
            predicates.extend(predicate);
        }
        Ok(CypherExpr::and_all(predicates))
    }

    fn compile_logical(
        &mut self,
        key: &str,
        operator: Operator,
        value: &Value,
        target: &FilterTarget<'a>,
        variable: &Variable,
    ) -> Result<Option<CypherExpr>, QueryPlannerError> {
        let items = value.as_array().ok_or_else(|| {
            QueryPlannerError::invalid_argument(key, format!("expected a list, got {}", value))
        })?;

        let mut parts = Vec::with_capacity(items.len());
        for item in items {
            parts.extend(self.compile(item, target, variable)?);
        }
        Ok(match operator {
            Operator::Or => CypherExpr::or_all(parts),
            _ => CypherExpr::and_all(parts),
        })
    }

    fn compile_field(
        &mut self,
        key: &str,
        value: &Value,
        target: &FilterTarget<'a>,
        variable: &Variable,
    ) -> Result<Option<CypherExpr>, QueryPlannerError> {
        if let FilterTarget::Jwt = target {
            return self.compile_claim(key, value).map(Some);
        }

        let resolved = resolve_key(target, key)
            .ok_or_else(|| QueryPlannerError::unknown_field(target.name(), key))?;

        match resolved {
            FilterKey::Scalar {
                property,
                operator,
                deprecated,
            } => {
                if deprecated {
                    self.check_deprecated_alias(target.name(), key)?;
                }
                let subject = variable.property(property.db_name());
                self.check_operator(
                    target.name(),
                    &property.name,
                    Some(property.kind),
                    property.list,
                    operator,
                )?;
                self.compile_comparison(
                    subject,
                    Some(property.kind),
                    property.list,
                    operator,
                    value,
                    target.name(),
                    &property.name,
                )
                .map(Some)
            }
            FilterKey::Relationship {
                field,
                quantifier,
                connection,
            } => self.compile_relationship(
                target.name(),
                field,
                quantifier,
                connection,
                value,
                variable,
            ),
            FilterKey::Aggregate { field } => self.compile_aggregate(field, value, variable),
            FilterKey::TypenameIn => self.compile_typename_in(target, value, variable).map(Some),
        }
    }

    fn check_deprecated_alias(&self, type_name: &str, key: &str) -> Result<(), QueryPlannerError> {
        if self.ctx.config().allow_deprecated_aliases {
            log::debug!("Deprecated filter alias `{}` on {}", key, type_name);
            Ok(())
        } else {
            Err(QueryPlannerError::schema_mismatch(
                type_name,
                key,
                "bare field filters are disabled, use an explicit operator suffix",
            ))
        }
    }

    fn check_operator(
        &self,
        type_name: &str,
        field: &str,
        kind: Option<ScalarKind>,
        list: bool,
        operator: ScalarOperator,
    ) -> Result<(), QueryPlannerError> {
        if operator.supports(kind, list, self.ctx.config().enable_regex) {
            return Ok(());
        }
        let shape = match (kind, list) {
            (Some(kind), true) => format!("[{}]", kind),
            (Some(kind), false) => kind.to_string(),
            (None, _) => "claim".to_string(),
        };
        Err(QueryPlannerError::schema_mismatch(
            type_name,
            field,
            format!("operator _{} is not declared for {} fields", operator.name(), shape),
        ))
    }

    /// `subject <op> value`, with claim references, null checks and list
    /// handling resolved.
    #[allow(clippy::too_many_arguments)]
    fn compile_comparison(
        &mut self,
        subject: CypherExpr,
        kind: Option<ScalarKind>,
        list: bool,
        operator: ScalarOperator,
        value: &Value,
        type_name: &str,
        field: &str,
    ) -> Result<CypherExpr, QueryPlannerError> {
        if self.options.allow_claims {
            if let Some(claim) = claim_reference(self.ctx, value) {
                let guard = claim.clone().is_not_null();
                let comparison = operator.apply(subject, claim);
                return Ok(CypherExpr::binary(Operator::And, guard, comparison));
            }
        }

        let check = |item: &Value| match kind {
            Some(kind) => check_scalar(type_name, field, kind, item),
            None => Ok(()),
        };
        let expect_list = || {
            value.as_array().ok_or_else(|| {
                QueryPlannerError::invalid_argument(
                    format!("{}.{}_{}", type_name, field, operator.name()),
                    format!("expected a list, got {}", value),
                )
            })
        };

        let operand = match operator {
            ScalarOperator::Eq if value.is_null() => {
                return Ok(subject.is_null());
            }
            ScalarOperator::In => {
                let items = expect_list()?;
                items.iter().try_for_each(check)?;
                list_param(self.ctx, kind, items)
            }
            ScalarOperator::Eq if list => {
                let items = expect_list()?;
                items.iter().try_for_each(check)?;
                list_param(self.ctx, kind, items)
            }
            _ if value.is_null() => {
                return Err(QueryPlannerError::invalid_argument(
                    format!("{}.{}_{}", type_name, field, operator.name()),
                    "null is only accepted by _EQ",
                ));
            }
            _ => {
                check(value)?;
                value_param(self.ctx, kind, value)
            }
        };
        Ok(operator.apply(subject, operand))
    }

    /// Comparison against a claim: `($jwt.roles IS NOT NULL AND $p IN $jwt.roles)`
    fn compile_claim(&mut self, key: &str, value: &Value) -> Result<CypherExpr, QueryPlannerError> {
        let (path, operator) = match split_scalar_key(key) {
            Some(split) => split,
            None => {
                self.check_deprecated_alias("jwt", key)?;
                (key, ScalarOperator::Eq)
            }
        };
        self.check_operator("jwt", path, None, false, operator)?;

        let claim = path
            .split('.')
            .fold(self.ctx.jwt(), |expr, segment| expr.property(segment));
        let guard = claim.clone().is_not_null();

        let operand = match operator {
            ScalarOperator::Eq if value.is_null() => {
                return Ok(claim.is_null());
            }
            _ => self.ctx.param(value.clone()),
        };
        Ok(CypherExpr::binary(
            Operator::And,
            guard,
            operator.apply(claim, operand),
        ))
    }

    fn compile_typename_in(
        &mut self,
        target: &FilterTarget<'a>,
        value: &Value,
        variable: &Variable,
    ) -> Result<CypherExpr, QueryPlannerError> {
        let FilterTarget::Interface { interface, members } = target else {
            return Err(QueryPlannerError::unknown_field(target.name(), "typename_IN"));
        };
        let names = value.as_array().ok_or_else(|| {
            QueryPlannerError::invalid_argument(
                "typename_IN",
                format!("expected a list, got {}", value),
            )
        })?;

        let mut labels = Vec::with_capacity(names.len());
        for name in names {
            let member = name
                .as_str()
                .and_then(|name| members.iter().find(|m| m.name == name))
                .ok_or_else(|| {
                    QueryPlannerError::schema_mismatch(
                        &interface.name,
                        "typename_IN",
                        format!("{} is not a member type", name),
                    )
                })?;
            labels.push(member.main_label());
        }
        Ok(CypherExpr::has_any_label(variable, &labels)
            .unwrap_or_else(|| CypherExpr::boolean(false)))
    }
}
