//! `SET` items for node and relationship properties.

use serde_json::{Map, Value};

use crate::graph_catalog::{NodeType, PropertySchema, RelationshipProperties};
use crate::query_planner::errors::QueryPlannerError;
use crate::query_planner::plan_ctx::PlanCtx;
use crate::query_planner::scalar::{check_property_value, check_scalar, list_param, value_param};
use crate::render_plan::{CypherExpr, Operator, SetItem, Variable};

/// Type whose properties an input sets
#[derive(Clone, Copy)]
pub(super) struct Owner<'a> {
    name: &'a str,
    properties: &'a [PropertySchema],
    node: Option<&'a NodeType>,
}

impl<'a> Owner<'a> {
    pub fn node(node: &'a NodeType) -> Self {
        Owner {
            name: &node.name,
            properties: &node.properties,
            node: Some(node),
        }
    }

    pub fn edge(properties: &'a RelationshipProperties) -> Self {
        Owner {
            name: &properties.name,
            properties: &properties.properties,
            node: None,
        }
    }

    fn property(&self, name: &str) -> Option<&'a PropertySchema> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Relationship keys are handled by the relationship operations
    fn is_relationship(&self, key: &str) -> bool {
        self.node.is_some_and(|node| node.relationship(key).is_some())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UpdateOperator {
    Set,
    Increment,
    Decrement,
    Push,
    Pop,
}

fn split_update_key(key: &str) -> Option<(&str, UpdateOperator)> {
    const SUFFIXES: [(&str, UpdateOperator); 5] = [
        ("_SET", UpdateOperator::Set),
        ("_INCREMENT", UpdateOperator::Increment),
        ("_DECREMENT", UpdateOperator::Decrement),
        ("_PUSH", UpdateOperator::Push),
        ("_POP", UpdateOperator::Pop),
    ];
    SUFFIXES
        .iter()
        .find_map(|(suffix, operator)| key.strip_suffix(suffix).map(|name| (name, *operator)))
}

fn property_value(ctx: &mut PlanCtx, property: &PropertySchema, value: &Value) -> CypherExpr {
    match value {
        Value::Array(items) if property.list => list_param(ctx, Some(property.kind), items),
        _ => value_param(ctx, Some(property.kind), value),
    }
}

fn check_nullable(
    owner: &Owner,
    property: &PropertySchema,
    value: &Value,
) -> Result<(), QueryPlannerError> {
    if value.is_null() && !property.nullable {
        return Err(QueryPlannerError::invalid_argument(
            format!("{}.{}", owner.name, property.name),
            "cannot be null",
        ));
    }
    Ok(())
}

/// Properties of a new node or relationship. Omitted properties take their
/// default; omitted required properties without one are an error.
pub(super) fn create_items(
    ctx: &mut PlanCtx,
    owner: Owner,
    variable: &Variable,
    input: &Map<String, Value>,
) -> Result<Vec<SetItem>, QueryPlannerError> {
    build_create_items(ctx, owner, variable, input, None)
}

/// [`create_items`] of a node merged on `key`, which the `MERGE` pattern
/// already sets
pub(super) fn merge_create_items(
    ctx: &mut PlanCtx,
    owner: Owner,
    variable: &Variable,
    input: &Map<String, Value>,
    key: &str,
) -> Result<Vec<SetItem>, QueryPlannerError> {
    build_create_items(ctx, owner, variable, input, Some(key))
}

fn build_create_items(
    ctx: &mut PlanCtx,
    owner: Owner,
    variable: &Variable,
    input: &Map<String, Value>,
    merged: Option<&str>,
) -> Result<Vec<SetItem>, QueryPlannerError> {
    let mut items = Vec::with_capacity(owner.properties.len());
    for (key, value) in input {
        if owner.is_relationship(key) || merged == Some(key.as_str()) {
            continue;
        }
        let property = owner
            .property(key)
            .ok_or_else(|| QueryPlannerError::unknown_field(owner.name, key))?;
        check_property_value(owner.name, property, value)?;
        check_nullable(&owner, property, value)?;
        items.push(SetItem {
            target: variable.property(property.db_name()),
            value: property_value(ctx, property, value),
        });
    }

    for property in owner.properties {
        if input.contains_key(&property.name) || merged == Some(property.name.as_str()) {
            continue;
        }
        match &property.default {
            Some(default) => items.push(SetItem {
                target: variable.property(property.db_name()),
                value: property_value(ctx, property, default),
            }),
            None if !property.nullable => {
                return Err(QueryPlannerError::invalid_argument(
                    format!("{}.{}", owner.name, property.name),
                    "required when creating",
                ))
            }
            None => {}
        }
    }

    ctx.summary_mut().properties_set += items.len();
    Ok(items)
}

/// Property changes of an update input: `title_SET`, `views_INCREMENT`,
/// `tags_PUSH` and friends. Bare names are the deprecated form of `_SET`.
pub(super) fn update_items(
    ctx: &mut PlanCtx,
    owner: Owner,
    variable: &Variable,
    input: &Map<String, Value>,
) -> Result<Vec<SetItem>, QueryPlannerError> {
    let mut items: Vec<SetItem> = Vec::with_capacity(input.len());
    let mut updated: Vec<&str> = Vec::with_capacity(input.len());
    for (key, value) in input {
        if owner.is_relationship(key) {
            continue;
        }
        let (name, operator) = match (split_update_key(key), owner.property(key)) {
            (Some((name, operator)), _) if owner.property(name).is_some() => (name, operator),
            (_, Some(_)) if ctx.config().allow_deprecated_aliases => {
                (key.as_str(), UpdateOperator::Set)
            }
            (_, Some(_)) => {
                return Err(QueryPlannerError::invalid_argument(
                    key,
                    format!("use `{}_SET`", key),
                ))
            }
            _ => return Err(QueryPlannerError::unknown_field(owner.name, key)),
        };
        let Some(property) = owner.property(name) else {
            return Err(QueryPlannerError::unknown_field(owner.name, key));
        };
        if updated.contains(&name) {
            return Err(QueryPlannerError::invalid_argument(
                key,
                format!("`{}` is updated more than once", name),
            ));
        }
        updated.push(name);

        let target = variable.property(property.db_name());
        let value = match operator {
            UpdateOperator::Set => {
                check_property_value(owner.name, property, value)?;
                check_nullable(&owner, property, value)?;
                property_value(ctx, property, value)
            }
            UpdateOperator::Increment | UpdateOperator::Decrement => {
                if property.list || !property.kind.is_numeric() {
                    return Err(QueryPlannerError::schema_mismatch(
                        owner.name,
                        name,
                        "only numeric fields can be incremented",
                    ));
                }
                if value.is_null() {
                    return Err(QueryPlannerError::invalid_argument(key, "cannot be null"));
                }
                check_scalar(owner.name, name, property.kind, value)?;
                let arithmetic = if operator == UpdateOperator::Increment {
                    Operator::Addition
                } else {
                    Operator::Subtraction
                };
                let amount = value_param(ctx, Some(property.kind), value);
                CypherExpr::binary(arithmetic, target.clone(), amount)
            }
            UpdateOperator::Push => {
                if !property.list {
                    return Err(QueryPlannerError::schema_mismatch(
                        owner.name,
                        name,
                        "only list fields can be pushed to",
                    ));
                }
                let pushed = match value {
                    Value::Array(values) => values.clone(),
                    Value::Null => vec![],
                    single => vec![single.clone()],
                };
                for item in &pushed {
                    check_scalar(owner.name, name, property.kind, item)?;
                }
                let pushed = list_param(ctx, Some(property.kind), &pushed);
                CypherExpr::binary(Operator::Addition, target.clone(), pushed)
            }
            UpdateOperator::Pop => {
                if !property.list {
                    return Err(QueryPlannerError::schema_mismatch(
                        owner.name,
                        name,
                        "only list fields can be popped from",
                    ));
                }
                if value.as_u64().is_none() {
                    return Err(QueryPlannerError::invalid_argument(
                        key,
                        "expected a non-negative integer",
                    ));
                }
                let count = ctx.param(value.clone());
                let remaining = CypherExpr::binary(
                    Operator::Subtraction,
                    CypherExpr::function("size", vec![target.clone()]),
                    count,
                );
                CypherExpr::Slice {
                    list: Box::new(target.clone()),
                    from: None,
                    to: Some(Box::new(remaining)),
                }
            }
        };
        items.push(SetItem { target, value });
    }

    ctx.summary_mut().properties_set += items.len();
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompilerConfig;
    use crate::cypher_generator::{Emitter, ToCypher};
    use crate::graph_catalog::testing::test_schema;
    use crate::request::ExecutionContext;
    use serde_json::json;

    fn render(items: &[SetItem]) -> String {
        let mut emitter = Emitter::new();
        items.to_cypher(&mut emitter).unwrap()
    }

    #[test]
    fn test_create_fills_defaults() {
        let schema = test_schema();
        let context = ExecutionContext::anonymous();
        let config = CompilerConfig::default();
        let mut ctx = PlanCtx::new(&schema, &context, &config);
        let movie = schema.get_node("Movie").unwrap();

        let input = json!({"id": "m1", "title": "Heat"});
        let items = create_items(
            &mut ctx,
            Owner::node(movie),
            &Variable::this(),
            input.as_object().unwrap(),
        )
        .unwrap();

        assert_eq!(
            render(&items),
            "this.id = $param0, this.title = $param1, this.views = $param2"
        );
        assert_eq!(ctx.summary().properties_set, 3);
    }

    #[test]
    fn test_create_requires_non_nullable() {
        let schema = test_schema();
        let context = ExecutionContext::anonymous();
        let config = CompilerConfig::default();
        let mut ctx = PlanCtx::new(&schema, &context, &config);
        let movie = schema.get_node("Movie").unwrap();

        let input = json!({"title": "Heat"});
        let err = create_items(
            &mut ctx,
            Owner::node(movie),
            &Variable::this(),
            input.as_object().unwrap(),
        )
        .unwrap_err();
        assert!(matches!(err, QueryPlannerError::InvalidArgument { .. }));
    }

    #[test]
    fn test_update_operators() {
        let schema = test_schema();
        let context = ExecutionContext::anonymous();
        let config = CompilerConfig::default();
        let mut ctx = PlanCtx::new(&schema, &context, &config);
        let movie = schema.get_node("Movie").unwrap();

        let input = json!({
            "title_SET": "Heat",
            "views_INCREMENT": 2,
            "tags_PUSH": "noir",
            "rating": 7.5
        });
        let items = update_items(
            &mut ctx,
            Owner::node(movie),
            &Variable::this(),
            input.as_object().unwrap(),
        )
        .unwrap();

        assert_eq!(
            render(&items),
            "this.title = $param0, this.views = this.views + $param1, \
             this.tags = this.tags + $param2, this.rating = $param3"
        );
    }

    #[test]
    fn test_update_pop_slices() {
        let schema = test_schema();
        let context = ExecutionContext::anonymous();
        let config = CompilerConfig::default();
        let mut ctx = PlanCtx::new(&schema, &context, &config);
        let movie = schema.get_node("Movie").unwrap();

        let input = json!({"tags_POP": 1});
        let items = update_items(
            &mut ctx,
            Owner::node(movie),
            &Variable::this(),
            input.as_object().unwrap(),
        )
        .unwrap();
        assert_eq!(render(&items), "this.tags = this.tags[..size(this.tags) - $param0]");
    }

    #[test]
    fn test_update_rejects_bad_operator_use() {
        let schema = test_schema();
        let context = ExecutionContext::anonymous();
        let config = CompilerConfig {
            allow_deprecated_aliases: false,
            ..Default::default()
        };
        let mut ctx = PlanCtx::new(&schema, &context, &config);
        let movie = schema.get_node("Movie").unwrap();
        let this = Variable::this();

        for input in [
            json!({"title_INCREMENT": 1}),
            json!({"views_PUSH": 1}),
            json!({"title": "bare"}),
            json!({"title_SET": "a", "title": "b"}),
            json!({"missing_SET": 1}),
        ] {
            assert!(
                update_items(&mut ctx, Owner::node(movie), &this, input.as_object().unwrap())
                    .is_err(),
                "{} should be refused",
                input
            );
        }
    }
}
