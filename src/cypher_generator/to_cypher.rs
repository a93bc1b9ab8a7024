use std::collections::HashMap;

use serde_json::{Map, Value};

use super::common::{indent, quote_identifier, string_literal};
use super::errors::CypherGeneratorError;
use crate::graph_catalog::Direction;
use crate::render_plan::clause::{Clause, SortDirection};
use crate::render_plan::cypher_expr::{ParamId, VarId};
use crate::render_plan::{
    CallClause, ClauseTree, CountSubquery, CypherExpr, DeleteClause, Literal, MapProjectionItem,
    MatchClause, MergeClause, NodePattern, Operator, OperatorApplication, Param, Pattern,
    ProcedureCall, Projection, ProjectionItem, RelationshipPattern, SetItem, Variable,
    VariableKind, WithClause,
};

/// Naming state for a single emission pass.
///
/// Variables get `this{n}` or `var{n}` from one shared counter and parameters
/// get `param{n}`, both in order of first appearance in the output text.
#[derive(Debug, Default)]
pub struct Emitter {
    variable_names: HashMap<VarId, String>,
    next_variable: usize,
    param_names: HashMap<ParamId, String>,
    next_param: usize,
    params: Map<String, Value>,
}

impl Emitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn variable(&mut self, variable: &Variable) -> String {
        match variable {
            Variable::Named(name) => name.to_string(),
            Variable::Allocated { id, kind } => {
                if let Some(name) = self.variable_names.get(id) {
                    return name.clone();
                }
                let prefix = match kind {
                    VariableKind::Pattern => "this",
                    VariableKind::Value => "var",
                };
                let name = format!("{}{}", prefix, self.next_variable);
                self.next_variable += 1;
                self.variable_names.insert(*id, name.clone());
                name
            }
        }
    }

    fn param(&mut self, param: &Param) -> String {
        if let Some(name) = self.param_names.get(&param.id) {
            return format!("${}", name);
        }
        let name = format!("param{}", self.next_param);
        self.next_param += 1;
        self.params.insert(name.clone(), param.value.clone());
        self.param_names.insert(param.id, name.clone());
        format!("${}", name)
    }

    fn named_param(&mut self, name: &str, value: &Value) -> Result<String, CypherGeneratorError> {
        match self.params.get(name) {
            Some(existing) if existing != value => {
                return Err(CypherGeneratorError::ConflictingParameter {
                    name: name.to_string(),
                })
            }
            Some(_) => {}
            None => {
                self.params.insert(name.to_string(), value.clone());
            }
        }
        Ok(format!("${}", name))
    }

    /// Parameter table in first-use order
    pub fn into_params(self) -> Map<String, Value> {
        self.params
    }
}

/// Render a node of the clause tree as Cypher text.
pub trait ToCypher {
    fn to_cypher(&self, emitter: &mut Emitter) -> Result<String, CypherGeneratorError>;
}

impl<T: ToCypher> ToCypher for [T] {
    fn to_cypher(&self, emitter: &mut Emitter) -> Result<String, CypherGeneratorError> {
        let parts: Result<Vec<String>, _> =
            self.iter().map(|item| item.to_cypher(emitter)).collect();
        Ok(parts?.join(", "))
    }
}

impl ToCypher for ClauseTree {
    fn to_cypher(&self, emitter: &mut Emitter) -> Result<String, CypherGeneratorError> {
        let lines: Result<Vec<String>, _> =
            self.clauses.iter().map(|clause| clause.to_cypher(emitter)).collect();
        Ok(lines?.join("\n"))
    }
}

impl ToCypher for Clause {
    fn to_cypher(&self, emitter: &mut Emitter) -> Result<String, CypherGeneratorError> {
        match self {
            Clause::Match(m) => m.to_cypher(emitter),
            Clause::With(w) => w.to_cypher(emitter),
            Clause::Unwind(unwind) => {
                let expr = unwind.expr.to_cypher(emitter)?;
                Ok(format!("UNWIND {} AS {}", expr, emitter.variable(&unwind.alias)))
            }
            Clause::Call(call) => call.to_cypher(emitter),
            Clause::Create(pattern) => Ok(format!("CREATE {}", pattern.to_cypher(emitter)?)),
            Clause::Merge(merge) => merge.to_cypher(emitter),
            Clause::Set(items) => Ok(format!("SET {}", items.to_cypher(emitter)?)),
            Clause::Delete(delete) => delete.to_cypher(emitter),
            Clause::Procedure(call) => call.to_cypher(emitter),
            Clause::Return(projection) => render_projection("RETURN", projection, emitter),
        }
    }
}

impl ToCypher for MatchClause {
    fn to_cypher(&self, emitter: &mut Emitter) -> Result<String, CypherGeneratorError> {
        if self.patterns.is_empty() {
            return Err(CypherGeneratorError::EmptyMatch);
        }
        let keyword = if self.optional { "OPTIONAL MATCH" } else { "MATCH" };
        let mut out = format!("{} {}", keyword, self.patterns.to_cypher(emitter)?);
        if let Some(predicate) = &self.predicate {
            out.push_str(&format!("\nWHERE {}", predicate.to_cypher(emitter)?));
        }
        Ok(out)
    }
}

impl ToCypher for WithClause {
    fn to_cypher(&self, emitter: &mut Emitter) -> Result<String, CypherGeneratorError> {
        let mut out = render_projection("WITH", &self.projection, emitter)?;
        if let Some(predicate) = &self.predicate {
            out.push_str(&format!("\nWHERE {}", predicate.to_cypher(emitter)?));
        }
        Ok(out)
    }
}

fn render_projection(
    keyword: &'static str,
    projection: &Projection,
    emitter: &mut Emitter,
) -> Result<String, CypherGeneratorError> {
    if projection.items.is_empty() {
        return Err(CypherGeneratorError::EmptyProjection(keyword));
    }
    let distinct = if projection.distinct { " DISTINCT" } else { "" };
    let mut out = format!(
        "{}{} {}",
        keyword,
        distinct,
        projection.items.to_cypher(emitter)?
    );

    if !projection.order_by.is_empty() {
        let mut items = Vec::with_capacity(projection.order_by.len());
        for item in &projection.order_by {
            let direction = match item.direction {
                SortDirection::Asc => "ASC",
                SortDirection::Desc => "DESC",
            };
            items.push(format!("{} {}", item.expr.to_cypher(emitter)?, direction));
        }
        out.push_str(&format!("\nORDER BY {}", items.join(", ")));
    }
    if let Some(skip) = &projection.skip {
        out.push_str(&format!("\nSKIP {}", skip.to_cypher(emitter)?));
    }
    if let Some(limit) = &projection.limit {
        out.push_str(&format!("\nLIMIT {}", limit.to_cypher(emitter)?));
    }
    Ok(out)
}

impl ToCypher for ProjectionItem {
    fn to_cypher(&self, emitter: &mut Emitter) -> Result<String, CypherGeneratorError> {
        match self {
            ProjectionItem::Star => Ok("*".to_string()),
            ProjectionItem::Expr { expr, alias: None } => expr.to_cypher(emitter),
            ProjectionItem::Expr {
                expr,
                alias: Some(alias),
            } => {
                let expr = expr.to_cypher(emitter)?;
                Ok(format!("{} AS {}", expr, emitter.variable(alias)))
            }
        }
    }
}

impl ToCypher for CallClause {
    fn to_cypher(&self, emitter: &mut Emitter) -> Result<String, CypherGeneratorError> {
        if self.branches.iter().all(ClauseTree::is_empty) {
            return Err(CypherGeneratorError::EmptySubquery);
        }
        let imports: Vec<String> = self.imports.iter().map(|v| emitter.variable(v)).collect();

        let mut branches = Vec::with_capacity(self.branches.len());
        for branch in &self.branches {
            let body = branch.to_cypher(emitter)?;
            let block = if imports.is_empty() {
                body
            } else {
                format!("WITH {}\n{}", imports.join(", "), body)
            };
            branches.push(indent(&block));
        }

        let union = if self.union_all { "UNION ALL" } else { "UNION" };
        let separator = format!("\n{}\n", indent(union));
        Ok(format!("CALL {{\n{}\n}}", branches.join(&separator)))
    }
}

impl ToCypher for MergeClause {
    fn to_cypher(&self, emitter: &mut Emitter) -> Result<String, CypherGeneratorError> {
        let mut out = format!("MERGE {}", self.pattern.to_cypher(emitter)?);
        if !self.on_create.is_empty() {
            out.push_str(&format!("\nON CREATE SET {}", self.on_create.to_cypher(emitter)?));
        }
        if !self.on_match.is_empty() {
            out.push_str(&format!("\nON MATCH SET {}", self.on_match.to_cypher(emitter)?));
        }
        Ok(out)
    }
}

impl ToCypher for SetItem {
    fn to_cypher(&self, emitter: &mut Emitter) -> Result<String, CypherGeneratorError> {
        let target = self.target.to_cypher(emitter)?;
        Ok(format!("{} = {}", target, self.value.to_cypher(emitter)?))
    }
}

impl ToCypher for DeleteClause {
    fn to_cypher(&self, emitter: &mut Emitter) -> Result<String, CypherGeneratorError> {
        let keyword = if self.detach { "DETACH DELETE" } else { "DELETE" };
        let targets: Vec<String> = self.targets.iter().map(|v| emitter.variable(v)).collect();
        Ok(format!("{} {}", keyword, targets.join(", ")))
    }
}

impl ToCypher for ProcedureCall {
    fn to_cypher(&self, emitter: &mut Emitter) -> Result<String, CypherGeneratorError> {
        Ok(format!("CALL {}({})", self.name, self.args.to_cypher(emitter)?))
    }
}

impl ToCypher for Pattern {
    fn to_cypher(&self, emitter: &mut Emitter) -> Result<String, CypherGeneratorError> {
        let mut out = self.start.to_cypher(emitter)?;
        for (relationship, node) in &self.hops {
            out.push_str(&relationship.to_cypher(emitter)?);
            out.push_str(&node.to_cypher(emitter)?);
        }
        Ok(out)
    }
}

impl ToCypher for NodePattern {
    fn to_cypher(&self, emitter: &mut Emitter) -> Result<String, CypherGeneratorError> {
        let mut out = String::from("(");
        if let Some(variable) = &self.variable {
            out.push_str(&emitter.variable(variable));
        }
        for label in &self.labels {
            out.push(':');
            out.push_str(&quote_identifier(label));
        }
        if !self.properties.is_empty() {
            out.push(' ');
            out.push_str(&render_map(&self.properties, emitter)?);
        }
        out.push(')');
        Ok(out)
    }
}

impl ToCypher for RelationshipPattern {
    fn to_cypher(&self, emitter: &mut Emitter) -> Result<String, CypherGeneratorError> {
        let variable = self
            .variable
            .as_ref()
            .map(|v| emitter.variable(v))
            .unwrap_or_default();
        let body = format!("[{}:{}]", variable, quote_identifier(&self.rel_type));
        Ok(match self.direction {
            Direction::Out => format!("-{}->", body),
            Direction::In => format!("<-{}-", body),
        })
    }
}

fn render_map(
    entries: &[(String, CypherExpr)],
    emitter: &mut Emitter,
) -> Result<String, CypherGeneratorError> {
    if entries.is_empty() {
        return Ok("{}".to_string());
    }
    let mut items = Vec::with_capacity(entries.len());
    for (key, value) in entries {
        items.push(format!("{}: {}", quote_identifier(key), value.to_cypher(emitter)?));
    }
    Ok(format!("{{ {} }}", items.join(", ")))
}

fn operator_symbol(operator: Operator) -> &'static str {
    match operator {
        Operator::Equal => "=",
        Operator::NotEqual => "<>",
        Operator::LessThan => "<",
        Operator::LessThanEqual => "<=",
        Operator::GreaterThan => ">",
        Operator::GreaterThanEqual => ">=",
        Operator::And => "AND",
        Operator::Or => "OR",
        Operator::Not => "NOT",
        Operator::In => "IN",
        Operator::StartsWith => "STARTS WITH",
        Operator::EndsWith => "ENDS WITH",
        Operator::Contains => "CONTAINS",
        Operator::RegexMatch => "=~",
        Operator::IsNull => "IS NULL",
        Operator::IsNotNull => "IS NOT NULL",
        Operator::Addition => "+",
        Operator::Subtraction => "-",
    }
}

impl ToCypher for OperatorApplication {
    fn to_cypher(&self, emitter: &mut Emitter) -> Result<String, CypherGeneratorError> {
        let symbol = operator_symbol(self.operator);
        let arity_error = |expected: usize| CypherGeneratorError::InvalidOperandCount {
            operator: symbol.to_string(),
            expected,
            found: self.operands.len(),
        };

        match self.operator {
            Operator::And | Operator::Or => {
                if self.operands.len() < 2 {
                    return Err(arity_error(2));
                }
                let parts: Result<Vec<String>, _> =
                    self.operands.iter().map(|o| o.to_cypher(emitter)).collect();
                Ok(format!("({})", parts?.join(&format!(" {} ", symbol))))
            }
            Operator::Not => match self.operands.as_slice() {
                [operand] => Ok(format!("NOT ({})", operand.to_cypher(emitter)?)),
                _ => Err(arity_error(1)),
            },
            Operator::IsNull | Operator::IsNotNull => match self.operands.as_slice() {
                [operand] => Ok(format!("{} {}", operand.to_cypher(emitter)?, symbol)),
                _ => Err(arity_error(1)),
            },
            _ => match self.operands.as_slice() {
                [left, right] => {
                    let left = left.to_cypher(emitter)?;
                    Ok(format!("{} {} {}", left, symbol, right.to_cypher(emitter)?))
                }
                _ => Err(arity_error(2)),
            },
        }
    }
}

impl ToCypher for CountSubquery {
    fn to_cypher(&self, emitter: &mut Emitter) -> Result<String, CypherGeneratorError> {
        let mut out = format!("COUNT {{ MATCH {}", self.pattern.to_cypher(emitter)?);
        if let Some(predicate) = &self.predicate {
            out.push_str(&format!(" WHERE {}", predicate.to_cypher(emitter)?));
        }
        out.push_str(" }");
        Ok(out)
    }
}

impl ToCypher for CypherExpr {
    fn to_cypher(&self, emitter: &mut Emitter) -> Result<String, CypherGeneratorError> {
        match self {
            CypherExpr::Literal(literal) => Ok(match literal {
                Literal::Null => "null".to_string(),
                Literal::Boolean(b) => b.to_string(),
                Literal::Integer(i) => i.to_string(),
                Literal::String(s) => string_literal(s),
            }),
            CypherExpr::Param(param) => Ok(emitter.param(param)),
            CypherExpr::NamedParam { name, value } => emitter.named_param(name, value),
            CypherExpr::Variable(variable) => Ok(emitter.variable(variable)),
            CypherExpr::Property(base, name) => {
                Ok(format!("{}.{}", base.to_cypher(emitter)?, quote_identifier(name)))
            }
            CypherExpr::Operator(op) => op.to_cypher(emitter),
            CypherExpr::FunctionCall { name, args } => {
                Ok(format!("{}({})", name, args.to_cypher(emitter)?))
            }
            CypherExpr::CountStar => Ok("count(*)".to_string()),
            CypherExpr::CountSubquery(subquery) => subquery.to_cypher(emitter),
            CypherExpr::HasLabel { variable, label } => Ok(format!(
                "{}:{}",
                emitter.variable(variable),
                quote_identifier(label)
            )),
            CypherExpr::Map(entries) => render_map(entries, emitter),
            CypherExpr::MapProjection { variable, items } => {
                let name = emitter.variable(variable);
                if items.is_empty() {
                    return Ok(format!("{} {{ }}", name));
                }
                let mut rendered = Vec::with_capacity(items.len());
                for item in items {
                    rendered.push(match item {
                        MapProjectionItem::Property(property) => {
                            format!(".{}", quote_identifier(property))
                        }
                        MapProjectionItem::Entry(key, value) => {
                            format!("{}: {}", quote_identifier(key), value.to_cypher(emitter)?)
                        }
                    });
                }
                Ok(format!("{} {{ {} }}", name, rendered.join(", ")))
            }
            CypherExpr::List(items) => Ok(format!("[{}]", items.to_cypher(emitter)?)),
            CypherExpr::Slice { list, from, to } => {
                let list = list.to_cypher(emitter)?;
                let from = match from {
                    Some(expr) => expr.to_cypher(emitter)?,
                    None => String::new(),
                };
                let to = match to {
                    Some(expr) => expr.to_cypher(emitter)?,
                    None => String::new(),
                };
                Ok(format!("{}[{}..{}]", list, from, to))
            }
            CypherExpr::Case {
                branches,
                otherwise,
            } => {
                let mut out = String::from("CASE");
                for (condition, value) in branches {
                    let condition = condition.to_cypher(emitter)?;
                    out.push_str(&format!(
                        " WHEN {} THEN {}",
                        condition,
                        value.to_cypher(emitter)?
                    ));
                }
                if let Some(otherwise) = otherwise {
                    out.push_str(&format!(" ELSE {}", otherwise.to_cypher(emitter)?));
                }
                out.push_str(" END");
                Ok(out)
            }
            CypherExpr::Reduce {
                accumulator,
                init,
                item,
                list,
                expr,
            } => {
                let accumulator = emitter.variable(accumulator);
                let init = init.to_cypher(emitter)?;
                let item = emitter.variable(item);
                let list = list.to_cypher(emitter)?;
                Ok(format!(
                    "reduce({} = {}, {} IN {} | {})",
                    accumulator,
                    init,
                    item,
                    list,
                    expr.to_cypher(emitter)?
                ))
            }
        }
    }
}
