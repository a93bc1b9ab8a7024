use serde_json::Value;

use super::graph_pattern::Pattern;

/// Identity of a variable allocated during planning; names are assigned at emission.
pub type VarId = usize;

/// Identity of a parameter use site; names are assigned at emission.
pub type ParamId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableKind {
    /// Pattern variables (nodes and relationships), emitted as `this{n}`
    Pattern,
    /// Everything else (counts, collected lists, subquery results), emitted as `var{n}`
    Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Variable {
    /// Fixed name, only used for the query root (`this`) and result aliases
    Named(&'static str),
    Allocated { id: VarId, kind: VariableKind },
}

impl Variable {
    pub fn this() -> Self {
        Variable::Named("this")
    }

    pub fn expr(&self) -> CypherExpr {
        CypherExpr::Variable(self.clone())
    }

    pub fn property(&self, name: impl Into<String>) -> CypherExpr {
        CypherExpr::Property(Box::new(self.expr()), name.into())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub id: ParamId,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Boolean(bool),
    Integer(i64),
    String(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equal,
    NotEqual,
    LessThan,
    LessThanEqual,
    GreaterThan,
    GreaterThanEqual,
    And,
    Or,
    Not,
    In,
    StartsWith,
    EndsWith,
    Contains,
    RegexMatch,
    IsNull,
    IsNotNull,
    Addition,
    Subtraction,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OperatorApplication {
    pub operator: Operator,
    pub operands: Vec<CypherExpr>,
}

/// Item of a map projection: `.title` or `key: expr`
#[derive(Debug, Clone, PartialEq)]
pub enum MapProjectionItem {
    Property(String),
    Entry(String, CypherExpr),
}

/// `COUNT { MATCH pattern WHERE predicate }`
#[derive(Debug, Clone, PartialEq)]
pub struct CountSubquery {
    pub pattern: Pattern,
    pub predicate: Option<CypherExpr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CypherExpr {
    Literal(Literal),

    /// User-supplied value; registered in the parameter table at emission
    Param(Param),

    /// Well-known parameter such as `$jwt` or `$isAuthenticated`
    NamedParam { name: &'static str, value: Value },

    Variable(Variable),

    /// `expr.name`
    Property(Box<CypherExpr>, String),

    Operator(OperatorApplication),

    FunctionCall { name: &'static str, args: Vec<CypherExpr> },

    /// `count(*)`
    CountStar,

    CountSubquery(Box<CountSubquery>),

    /// `this0:Movie`
    HasLabel { variable: Variable, label: String },

    /// `{ key: value, ... }`
    Map(Vec<(String, CypherExpr)>),

    /// `this { .id, actors: var2 }`
    MapProjection {
        variable: Variable,
        items: Vec<MapProjectionItem>,
    },

    List(Vec<CypherExpr>),

    /// `list[from..to]`
    Slice {
        list: Box<CypherExpr>,
        from: Option<Box<CypherExpr>>,
        to: Option<Box<CypherExpr>>,
    },

    Case {
        branches: Vec<(CypherExpr, CypherExpr)>,
        otherwise: Option<Box<CypherExpr>>,
    },

    /// `reduce(acc = init, item IN list | expr)`
    Reduce {
        accumulator: Variable,
        init: Box<CypherExpr>,
        item: Variable,
        list: Box<CypherExpr>,
        expr: Box<CypherExpr>,
    },
}

impl CypherExpr {
    pub fn boolean(value: bool) -> Self {
        CypherExpr::Literal(Literal::Boolean(value))
    }

    pub fn integer(value: i64) -> Self {
        CypherExpr::Literal(Literal::Integer(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        CypherExpr::Literal(Literal::String(value.into()))
    }

    pub fn function(name: &'static str, args: Vec<CypherExpr>) -> Self {
        CypherExpr::FunctionCall { name, args }
    }

    pub fn property(self, name: impl Into<String>) -> Self {
        CypherExpr::Property(Box::new(self), name.into())
    }

    pub fn binary(operator: Operator, left: CypherExpr, right: CypherExpr) -> Self {
        CypherExpr::Operator(OperatorApplication {
            operator,
            operands: vec![left, right],
        })
    }

    pub fn unary(operator: Operator, operand: CypherExpr) -> Self {
        CypherExpr::Operator(OperatorApplication {
            operator,
            operands: vec![operand],
        })
    }

    pub fn eq(self, other: CypherExpr) -> Self {
        Self::binary(Operator::Equal, self, other)
    }

    pub fn not(self) -> Self {
        Self::unary(Operator::Not, self)
    }

    pub fn is_null(self) -> Self {
        Self::unary(Operator::IsNull, self)
    }

    pub fn is_not_null(self) -> Self {
        Self::unary(Operator::IsNotNull, self)
    }

    /// AND over the given predicates; a single predicate is returned as-is.
    pub fn and_all(predicates: Vec<CypherExpr>) -> Option<CypherExpr> {
        Self::combine(Operator::And, predicates)
    }

    /// OR over the given predicates; a single predicate is returned as-is.
    pub fn or_all(predicates: Vec<CypherExpr>) -> Option<CypherExpr> {
        Self::combine(Operator::Or, predicates)
    }

    /// AND of two optional predicates
    pub fn conjoin(left: Option<CypherExpr>, right: Option<CypherExpr>) -> Option<CypherExpr> {
        Self::and_all(left.into_iter().chain(right).collect())
    }

    fn combine(operator: Operator, mut predicates: Vec<CypherExpr>) -> Option<CypherExpr> {
        match predicates.len() {
            0 => None,
            1 => predicates.pop(),
            _ => Some(CypherExpr::Operator(OperatorApplication {
                operator,
                operands: predicates,
            })),
        }
    }

    /// Label disjunction: `(this0:Movie OR this0:Series)`
    pub fn has_any_label(variable: &Variable, labels: &[&str]) -> Option<CypherExpr> {
        Self::or_all(
            labels
                .iter()
                .map(|label| CypherExpr::HasLabel {
                    variable: variable.clone(),
                    label: label.to_string(),
                })
                .collect(),
        )
    }
}
