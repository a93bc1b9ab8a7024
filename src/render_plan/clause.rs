use super::cypher_expr::{CypherExpr, Variable};
use super::graph_pattern::Pattern;
use super::ClauseTree;

#[derive(Debug, Clone, PartialEq)]
pub struct MatchClause {
    pub optional: bool,
    pub patterns: Vec<Pattern>,
    pub predicate: Option<CypherExpr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProjectionItem {
    /// `*`
    Star,
    Expr {
        expr: CypherExpr,
        alias: Option<Variable>,
    },
}

impl ProjectionItem {
    pub fn aliased(expr: CypherExpr, alias: &Variable) -> Self {
        ProjectionItem::Expr {
            expr,
            alias: Some(alias.clone()),
        }
    }

    pub fn variable(variable: &Variable) -> Self {
        ProjectionItem::Expr {
            expr: variable.expr(),
            alias: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn flip(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderByItem {
    pub expr: CypherExpr,
    pub direction: SortDirection,
}

/// Shared body of `WITH` and `RETURN`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Projection {
    pub distinct: bool,
    pub items: Vec<ProjectionItem>,
    pub order_by: Vec<OrderByItem>,
    pub skip: Option<CypherExpr>,
    pub limit: Option<CypherExpr>,
}

impl Projection {
    pub fn star() -> Self {
        Projection {
            items: vec![ProjectionItem::Star],
            ..Default::default()
        }
    }

    pub fn items(items: Vec<ProjectionItem>) -> Self {
        Projection {
            items,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WithClause {
    pub projection: Projection,
    pub predicate: Option<CypherExpr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnwindClause {
    pub expr: CypherExpr,
    pub alias: Variable,
}

/// `CALL { WITH imports ... }`; more than one branch means `UNION`, or
/// `UNION ALL` when `union_all` keeps duplicate rows
#[derive(Debug, Clone, PartialEq)]
pub struct CallClause {
    pub imports: Vec<Variable>,
    pub branches: Vec<ClauseTree>,
    pub union_all: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetItem {
    pub target: CypherExpr,
    pub value: CypherExpr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergeClause {
    pub pattern: Pattern,
    pub on_create: Vec<SetItem>,
    pub on_match: Vec<SetItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteClause {
    pub detach: bool,
    pub targets: Vec<Variable>,
}

/// In-query procedure call such as `apoc.util.validate`
#[derive(Debug, Clone, PartialEq)]
pub struct ProcedureCall {
    pub name: &'static str,
    pub args: Vec<CypherExpr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    Match(MatchClause),
    With(WithClause),
    Unwind(UnwindClause),
    Call(CallClause),
    Create(Pattern),
    Merge(MergeClause),
    Set(Vec<SetItem>),
    Delete(DeleteClause),
    Procedure(ProcedureCall),
    Return(Projection),
}

impl Clause {
    /// `WITH *`
    pub fn with_star() -> Self {
        Clause::With(WithClause {
            projection: Projection::star(),
            predicate: None,
        })
    }

    /// `WITH * WHERE predicate`
    pub fn filter(predicate: CypherExpr) -> Self {
        Clause::With(WithClause {
            projection: Projection::star(),
            predicate: Some(predicate),
        })
    }

    pub fn with_items(items: Vec<ProjectionItem>) -> Self {
        Clause::With(WithClause {
            projection: Projection::items(items),
            predicate: None,
        })
    }

    pub fn call(imports: Vec<Variable>, body: ClauseTree) -> Self {
        Clause::Call(CallClause {
            imports,
            branches: vec![body],
            union_all: false,
        })
    }

    pub fn return_items(items: Vec<ProjectionItem>) -> Self {
        Clause::Return(Projection::items(items))
    }

    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Clause::Create(_) | Clause::Merge(_) | Clause::Set(_) | Clause::Delete(_)
        )
    }

    /// Clauses Cypher refuses directly after a write without an intermediate `WITH`
    pub fn is_read(&self) -> bool {
        matches!(
            self,
            Clause::Match(_) | Clause::Unwind(_) | Clause::Call(_) | Clause::Procedure(_)
        )
    }
}
