//! Clause tree: the intermediate form every planner stage builds.
//!
//! Variables and parameters are symbolic here. `cypher_generator` assigns
//! their final names in a single pass over the finished tree, so planning
//! order never leaks into the emitted text.

pub mod clause;
pub mod cypher_expr;
pub mod graph_pattern;

use clause::Clause;

pub use clause::{
    CallClause, DeleteClause, MatchClause, MergeClause, OrderByItem, ProcedureCall, Projection,
    ProjectionItem, SetItem, SortDirection, UnwindClause, WithClause,
};
pub use cypher_expr::{
    CountSubquery, CypherExpr, Literal, MapProjectionItem, Operator, OperatorApplication, Param,
    Variable, VariableKind,
};
pub use graph_pattern::{NodePattern, Pattern, RelationshipPattern};

/// Ordered sequence of clauses forming one query or subquery body.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClauseTree {
    pub clauses: Vec<Clause>,
}

impl ClauseTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a clause, inserting `WITH *` where a read follows a write.
    pub fn push(&mut self, clause: Clause) {
        let needs_with = clause.is_read() && self.clauses.last().is_some_and(Clause::is_write);
        if needs_with {
            self.clauses.push(Clause::with_star());
        }
        self.clauses.push(clause);
    }

    pub fn extend(&mut self, clauses: impl IntoIterator<Item = Clause>) {
        for clause in clauses {
            self.push(clause);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn last(&self) -> Option<&Clause> {
        self.clauses.last()
    }
}

impl From<Vec<Clause>> for ClauseTree {
    fn from(clauses: Vec<Clause>) -> Self {
        let mut tree = ClauseTree::new();
        tree.extend(clauses);
        tree
    }
}
