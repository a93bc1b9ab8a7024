use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CypherGeneratorError {
    #[error("CALL subquery has no body (at least one branch with one clause is required)")]
    EmptySubquery,
    #[error("{0} clause is empty (must project at least one item)")]
    EmptyProjection(&'static str),
    #[error("MATCH clause has no pattern")]
    EmptyMatch,
    #[error("Operator {operator} expects {expected} operand(s), found {found}")]
    InvalidOperandCount {
        operator: String,
        expected: usize,
        found: usize,
    },
    #[error("Parameter ${name} registered twice with different values")]
    ConflictingParameter { name: String },
}
