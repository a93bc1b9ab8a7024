//! Public error of a compilation request.
//!
//! Every stage keeps its own error enum; [`RequestError`] wraps them for
//! callers of [`crate::compile`]. Two variants never come out of compilation
//! itself: the compiled query asserts authorization and relationship
//! cardinality at run time, and the execution layer hands the database's
//! error message to [`RequestError::from_execution_message`] to recover them.

use thiserror::Error;

use crate::config::ConfigError;
use crate::cypher_generator::CypherGeneratorError;
use crate::graph_catalog::errors::GraphSchemaError;
use crate::query_planner::authorization::{FORBIDDEN, RELATIONSHIP_CARDINALITY};
use crate::query_planner::errors::QueryPlannerError;

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("Schema error: {0}")]
    Schema(#[from] GraphSchemaError),

    #[error("Planning error: {0}")]
    Planning(#[from] QueryPlannerError),

    #[error("Cypher generation error: {0}")]
    Generation(#[from] CypherGeneratorError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Forbidden")]
    AuthorizationDenied,

    #[error("Relationship cardinality violated")]
    CardinalityViolation,
}

impl RequestError {
    /// Map an execution failure raised by one of the compiled assertions.
    ///
    /// Returns `None` for messages that carry no assertion sentinel; those
    /// are not compilation concerns.
    pub fn from_execution_message(message: &str) -> Option<Self> {
        if message.contains(FORBIDDEN) {
            Some(RequestError::AuthorizationDenied)
        } else if message.contains(RELATIONSHIP_CARDINALITY) {
            Some(RequestError::CardinalityViolation)
        } else {
            None
        }
    }

    /// Whether the caller, not the schema or the compiler, is at fault
    pub fn is_client_error(&self) -> bool {
        match self {
            RequestError::Planning(_)
            | RequestError::AuthorizationDenied
            | RequestError::CardinalityViolation => true,
            RequestError::Schema(_) | RequestError::Generation(_) | RequestError::Config(_) => {
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinels_are_recognised() {
        let message = format!(
            "Failed to invoke procedure `apoc.util.validate`: \
             Caused by: java.lang.RuntimeException: {}",
            FORBIDDEN
        );
        assert!(matches!(
            RequestError::from_execution_message(&message),
            Some(RequestError::AuthorizationDenied)
        ));
        assert!(matches!(
            RequestError::from_execution_message(RELATIONSHIP_CARDINALITY),
            Some(RequestError::CardinalityViolation)
        ));
        assert!(
            RequestError::from_execution_message("Neo.ClientError.Statement.SyntaxError").is_none()
        );
    }

    #[test]
    fn test_planner_errors_are_client_errors() {
        let error: RequestError = QueryPlannerError::invalid_argument("limit", "negative").into();
        assert!(error.is_client_error());
        assert_eq!(
            error.to_string(),
            "Planning error: Invalid argument `limit`: negative"
        );

        let error: RequestError = CypherGeneratorError::EmptyMatch.into();
        assert!(!error.is_client_error());
    }
}
