use thiserror::Error;

use crate::graph_catalog::errors::GraphSchemaError;
use crate::graph_catalog::Operation;
use crate::utils::cursor::CursorError;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum QueryPlannerError {
    #[error("Schema mismatch on `{type_name}.{field}`: {reason}")]
    SchemaMismatch {
        type_name: String,
        field: String,
        reason: String,
    },

    #[error("Invalid cursor `{cursor}`: {source}")]
    InvalidCursor {
        cursor: String,
        #[source]
        source: CursorError,
    },

    #[error("Invalid argument `{argument}`: {message}")]
    InvalidArgument { argument: String, message: String },

    #[error("{operation} on `{type_name}` requires an authenticated caller")]
    Unauthenticated {
        type_name: String,
        operation: Operation,
    },

    #[error("GraphSchema: {0}")]
    GraphSchema(#[from] GraphSchemaError),
}

impl QueryPlannerError {
    pub fn schema_mismatch(
        type_name: impl Into<String>,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        QueryPlannerError::SchemaMismatch {
            type_name: type_name.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn unknown_field(type_name: impl Into<String>, field: impl Into<String>) -> Self {
        Self::schema_mismatch(type_name, field, "field is not defined")
    }

    pub fn invalid_argument(argument: impl Into<String>, message: impl Into<String>) -> Self {
        QueryPlannerError::InvalidArgument {
            argument: argument.into(),
            message: message.into(),
        }
    }
}
