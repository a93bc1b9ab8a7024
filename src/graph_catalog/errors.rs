//! # Graph Schema Error Types
//!
//! Errors raised while loading a schema model from its definition and while
//! checking the model's structural invariants.
//!
//! ## Error Categories
//!
//! - **Lookup Errors**: Missing node, interface, union or properties types
//! - **Structural Errors**: Interfaces not satisfied by members, dangling targets
//! - **Configuration Errors**: File I/O and parsing issues during schema loading
//!
//! When returning schema errors, prefer the context helpers so operators know
//! where the failing reference came from:
//!
//! ```ignore
//! GraphSchemaError::invalid_reference_with_context(
//!     "Actor",
//!     "Relationship Movie.actors"
//! )
//! ```

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum GraphSchemaError {
    #[error("No node type found for `{node_label}`")]
    Node { node_label: String },
    #[error("No node, interface or union type named `{type_name}`")]
    UnknownType { type_name: String },
    #[error("No relationship properties type found for `{name}`")]
    RelationshipProperties { name: String },
    #[error("Invalid type reference: `{reference}`")]
    InvalidReference { reference: String },
    #[error("Type `{member}` does not implement `{field}` required by interface `{interface}`")]
    InterfaceNotSatisfied {
        interface: String,
        member: String,
        field: String,
    },
    #[error("Duplicate type name `{type_name}`")]
    DuplicateType { type_name: String },
    #[error("Failed to read configuration file: {error}")]
    ConfigReadError { error: String },
    #[error("Failed to parse configuration: {error}")]
    ConfigParseError { error: String },
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

impl GraphSchemaError {
    /// Create an InvalidReference error with context information
    pub fn invalid_reference_with_context(
        reference: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        GraphSchemaError::InvalidReference {
            reference: format!("{}\n  Context: {}", reference.into(), context.into()),
        }
    }
}
