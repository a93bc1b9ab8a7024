pub mod authorization;
pub mod config;
pub mod errors;
pub mod graph_schema;
pub mod schema_validator;

#[cfg(test)]
pub mod testing;

pub use authorization::{
    AuthenticationRequirement, AuthorizationRule, Operation, RuleKind, ValidationPhase,
};
pub use config::{GraphSchemaConfig, GraphSchemaDefinition};
pub use graph_schema::{
    Cardinality, Direction, GraphSchema, InterfaceType, LimitSettings, NodeType, PropertySchema,
    RelationshipField, RelationshipProperties, ScalarKind, TargetType, UnionType,
};
pub use schema_validator::SchemaValidator;
