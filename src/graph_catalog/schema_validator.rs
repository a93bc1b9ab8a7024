//! Structural validation of a schema model.
//!
//! The upstream schema compiler is expected to hand over a consistent model,
//! but the compiler relies on these invariants to stay panic-free:
//!
//! - Type names are unique across nodes, interfaces and unions
//! - Relationship targets and relationship-properties types exist
//! - Union and interface members are node types
//! - Interface members expose every interface property and relationship

use std::collections::HashSet;

use super::errors::GraphSchemaError;
use super::graph_schema::{GraphSchema, RelationshipField};

pub struct SchemaValidator<'a> {
    schema: &'a GraphSchema,
}

impl<'a> SchemaValidator<'a> {
    pub fn new(schema: &'a GraphSchema) -> Self {
        SchemaValidator { schema }
    }

    pub fn validate(&self) -> Result<(), GraphSchemaError> {
        self.validate_unique_names()?;

        for node in self.schema.nodes() {
            for rel in &node.relationships {
                self.validate_relationship(&node.name, rel)?;
            }
        }

        for union in self.schema.unions() {
            for member in &union.members {
                self.validate_member(&union.name, member)?;
            }
        }

        for interface in self.schema.interfaces() {
            for rel in &interface.relationships {
                self.validate_relationship(&interface.name, rel)?;
            }
            for member in &interface.members {
                self.validate_member(&interface.name, member)?;
                let node = self.schema.get_node(member)?;

                for prop in &interface.properties {
                    if node.property(&prop.name).is_none() {
                        return Err(GraphSchemaError::InterfaceNotSatisfied {
                            interface: interface.name.clone(),
                            member: member.clone(),
                            field: prop.name.clone(),
                        });
                    }
                }
                for rel in &interface.relationships {
                    let satisfied = node.relationship(&rel.name).is_some_and(|r| {
                        r.rel_type == rel.rel_type && r.direction == rel.direction
                    });
                    if !satisfied {
                        return Err(GraphSchemaError::InterfaceNotSatisfied {
                            interface: interface.name.clone(),
                            member: member.clone(),
                            field: rel.name.clone(),
                        });
                    }
                }
            }
        }

        Ok(())
    }

    fn validate_unique_names(&self) -> Result<(), GraphSchemaError> {
        let mut seen = HashSet::new();
        let names = self
            .schema
            .nodes()
            .iter()
            .map(|n| &n.name)
            .chain(self.schema.interfaces().iter().map(|i| &i.name))
            .chain(self.schema.unions().iter().map(|u| &u.name));

        for name in names {
            if !seen.insert(name) {
                return Err(GraphSchemaError::DuplicateType {
                    type_name: name.clone(),
                });
            }
        }
        Ok(())
    }

    fn validate_relationship(
        &self,
        owner: &str,
        rel: &RelationshipField,
    ) -> Result<(), GraphSchemaError> {
        let context = format!("Relationship {}.{}", owner, rel.name);
        if self.schema.target_type(&rel.target).is_err() {
            return Err(GraphSchemaError::invalid_reference_with_context(
                &rel.target,
                context,
            ));
        }
        if let Some(properties) = &rel.properties {
            if self.schema.get_relationship_properties(properties).is_err() {
                return Err(GraphSchemaError::invalid_reference_with_context(
                    properties, context,
                ));
            }
        }
        Ok(())
    }

    fn validate_member(&self, owner: &str, member: &str) -> Result<(), GraphSchemaError> {
        if self.schema.get_node_opt(member).is_none() {
            return Err(GraphSchemaError::invalid_reference_with_context(
                member,
                format!("Member of {}", owner),
            ));
        }
        Ok(())
    }
}
