use serde_json::{Map, Value};

use crate::render_plan::ClauseTree;

pub mod common;
mod errors;
mod to_cypher;

#[cfg(test)]
mod tests;

pub use errors::CypherGeneratorError;
pub use to_cypher::{Emitter, ToCypher};

/// Cypher text together with the parameter table it references.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedCypher {
    pub cypher: String,
    pub params: Map<String, Value>,
}

/// Render a finished clause tree, naming variables and parameters in order of
/// first appearance.
pub fn generate_cypher(tree: &ClauseTree) -> Result<GeneratedCypher, CypherGeneratorError> {
    let mut emitter = Emitter::new();
    let cypher = tree.to_cypher(&mut emitter)?;
    log::debug!("Generated Cypher:\n{}", cypher);
    Ok(GeneratedCypher {
        cypher,
        params: emitter.into_params(),
    })
}
