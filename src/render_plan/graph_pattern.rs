use crate::graph_catalog::graph_schema::Direction;

use super::cypher_expr::{CypherExpr, Variable};

#[derive(Debug, Clone, PartialEq)]
pub struct NodePattern {
    pub variable: Option<Variable>,
    pub labels: Vec<String>,
    /// Inline property map, used by MERGE
    pub properties: Vec<(String, CypherExpr)>,
}

impl NodePattern {
    pub fn new(variable: Variable, labels: Vec<String>) -> Self {
        NodePattern {
            variable: Some(variable),
            labels,
            properties: vec![],
        }
    }

    /// Reference to an already bound variable, no labels
    pub fn bound(variable: &Variable) -> Self {
        Self::new(variable.clone(), vec![])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipPattern {
    pub variable: Option<Variable>,
    pub rel_type: String,
    /// Direction as seen from the node on the left of the hop
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    pub start: NodePattern,
    pub hops: Vec<(RelationshipPattern, NodePattern)>,
}

impl Pattern {
    pub fn node(start: NodePattern) -> Self {
        Pattern {
            start,
            hops: vec![],
        }
    }

    pub fn hop(start: NodePattern, relationship: RelationshipPattern, end: NodePattern) -> Self {
        Pattern {
            start,
            hops: vec![(relationship, end)],
        }
    }
}
