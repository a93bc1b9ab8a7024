//! Authorization and authentication policies attached to node types.
//!
//! Rules are plain records interpreted by `query_planner::authorization`; they
//! carry no behavior of their own beyond applicability checks.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Operation a rule applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    Read,
    Aggregate,
    Create,
    Update,
    Delete,
    CreateRelationship,
    DeleteRelationship,
    Subscribe,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Read => "READ",
            Operation::Aggregate => "AGGREGATE",
            Operation::Create => "CREATE",
            Operation::Update => "UPDATE",
            Operation::Delete => "DELETE",
            Operation::CreateRelationship => "CREATE_RELATIONSHIP",
            Operation::DeleteRelationship => "DELETE_RELATIONSHIP",
            Operation::Subscribe => "SUBSCRIBE",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    /// Silently removes rows the caller may not see
    Filter,
    /// Raises at runtime when the predicate does not hold
    Validate,
}

/// When a validate rule is checked relative to the write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationPhase {
    Before,
    After,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationRule {
    pub kind: RuleKind,
    /// Operations the rule applies to; empty means the kind's defaults
    #[serde(default)]
    pub operations: Vec<Operation>,
    #[serde(default = "default_require_authentication")]
    pub require_authentication: bool,
    /// Validate rules only; empty means both phases
    #[serde(default)]
    pub when: Vec<ValidationPhase>,
    /// Predicate object: `{node: {...}, jwt: {...}, AND/OR/NOT: ...}`
    #[serde(rename = "where")]
    pub predicate: serde_json::Value,
}

fn default_require_authentication() -> bool {
    true
}

const FILTER_DEFAULT_OPERATIONS: &[Operation] = &[
    Operation::Read,
    Operation::Aggregate,
    Operation::Update,
    Operation::Delete,
    Operation::CreateRelationship,
    Operation::DeleteRelationship,
];

const VALIDATE_DEFAULT_OPERATIONS: &[Operation] = &[
    Operation::Read,
    Operation::Aggregate,
    Operation::Create,
    Operation::Update,
    Operation::Delete,
    Operation::CreateRelationship,
    Operation::DeleteRelationship,
];

impl AuthorizationRule {
    pub fn filter(predicate: serde_json::Value) -> Self {
        AuthorizationRule {
            kind: RuleKind::Filter,
            operations: vec![],
            require_authentication: true,
            when: vec![],
            predicate,
        }
    }

    pub fn validate(predicate: serde_json::Value) -> Self {
        AuthorizationRule {
            kind: RuleKind::Validate,
            ..Self::filter(predicate)
        }
    }

    pub fn applies_to(&self, operation: Operation) -> bool {
        if self.operations.is_empty() {
            let defaults = match self.kind {
                RuleKind::Filter => FILTER_DEFAULT_OPERATIONS,
                RuleKind::Validate => VALIDATE_DEFAULT_OPERATIONS,
            };
            defaults.contains(&operation)
        } else {
            self.operations.contains(&operation)
        }
    }

    pub fn checked_in(&self, phase: ValidationPhase) -> bool {
        self.when.is_empty() || self.when.contains(&phase)
    }
}

/// Operations on a type that refuse unauthenticated callers outright
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthenticationRequirement {
    /// Empty means every operation
    #[serde(default)]
    pub operations: Vec<Operation>,
}

impl AuthenticationRequirement {
    pub fn covers(&self, operation: Operation) -> bool {
        self.operations.is_empty() || self.operations.contains(&operation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_operations_per_kind() {
        let filter = AuthorizationRule::filter(json!({}));
        assert!(filter.applies_to(Operation::Read));
        assert!(!filter.applies_to(Operation::Create));

        let validate = AuthorizationRule::validate(json!({}));
        assert!(validate.applies_to(Operation::Create));
        assert!(!validate.applies_to(Operation::Subscribe));
    }

    #[test]
    fn test_rule_deserialization() {
        let rule: AuthorizationRule = serde_json::from_value(json!({
            "kind": "validate",
            "operations": ["UPDATE"],
            "requireAuthentication": false,
            "when": ["AFTER"],
            "where": {"node": {"id_EQ": "$jwt.sub"}}
        }))
        .unwrap();

        assert_eq!(rule.kind, RuleKind::Validate);
        assert!(!rule.require_authentication);
        assert!(rule.applies_to(Operation::Update));
        assert!(!rule.applies_to(Operation::Delete));
        assert!(rule.checked_in(ValidationPhase::After));
        assert!(!rule.checked_in(ValidationPhase::Before));
    }
}
