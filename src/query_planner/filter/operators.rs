//! Filter key decoding.
//!
//! Scalar keys are `<field>_<OPERATOR>`; relationship keys are
//! `<field>_<QUANTIFIER>`; aggregate keys are decoded separately in
//! `aggregate.rs`.

use lazy_static::lazy_static;

use crate::graph_catalog::ScalarKind;
use crate::render_plan::{CypherExpr, Operator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarOperator {
    Eq,
    In,
    Contains,
    StartsWith,
    EndsWith,
    Gt,
    Gte,
    Lt,
    Lte,
    Matches,
    Includes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantifier {
    All,
    None,
    Single,
    Some,
}

lazy_static! {
    /// Operator suffixes, longest first so `_GTE` is tried before `_GT`
    static ref SCALAR_SUFFIXES: Vec<(&'static str, ScalarOperator)> = {
        let mut suffixes = vec![
            ("_EQ", ScalarOperator::Eq),
            ("_IN", ScalarOperator::In),
            ("_CONTAINS", ScalarOperator::Contains),
            ("_STARTS_WITH", ScalarOperator::StartsWith),
            ("_ENDS_WITH", ScalarOperator::EndsWith),
            ("_GT", ScalarOperator::Gt),
            ("_GTE", ScalarOperator::Gte),
            ("_LT", ScalarOperator::Lt),
            ("_LTE", ScalarOperator::Lte),
            ("_MATCHES", ScalarOperator::Matches),
            ("_INCLUDES", ScalarOperator::Includes),
        ];
        suffixes.sort_by_key(|(suffix, _)| std::cmp::Reverse(suffix.len()));
        suffixes
    };

    static ref QUANTIFIER_SUFFIXES: Vec<(&'static str, Quantifier)> = vec![
        ("_ALL", Quantifier::All),
        ("_NONE", Quantifier::None),
        ("_SINGLE", Quantifier::Single),
        ("_SOME", Quantifier::Some),
    ];
}

/// Split `title_STARTS_WITH` into (`title`, StartsWith).
pub fn split_scalar_key(key: &str) -> Option<(&str, ScalarOperator)> {
    SCALAR_SUFFIXES.iter().find_map(|(suffix, op)| {
        key.strip_suffix(suffix)
            .filter(|field| !field.is_empty())
            .map(|field| (field, *op))
    })
}

/// Split `actors_SOME` into (`actors`, Some).
pub fn split_quantifier_key(key: &str) -> Option<(&str, Quantifier)> {
    QUANTIFIER_SUFFIXES.iter().find_map(|(suffix, quantifier)| {
        key.strip_suffix(suffix)
            .filter(|field| !field.is_empty())
            .map(|field| (field, *quantifier))
    })
}

impl ScalarOperator {
    pub fn name(&self) -> &'static str {
        match self {
            ScalarOperator::Eq => "EQ",
            ScalarOperator::In => "IN",
            ScalarOperator::Contains => "CONTAINS",
            ScalarOperator::StartsWith => "STARTS_WITH",
            ScalarOperator::EndsWith => "ENDS_WITH",
            ScalarOperator::Gt => "GT",
            ScalarOperator::Gte => "GTE",
            ScalarOperator::Lt => "LT",
            ScalarOperator::Lte => "LTE",
            ScalarOperator::Matches => "MATCHES",
            ScalarOperator::Includes => "INCLUDES",
        }
    }

    /// Whether the operator is declared for a field of this shape.
    ///
    /// `kind` is `None` for claim values, whose type is only known at runtime.
    pub fn supports(&self, kind: Option<ScalarKind>, list: bool, regex_enabled: bool) -> bool {
        if list {
            return matches!(self, ScalarOperator::Eq | ScalarOperator::Includes);
        }
        let Some(kind) = kind else {
            return *self != ScalarOperator::Matches || regex_enabled;
        };
        match self {
            ScalarOperator::Eq | ScalarOperator::In => true,
            ScalarOperator::Contains | ScalarOperator::StartsWith | ScalarOperator::EndsWith => {
                kind.is_string_like()
            }
            ScalarOperator::Matches => regex_enabled && kind.is_string_like(),
            ScalarOperator::Gt | ScalarOperator::Gte | ScalarOperator::Lt | ScalarOperator::Lte => {
                kind.is_numeric() || kind.is_temporal() || kind.is_string_like()
            }
            ScalarOperator::Includes => false,
        }
    }

    /// Comparison `subject <op> value`; `Includes` swaps the operands.
    pub fn apply(&self, subject: CypherExpr, value: CypherExpr) -> CypherExpr {
        let operator = match self {
            ScalarOperator::Eq => Operator::Equal,
            ScalarOperator::In => Operator::In,
            ScalarOperator::Contains => Operator::Contains,
            ScalarOperator::StartsWith => Operator::StartsWith,
            ScalarOperator::EndsWith => Operator::EndsWith,
            ScalarOperator::Gt => Operator::GreaterThan,
            ScalarOperator::Gte => Operator::GreaterThanEqual,
            ScalarOperator::Lt => Operator::LessThan,
            ScalarOperator::Lte => Operator::LessThanEqual,
            ScalarOperator::Matches => Operator::RegexMatch,
            ScalarOperator::Includes => return CypherExpr::binary(Operator::In, value, subject),
        };
        CypherExpr::binary(operator, subject, value)
    }
}

impl Quantifier {
    pub fn name(&self) -> &'static str {
        match self {
            Quantifier::All => "ALL",
            Quantifier::None => "NONE",
            Quantifier::Single => "SINGLE",
            Quantifier::Some => "SOME",
        }
    }
}
