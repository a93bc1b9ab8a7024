//! Planning context.
//!
//! [`PlanCtx`] is threaded through every planner stage of one compilation. It
//! owns the only mutable state of a compilation:
//! - the allocator for symbolic variables and parameter use sites
//! - the mutation summary counters
//!
//! Everything else (schema, caller context, configuration) is borrowed
//! read-only, so concurrent compilations never share state.

use serde::Serialize;
use serde_json::Value;

use crate::config::CompilerConfig;
use crate::graph_catalog::{GraphSchema, NodeType};
use crate::render_plan::{CypherExpr, Param, Variable, VariableKind};
use crate::request::ExecutionContext;

/// Changes a mutation is planned to make, accumulated over the nested tree.
///
/// Each planned operation counts once. A `MERGE` counts as a creation even
/// when it matches an existing node or relationship, and a delete counts one
/// node however many rows it matches. Read the database's own counters for
/// what actually changed; these only decide which of them to read back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryCounters {
    pub nodes_created: usize,
    pub nodes_deleted: usize,
    pub relationships_created: usize,
    pub relationships_deleted: usize,
    pub properties_set: usize,
}

impl SummaryCounters {
    /// Summary keys the execution layer should read back, in a fixed order
    pub fn expected_keys(&self) -> Vec<String> {
        [
            ("nodesCreated", self.nodes_created),
            ("nodesDeleted", self.nodes_deleted),
            ("relationshipsCreated", self.relationships_created),
            ("relationshipsDeleted", self.relationships_deleted),
            ("propertiesSet", self.properties_set),
        ]
        .into_iter()
        .filter(|(_, count)| *count > 0)
        .map(|(key, _)| key.to_string())
        .collect()
    }
}

pub struct PlanCtx<'a> {
    schema: &'a GraphSchema,
    context: &'a ExecutionContext,
    config: &'a CompilerConfig,
    next_variable: usize,
    next_param: usize,
    summary: SummaryCounters,
}

impl<'a> PlanCtx<'a> {
    pub fn new(
        schema: &'a GraphSchema,
        context: &'a ExecutionContext,
        config: &'a CompilerConfig,
    ) -> Self {
        PlanCtx {
            schema,
            context,
            config,
            next_variable: 0,
            next_param: 0,
            summary: SummaryCounters::default(),
        }
    }

    pub fn schema(&self) -> &'a GraphSchema {
        self.schema
    }

    pub fn context(&self) -> &'a ExecutionContext {
        self.context
    }

    pub fn config(&self) -> &'a CompilerConfig {
        self.config
    }

    fn allocate(&mut self, kind: VariableKind) -> Variable {
        let id = self.next_variable;
        self.next_variable += 1;
        Variable::Allocated { id, kind }
    }

    /// Fresh node or relationship variable
    pub fn pattern_var(&mut self) -> Variable {
        self.allocate(VariableKind::Pattern)
    }

    /// Fresh variable for counts, collected lists and subquery results
    pub fn value_var(&mut self) -> Variable {
        self.allocate(VariableKind::Value)
    }

    /// Register a value use site
    pub fn param(&mut self, value: Value) -> CypherExpr {
        let id = self.next_param;
        self.next_param += 1;
        CypherExpr::Param(Param { id, value })
    }

    /// `$jwt`, bound to the caller's claims
    pub fn jwt(&self) -> CypherExpr {
        CypherExpr::NamedParam {
            name: "jwt",
            value: self.context.jwt_value(),
        }
    }

    /// `$isAuthenticated`
    pub fn is_authenticated(&self) -> CypherExpr {
        CypherExpr::NamedParam {
            name: "isAuthenticated",
            value: Value::Bool(self.context.is_authenticated),
        }
    }

    pub fn summary_mut(&mut self) -> &mut SummaryCounters {
        &mut self.summary
    }

    pub fn summary(&self) -> SummaryCounters {
        self.summary
    }

    /// Effective page size: the request's value (or the type's, or the
    /// configured default) capped by the type's or configured maximum
    pub fn effective_limit(&self, node: Option<&NodeType>, requested: Option<u32>) -> Option<u32> {
        let settings = node.and_then(|n| n.limit);
        let default = settings
            .and_then(|s| s.default)
            .or(self.config.default_limit);
        let max = settings.and_then(|s| s.max).or(self.config.max_limit);

        match (requested.or(default), max) {
            (Some(limit), Some(max)) => Some(limit.min(max)),
            (None, Some(max)) => Some(max),
            (limit, None) => limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph_catalog::testing::test_schema;

    #[test]
    fn test_allocator_is_per_context() {
        let schema = test_schema();
        let context = ExecutionContext::anonymous();
        let config = CompilerConfig::default();

        let mut first = PlanCtx::new(&schema, &context, &config);
        let a = first.pattern_var();
        let b = first.value_var();
        assert_ne!(a, b);

        let mut second = PlanCtx::new(&schema, &context, &config);
        assert_eq!(second.pattern_var(), a);
    }

    #[test]
    fn test_effective_limit() {
        let schema = test_schema();
        let context = ExecutionContext::anonymous();
        let config = CompilerConfig {
            default_limit: Some(10),
            max_limit: Some(50),
            ..Default::default()
        };
        let ctx = PlanCtx::new(&schema, &context, &config);

        let genre = schema.get_node("Genre").unwrap();
        assert_eq!(ctx.effective_limit(Some(genre), None), Some(20));
        assert_eq!(ctx.effective_limit(Some(genre), Some(500)), Some(100));

        let actor = schema.get_node("Actor").unwrap();
        assert_eq!(ctx.effective_limit(Some(actor), None), Some(10));
        assert_eq!(ctx.effective_limit(Some(actor), Some(80)), Some(50));
        assert_eq!(ctx.effective_limit(None, Some(5)), Some(5));
    }

    #[test]
    fn test_expected_summary_keys() {
        let counters = SummaryCounters {
            nodes_created: 2,
            relationships_created: 1,
            ..Default::default()
        };
        assert_eq!(
            counters.expected_keys(),
            vec!["nodesCreated", "relationshipsCreated"]
        );
    }
}
