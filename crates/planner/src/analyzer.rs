use std::fmt;

use rq_common::{EngineConfig, Result};
use tracing::debug;

use crate::catalog::Catalog;
use crate::logical_plan::Plan;
use crate::rules;

/// Signature shared by all analyzer rules: a pure plan-to-plan rewrite.
pub type RuleFn = fn(&Analyzer<'_>, Plan) -> Result<Plan>;

/// A named analyzer rule. The rule list is data, not code structure, so
/// tests can run rules in isolation or out of order.
#[derive(Clone, Copy)]
pub struct Rule {
    /// Rule name as reported in logs.
    pub name: &'static str,
    /// The rewrite itself.
    pub apply: RuleFn,
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule").field("name", &self.name).finish()
    }
}

/// The default rule pipeline, in application order. The order is observable:
/// qualification requires resolved tables, column binding requires qualified
/// columns, and pushdown requires a fully resolved tree.
pub fn default_rules() -> Vec<Rule> {
    vec![
        Rule {
            name: "resolve_subqueries",
            apply: rules::resolve_subqueries,
        },
        Rule {
            name: "resolve_tables",
            apply: rules::resolve_tables,
        },
        Rule {
            name: "qualify_columns",
            apply: rules::qualify_columns,
        },
        Rule {
            name: "resolve_columns",
            apply: rules::resolve_columns,
        },
        Rule {
            name: "resolve_database",
            apply: rules::resolve_database,
        },
        Rule {
            name: "resolve_star",
            apply: rules::resolve_star,
        },
        Rule {
            name: "resolve_functions",
            apply: rules::resolve_functions,
        },
        Rule {
            name: "pushdown",
            apply: rules::pushdown,
        },
        Rule {
            name: "optimize_distinct",
            apply: rules::optimize_distinct,
        },
    ]
}

/// Drives the rule pipeline over logical plans.
///
/// The analyzer borrows the catalog immutably and takes ownership of the
/// input plan; a single analysis call is synchronous and carries no mutable
/// shared state, so independent plans may be analyzed from separate threads.
pub struct Analyzer<'a> {
    /// Catalog consulted for databases, tables, and functions.
    pub catalog: &'a Catalog,
    /// Database used to resolve unqualified table references.
    pub current_database: String,
    /// Rules applied in order by [`Analyzer::analyze`].
    pub rules: Vec<Rule>,
}

impl fmt::Debug for Analyzer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Analyzer")
            .field("current_database", &self.current_database)
            .field(
                "rules",
                &self.rules.iter().map(|r| r.name).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl<'a> Analyzer<'a> {
    /// Create an analyzer with the default rule pipeline.
    pub fn new(catalog: &'a Catalog, current_database: impl Into<String>) -> Self {
        Self {
            catalog,
            current_database: current_database.into(),
            rules: default_rules(),
        }
    }

    /// Create an analyzer with an explicit rule list. Intended for tests
    /// that exercise rules in isolation or out of order.
    pub fn with_rules(
        catalog: &'a Catalog,
        current_database: impl Into<String>,
        rules: Vec<Rule>,
    ) -> Self {
        Self {
            catalog,
            current_database: current_database.into(),
            rules,
        }
    }

    /// Create an analyzer from engine configuration; disabled optimizations
    /// are omitted from the rule list.
    pub fn from_config(catalog: &'a Catalog, config: &EngineConfig) -> Self {
        let rules = default_rules()
            .into_iter()
            .filter(|rule| match rule.name {
                "pushdown" => config.pushdown_enabled,
                "optimize_distinct" => config.distinct_optimization,
                _ => true,
            })
            .collect();
        Self {
            catalog,
            current_database: config.default_database.clone(),
            rules,
        }
    }

    /// Apply every rule in order. The first error aborts the pipeline and
    /// the partially-rewritten tree is discarded.
    pub fn analyze(&self, plan: Plan) -> Result<Plan> {
        let mut plan = plan;
        for rule in &self.rules {
            debug!(rule = rule.name, "applying analyzer rule");
            plan = (rule.apply)(self, plan)?;
        }
        Ok(plan)
    }
}
