use std::sync::Arc;

use arrow_schema::DataType;
use rq_common::{EngineConfig, Result};
use rq_planner::{
    default_rules, plan_sql, Analyzer, Catalog, Expr, MemDatabase, MemTable, Plan,
    PushdownSupport, Rule,
};

fn test_catalog() -> Catalog {
    let refs = MemTable::new(
        "refs",
        vec![
            ("name", DataType::Utf8, false),
            ("hash", DataType::Utf8, false),
        ],
    )
    .with_support(PushdownSupport::ProjectionAndFilters)
    .with_filter_columns(&["name", "hash"]);
    let remotes = MemTable::new(
        "remotes",
        vec![
            ("name", DataType::Utf8, false),
            ("url", DataType::Utf8, false),
        ],
    )
    .with_support(PushdownSupport::Projection);

    let mut catalog = Catalog::new();
    catalog.register_database(Arc::new(
        MemDatabase::new("db")
            .add_table(Arc::new(refs))
            .add_table(Arc::new(remotes)),
    ));
    catalog
}

#[test]
fn full_pipeline_resolves_parsed_query() {
    let catalog = test_catalog();
    let analyzer = Analyzer::new(&catalog, "db");
    let plan = plan_sql("SELECT hash FROM refs WHERE name = 'HEAD'").expect("plan");
    let analyzed = analyzer.analyze(plan).expect("analyze");
    assert!(analyzed.resolved(), "expected resolved plan: {analyzed:?}");

    // name = 'HEAD' is absorbed by the capable scan, so the filter is gone
    match analyzed {
        Plan::Project { exprs, input } => {
            assert_eq!(exprs.len(), 1);
            match &exprs[0] {
                Expr::GetField { index, name, .. } => {
                    assert_eq!(*index, 1);
                    assert_eq!(name, "hash");
                }
                other => panic!("expected field accessor, got {other:?}"),
            }
            match *input {
                Plan::PushdownProjectionAndFiltersTable {
                    handled_filters, ..
                } => assert_eq!(handled_filters.len(), 1),
                other => panic!("expected wrapped scan, got {other:?}"),
            }
        }
        other => panic!("expected project root, got {other:?}"),
    }
}

#[test]
fn rule_subset_leaves_later_stages_undone() {
    let catalog = test_catalog();
    let rules: Vec<Rule> = default_rules()
        .into_iter()
        .filter(|r| r.name == "resolve_tables")
        .collect();
    let analyzer = Analyzer::with_rules(&catalog, "db", rules);
    let plan = plan_sql("SELECT hash FROM refs").expect("plan");
    let analyzed = analyzer.analyze(plan).expect("analyze");
    // tables bound, columns still symbolic
    match analyzed {
        Plan::Project { exprs, input } => {
            assert!(matches!(exprs[0], Expr::UnresolvedColumn { .. }));
            assert!(matches!(*input, Plan::ResolvedTable { .. }));
        }
        other => panic!("expected project, got {other:?}"),
    }
}

fn force_ordered_distinct(_a: &Analyzer<'_>, plan: Plan) -> Result<Plan> {
    match plan {
        Plan::Distinct { input } => Ok(Plan::OrderedDistinct { input }),
        other => Ok(other),
    }
}

#[test]
fn injected_rules_run_in_given_order() {
    let catalog = test_catalog();
    let mut rules = default_rules();
    rules.push(Rule {
        name: "force_ordered_distinct",
        apply: force_ordered_distinct,
    });
    let analyzer = Analyzer::with_rules(&catalog, "db", rules);
    let plan = plan_sql("SELECT DISTINCT hash FROM refs").expect("plan");
    // no sort below, so the default pipeline keeps Distinct; the injected
    // rule rewrites it afterwards
    let analyzed = analyzer.analyze(plan).expect("analyze");
    assert!(matches!(analyzed, Plan::OrderedDistinct { .. }));
}

#[test]
fn config_disables_pushdown() {
    let catalog = test_catalog();
    let config = EngineConfig {
        default_database: "db".to_string(),
        pushdown_enabled: false,
        distinct_optimization: true,
    };
    let analyzer = Analyzer::from_config(&catalog, &config);
    let plan = plan_sql("SELECT hash FROM refs WHERE name = 'HEAD'").expect("plan");
    let analyzed = analyzer.analyze(plan).expect("analyze");
    match analyzed {
        Plan::Project { input, .. } => match *input {
            Plan::Filter { input, .. } => {
                assert!(matches!(*input, Plan::ResolvedTable { .. }));
            }
            other => panic!("expected filter kept, got {other:?}"),
        },
        other => panic!("expected project, got {other:?}"),
    }
}

#[test]
fn analysis_errors_name_the_offender() {
    let catalog = test_catalog();
    let analyzer = Analyzer::new(&catalog, "db");

    let plan = plan_sql("SELECT hash FROM tags").expect("plan");
    let err = analyzer.analyze(plan).expect_err("unknown table");
    assert_eq!(err.to_string(), "table not found: tags");

    let plan = plan_sql("SELECT name FROM refs, remotes").expect("plan");
    let err = analyzer.analyze(plan).expect_err("ambiguous column");
    assert!(
        err.to_string().contains("ambiguous column name \"name\""),
        "{err}"
    );

    let plan = plan_sql("SELECT nonexistent FROM refs").expect("plan");
    let err = analyzer.analyze(plan).expect_err("unknown column");
    assert!(err.to_string().contains("\"nonexistent\""), "{err}");
}
