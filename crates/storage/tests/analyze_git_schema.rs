use std::sync::Arc;

use arrow_schema::DataType;
use rq_common::{EngineConfig, Error};
use rq_planner::{plan_sql, Analyzer, BinaryOp, Catalog, Expr, Func, LiteralValue, Plan};
use rq_storage::{GitDatabase, Repository};

fn git_catalog() -> Catalog {
    let mut catalog = Catalog::new();
    catalog.register_database(Arc::new(GitDatabase::new(
        "repo",
        Arc::new(Repository::example()),
    )));
    catalog
}

fn scan(name: &str) -> Plan {
    Plan::UnresolvedTable {
        name: name.to_string(),
    }
}

fn col(name: &str) -> Expr {
    Expr::UnresolvedColumn {
        table: None,
        name: name.to_string(),
    }
}

fn qualified(table: &str, name: &str) -> Expr {
    Expr::UnresolvedColumn {
        table: Some(table.to_string()),
        name: name.to_string(),
    }
}

fn field(table: &str, name: &str, index: usize) -> Expr {
    Expr::GetField {
        index,
        data_type: DataType::Utf8,
        table: table.to_string(),
        name: name.to_string(),
        nullable: false,
    }
}

fn lit(s: &str) -> Expr {
    Expr::Literal(LiteralValue::Utf8(s.to_string()))
}

fn eq(left: Expr, right: Expr) -> Expr {
    Expr::BinaryOp {
        left: Box::new(left),
        op: BinaryOp::Eq,
        right: Box::new(right),
    }
}

fn no_pushdown_analyzer(catalog: &Catalog) -> Analyzer<'_> {
    Analyzer::from_config(
        catalog,
        &EngineConfig {
            default_database: "repo".to_string(),
            pushdown_enabled: false,
            distinct_optimization: true,
        },
    )
}

#[test]
fn unqualified_column_binds_against_unique_table() {
    let catalog = git_catalog();
    let analyzer = no_pushdown_analyzer(&catalog);
    let plan = Plan::Project {
        exprs: vec![col("hash")],
        input: Box::new(scan("commits")),
    };
    let analyzed = analyzer.analyze(plan).expect("analyze");
    match analyzed {
        Plan::Project { exprs, input } => {
            assert_eq!(exprs, vec![field("commits", "hash", 0)]);
            match *input {
                Plan::ResolvedTable { table } => assert_eq!(table.name(), "commits"),
                other => panic!("expected resolved scan, got {other:?}"),
            }
        }
        other => panic!("expected project, got {other:?}"),
    }
}

#[test]
fn ambiguous_unqualified_column_is_rejected() {
    let catalog = git_catalog();
    let analyzer = Analyzer::new(&catalog, "repo");
    let plan = Plan::Project {
        exprs: vec![col("name")],
        input: Box::new(Plan::CrossJoin {
            left: Box::new(scan("refs")),
            right: Box::new(scan("remotes")),
        }),
    };
    match analyzer.analyze(plan) {
        Err(Error::AmbiguousColumnName { column, tables }) => {
            assert_eq!(column, "name");
            assert_eq!(tables, vec!["refs".to_string(), "remotes".to_string()]);
        }
        other => panic!("expected AmbiguousColumnName, got {other:?}"),
    }
}

#[test]
fn star_expands_to_the_full_field_list() {
    let catalog = git_catalog();
    let analyzer = no_pushdown_analyzer(&catalog);
    let plan = Plan::Project {
        exprs: vec![Expr::Star],
        input: Box::new(scan("refs")),
    };
    let analyzed = analyzer.analyze(plan).expect("analyze");
    match analyzed {
        Plan::Project { exprs, .. } => {
            assert_eq!(
                exprs,
                vec![field("refs", "name", 0), field("refs", "hash", 1)]
            );
        }
        other => panic!("expected project, got {other:?}"),
    }
}

#[test]
fn capable_scan_absorbs_its_conjunct_only() {
    let catalog = git_catalog();
    let analyzer = Analyzer::new(&catalog, "repo");
    let plan = Plan::Filter {
        predicate: Expr::And(
            Box::new(eq(qualified("commits", "hash"), lit("abc"))),
            Box::new(eq(qualified("commits", "author_name"), lit("x"))),
        ),
        input: Box::new(scan("commits")),
    };
    let analyzed = analyzer.analyze(plan).expect("analyze");
    match analyzed {
        Plan::Filter { predicate, input } => {
            assert_eq!(predicate, eq(field("commits", "author_name", 1), lit("x")));
            match *input {
                Plan::PushdownProjectionAndFiltersTable {
                    columns,
                    handled_filters,
                    table,
                } => {
                    assert_eq!(table.name(), "commits");
                    assert_eq!(
                        columns,
                        vec![
                            field("commits", "hash", 0),
                            field("commits", "author_name", 1)
                        ]
                    );
                    assert_eq!(
                        handled_filters,
                        vec![eq(field("commits", "hash", 0), lit("abc"))]
                    );
                }
                other => panic!("expected wrapped scan, got {other:?}"),
            }
        }
        other => panic!("expected filter kept, got {other:?}"),
    }
}

#[test]
fn cross_table_predicate_is_not_pushed() {
    let catalog = git_catalog();
    let analyzer = Analyzer::new(&catalog, "repo");
    let plan = Plan::Filter {
        predicate: eq(qualified("refs", "hash"), qualified("commits", "hash")),
        input: Box::new(Plan::CrossJoin {
            left: Box::new(scan("refs")),
            right: Box::new(scan("commits")),
        }),
    };
    let analyzed = analyzer.analyze(plan).expect("analyze");
    match analyzed {
        Plan::Filter { predicate, input } => {
            // the join predicate survives untouched above the join
            assert_eq!(
                predicate,
                eq(field("refs", "hash", 1), field("commits", "hash", 2))
            );
            match *input {
                Plan::CrossJoin { left, right } => {
                    for side in [*left, *right] {
                        match side {
                            Plan::PushdownProjectionAndFiltersTable {
                                handled_filters, ..
                            } => assert!(handled_filters.is_empty()),
                            other => panic!("expected wrapped scan, got {other:?}"),
                        }
                    }
                }
                other => panic!("expected cross join, got {other:?}"),
            }
        }
        other => panic!("expected filter kept, got {other:?}"),
    }
}

#[test]
fn distinct_over_sorted_input_becomes_ordered() {
    let catalog = git_catalog();
    let analyzer = Analyzer::new(&catalog, "repo");
    let plan = plan_sql("SELECT DISTINCT hash FROM commits ORDER BY hash").expect("plan");
    let analyzed = analyzer.analyze(plan).expect("analyze");
    match analyzed {
        Plan::OrderedDistinct { input } => match *input {
            Plan::Sort { .. } => {}
            other => panic!("expected sort under ordered distinct, got {other:?}"),
        },
        other => panic!("expected OrderedDistinct, got {other:?}"),
    }
}

#[test]
fn projection_only_scan_narrows_columns() {
    let catalog = git_catalog();
    let analyzer = Analyzer::new(&catalog, "repo");
    let plan = plan_sql("SELECT url FROM remotes WHERE name = 'origin'").expect("plan");
    let analyzed = analyzer.analyze(plan).expect("analyze");
    // remotes evaluates no filters, so the filter node must survive
    match analyzed {
        Plan::Project { input, .. } => match *input {
            Plan::Filter { input, .. } => match *input {
                Plan::PushdownProjectionTable { columns, table } => {
                    assert_eq!(table.name(), "remotes");
                    assert_eq!(columns, vec!["name".to_string(), "url".to_string()]);
                }
                other => panic!("expected projection wrap, got {other:?}"),
            },
            other => panic!("expected filter kept, got {other:?}"),
        },
        other => panic!("expected project, got {other:?}"),
    }
}

#[test]
fn builtin_functions_resolve_over_git_columns() {
    let catalog = git_catalog();
    let analyzer = Analyzer::new(&catalog, "repo");
    let plan = plan_sql("SELECT is_tag(name) FROM refs").expect("plan");
    let analyzed = analyzer.analyze(plan).expect("analyze");
    assert!(analyzed.resolved());
    match analyzed {
        Plan::Project { exprs, .. } => match &exprs[0] {
            Expr::Function { func, args } => {
                assert_eq!(*func, Func::IsTag);
                assert_eq!(args, &vec![field("refs", "name", 0)]);
            }
            other => panic!("expected function, got {other:?}"),
        },
        other => panic!("expected project, got {other:?}"),
    }
}

#[test]
fn show_tables_gets_the_current_database() {
    let catalog = git_catalog();
    let analyzer = Analyzer::new(&catalog, "repo");
    let analyzed = analyzer
        .analyze(plan_sql("SHOW TABLES").expect("plan"))
        .expect("analyze");
    match analyzed {
        Plan::ShowTables { database: Some(db) } => assert_eq!(db.name(), "repo"),
        other => panic!("expected resolved ShowTables, got {other:?}"),
    }
}

#[test]
fn unknown_current_database_propagates() {
    let catalog = git_catalog();
    let analyzer = Analyzer::new(&catalog, "elsewhere");
    match analyzer.analyze(plan_sql("SHOW TABLES").expect("plan")) {
        Err(Error::DatabaseNotFound(name)) => assert_eq!(name, "elsewhere"),
        other => panic!("expected DatabaseNotFound, got {other:?}"),
    }
}

#[test]
fn subquery_aliases_are_analyzed_recursively() {
    let catalog = git_catalog();
    let analyzer = Analyzer::new(&catalog, "repo");
    let plan = plan_sql("SELECT * FROM (SELECT hash FROM commits) AS cs").expect("plan");
    let analyzed = analyzer.analyze(plan).expect("analyze");
    assert!(analyzed.resolved(), "{analyzed:?}");
    match analyzed {
        Plan::Project { exprs, input } => {
            assert_eq!(exprs, vec![field("commits", "hash", 0)]);
            assert!(matches!(*input, Plan::SubqueryAlias { .. }));
        }
        other => panic!("expected project, got {other:?}"),
    }
}
