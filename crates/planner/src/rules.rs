//! The analyzer rule set.
//!
//! Every rule is a pure `(Analyzer, Plan) -> Result<Plan>` rewrite built on
//! the two generic traversals of [`crate::logical_plan`]. Rules are applied
//! in the order fixed by [`crate::analyzer::default_rules`].

use std::collections::{HashMap, HashSet};

use rq_common::{Error, Result};
use tracing::debug;

use crate::analyzer::Analyzer;
use crate::catalog::{PushdownSupport, Schema};
use crate::logical_plan::{join_and, split_conjuncts, Expr, Plan};

/// Recursively run the full analyzer over the child of every
/// `SubqueryAlias`.
pub fn resolve_subqueries(a: &Analyzer<'_>, plan: Plan) -> Result<Plan> {
    plan.transform_up(&mut |node| match node {
        Plan::SubqueryAlias { name, input } => {
            debug!(subquery = %name, "resolving subquery");
            let child = a.analyze(*input)?;
            Ok(Plan::SubqueryAlias {
                name,
                input: Box::new(child),
            })
        }
        other => Ok(other),
    })
}

/// Replace every `UnresolvedTable` with the catalog table of the same name
/// in the current database.
pub fn resolve_tables(a: &Analyzer<'_>, plan: Plan) -> Result<Plan> {
    plan.transform_up(&mut |node| {
        if node.resolved() {
            return Ok(node);
        }
        match node {
            Plan::UnresolvedTable { name } => {
                let table = a.catalog.table(&a.current_database, &name)?;
                debug!(table = %name, "table resolved");
                Ok(Plan::ResolvedTable { table })
            }
            other => Ok(other),
        }
    })
}

/// Attach a table name to every bare column reference.
///
/// Resolution is lexical: alias and column indexes are built during the same
/// bottom-up traversal that consults them, so a reference is qualified
/// against the tables encountered so far.
pub fn qualify_columns(_a: &Analyzer<'_>, plan: Plan) -> Result<Plan> {
    let mut tables: HashSet<String> = HashSet::new();
    let mut table_aliases: HashMap<String, String> = HashMap::new();
    let mut col_index: HashMap<String, Vec<String>> = HashMap::new();

    plan.transform_up(&mut |node| {
        match &node {
            Plan::TableAlias { name, input } => match input.as_ref() {
                Plan::ResolvedTable { table } => {
                    table_aliases.insert(name.clone(), table.name().to_string());
                }
                child => {
                    tables.insert(name.clone());
                    index_columns(name, &child.schema(), &mut col_index);
                }
            },
            Plan::ResolvedTable { table } => {
                tables.insert(table.name().to_string());
                index_columns(table.name(), table.schema(), &mut col_index);
            }
            _ => {}
        }

        node.transform_expressions_up(&mut |e| {
            let (table, name) = match e {
                Expr::UnresolvedColumn { table, name } => (table, name),
                Expr::UnresolvedQualifiedColumn { table, name } => (Some(table), name),
                other => return Ok(other),
            };
            match table {
                None => {
                    let candidates =
                        dedup_strings(col_index.get(&name).cloned().unwrap_or_default());
                    match candidates.len() {
                        0 => Err(Error::ColumnTableNotFound {
                            table: String::new(),
                            column: name,
                        }),
                        1 => {
                            let table = candidates.into_iter().next().unwrap_or_default();
                            debug!(column = %name, table = %table, "column qualified");
                            Ok(Expr::UnresolvedQualifiedColumn { table, name })
                        }
                        _ => Err(Error::AmbiguousColumnName {
                            column: name,
                            tables: candidates,
                        }),
                    }
                }
                Some(qualifier) => {
                    let real = table_aliases
                        .get(&qualifier)
                        .cloned()
                        .unwrap_or(qualifier);
                    if !tables.contains(&real) {
                        return Err(Error::TableNotFound(real));
                    }
                    Ok(Expr::UnresolvedQualifiedColumn { table: real, name })
                }
            }
        })
    })
}

fn index_columns(table: &str, schema: &Schema, col_index: &mut HashMap<String, Vec<String>>) {
    for col in schema.columns() {
        col_index
            .entry(col.name.clone())
            .or_default()
            .push(table.to_string());
    }
}

fn dedup_strings(input: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    input.into_iter().filter(|s| seen.insert(s.clone())).collect()
}

/// Bind every qualified column to a positional field accessor typed by the
/// schema of the node's children, concatenated in declaration order.
pub fn resolve_columns(_a: &Analyzer<'_>, plan: Plan) -> Result<Plan> {
    plan.transform_up(&mut |node| {
        if node.resolved() {
            return Ok(node);
        }

        // field indices are relative to the concatenated row the node's
        // expression evaluator will see
        let mut col_map: HashMap<String, Vec<(usize, crate::catalog::Column)>> = HashMap::new();
        {
            let children = node.children();
            if children.iter().any(|c| !c.resolved()) {
                return Ok(node);
            }
            let mut idx = 0;
            for child in children {
                let schema = child.schema();
                for col in schema.columns() {
                    col_map
                        .entry(col.name.clone())
                        .or_default()
                        .push((idx, col.clone()));
                    idx += 1;
                }
            }
        }

        node.transform_expressions_up(&mut |e| {
            let (table, name) = match &e {
                Expr::UnresolvedColumn { table, name } => {
                    (table.clone().unwrap_or_default(), name.clone())
                }
                Expr::UnresolvedQualifiedColumn { table, name } => (table.clone(), name.clone()),
                _ => return Ok(e),
            };

            let found = col_map
                .get(&name)
                .and_then(|candidates| candidates.iter().find(|(_, c)| c.source == table));
            match found {
                Some((index, column)) => {
                    debug!(table = %column.source, column = %column.name, index = *index, "column resolved");
                    Ok(Expr::GetField {
                        index: *index,
                        data_type: column.data_type.clone(),
                        table: column.source.clone(),
                        name: column.name.clone(),
                        nullable: column.nullable,
                    })
                }
                None => Err(Error::ColumnTableNotFound {
                    table,
                    column: name,
                }),
            }
        })
    })
}

/// Fill in the current database on schema-introspection and DDL root nodes.
pub fn resolve_database(a: &Analyzer<'_>, plan: Plan) -> Result<Plan> {
    match plan {
        Plan::ShowTables { .. } => {
            let database = a.catalog.database(&a.current_database)?;
            Ok(Plan::ShowTables {
                database: Some(database),
            })
        }
        Plan::CreateTable { name, schema, .. } => {
            let database = a.catalog.database(&a.current_database)?;
            Ok(Plan::CreateTable {
                database: Some(database),
                name,
                schema,
            })
        }
        other => Ok(other),
    }
}

/// Expand `Project([Star])` to the explicit field list of the child schema.
/// `Star` mixed with other expressions is left alone.
pub fn resolve_star(_a: &Analyzer<'_>, plan: Plan) -> Result<Plan> {
    plan.transform_up(&mut |node| {
        if node.resolved() {
            return Ok(node);
        }
        match node {
            Plan::Project { exprs, input }
                if exprs.len() == 1 && matches!(exprs[0], Expr::Star) =>
            {
                let schema = input.schema();
                let fields = schema
                    .columns()
                    .iter()
                    .enumerate()
                    .map(|(i, col)| Expr::GetField {
                        index: i,
                        data_type: col.data_type.clone(),
                        table: col.source.clone(),
                        name: col.name.clone(),
                        nullable: col.nullable,
                    })
                    .collect::<Vec<_>>();
                debug!(fields = fields.len(), "star expanded");
                Ok(Plan::Project {
                    exprs: fields,
                    input,
                })
            }
            other => Ok(other),
        }
    })
}

/// Bind every `UnresolvedFunction` to a catalog-provided implementation.
/// Builder errors (arity, argument shape) propagate verbatim.
pub fn resolve_functions(a: &Analyzer<'_>, plan: Plan) -> Result<Plan> {
    plan.transform_up(&mut |node| {
        if node.resolved() {
            return Ok(node);
        }
        node.transform_expressions_up(&mut |e| {
            if e.resolved() {
                return Ok(e);
            }
            match e {
                Expr::UnresolvedFunction { name, args } => {
                    let builder = a.catalog.function(&name)?;
                    debug!(function = %name, "function resolved");
                    builder(args)
                }
                other => Ok(other),
            }
        })
    })
}

/// Push used-column lists and single-table filter predicates into scans that
/// advertise the capability. No-op on unresolved input.
pub fn pushdown(_a: &Analyzer<'_>, plan: Plan) -> Result<Plan> {
    if !plan.resolved() {
        return Ok(plan);
    }

    // First pass: group every field access by the table it mentions. Even if
    // a field appears multiple times, only the first occurrence is kept.
    let mut fields_by_table: HashMap<String, Vec<String>> = HashMap::new();
    let mut exprs_by_table: HashMap<String, Vec<Expr>> = HashMap::new();
    let mut seen_fields: HashSet<(String, String)> = HashSet::new();
    let plan = plan.transform_up(&mut |node| {
        node.transform_expressions_up(&mut |e| {
            if let Expr::GetField { table, name, .. } = &e {
                if seen_fields.insert((table.clone(), name.clone())) {
                    debug!(table = %table, column = %name, "found used column");
                    fields_by_table
                        .entry(table.clone())
                        .or_default()
                        .push(name.clone());
                    exprs_by_table.entry(table.clone()).or_default().push(e.clone());
                }
            }
            Ok(e)
        })
    })?;

    // Second pass: collect filter conjuncts by table. A conjunct mentioning
    // more than one table cannot be pushed into any single scan.
    let mut filters: HashMap<String, Vec<Expr>> = HashMap::new();
    let plan = plan.transform_up(&mut |node| {
        if let Plan::Filter { predicate, .. } = &node {
            for conjunct in split_conjuncts(predicate) {
                let tables = expr_tables(&conjunct);
                if tables.len() == 1 {
                    let table = tables.into_iter().next().unwrap_or_default();
                    filters.entry(table).or_default().push(conjunct);
                }
            }
        }
        Ok(node)
    })?;

    // Third pass: wrap capable scans, then strip absorbed conjuncts from the
    // filters above them. Children are visited before parents, so every scan
    // reports its handled filters before the enclosing filter is rewritten.
    let mut handled_filters: Vec<Expr> = Vec::new();
    plan.transform_up(&mut |node| match node {
        Plan::Filter { predicate, input } => {
            if handled_filters.is_empty() {
                return Ok(Plan::Filter { predicate, input });
            }
            let unhandled: Vec<Expr> = split_conjuncts(&predicate)
                .into_iter()
                .filter(|c| !handled_filters.contains(c))
                .collect();
            match join_and(unhandled) {
                None => {
                    debug!("filter fully handled by scans, removing node");
                    Ok(*input)
                }
                Some(predicate) => Ok(Plan::Filter {
                    predicate,
                    input,
                }),
            }
        }
        // the wrappers would qualify again; returning them untouched stops
        // the rewrite from wrapping its own output
        node @ (Plan::PushdownProjectionTable { .. }
        | Plan::PushdownProjectionAndFiltersTable { .. }) => Ok(node),
        Plan::ResolvedTable { table } => match table.pushdown() {
            PushdownSupport::ProjectionAndFilters => {
                let name = table.name().to_string();
                let table_filters = filters.get(&name).cloned().unwrap_or_default();
                let handled = table.handled_filters(&table_filters);
                handled_filters.extend(handled.iter().cloned());
                debug!(
                    table = %name,
                    handled = handled.len(),
                    of = table_filters.len(),
                    "pushdown of projection and filters"
                );

                let columns = fix_field_indexes_on_expressions(
                    table.schema(),
                    exprs_by_table.get(&name).cloned().unwrap_or_default(),
                )?;
                let handled = fix_field_indexes_on_expressions(table.schema(), handled)?;
                Ok(Plan::PushdownProjectionAndFiltersTable {
                    columns,
                    handled_filters: handled,
                    table,
                })
            }
            PushdownSupport::Projection => {
                let name = table.name().to_string();
                debug!(table = %name, "pushdown of projection");
                Ok(Plan::PushdownProjectionTable {
                    columns: fields_by_table.get(&name).cloned().unwrap_or_default(),
                    table,
                })
            }
            PushdownSupport::None => Ok(Plan::ResolvedTable { table }),
        },
        other => Ok(other),
    })
}

/// Distinct table names mentioned by the field accessors of an expression,
/// in first-use order.
fn expr_tables(expr: &Expr) -> Vec<String> {
    fn walk(expr: &Expr, out: &mut Vec<String>) {
        if let Expr::GetField { table, .. } = expr {
            if !out.contains(table) {
                out.push(table.clone());
            }
        }
        for child in expr.children() {
            walk(child, out);
        }
    }
    let mut out = Vec::new();
    walk(expr, &mut out);
    out
}

/// Rewrite every field accessor in `exprs` against the given schema.
fn fix_field_indexes_on_expressions(schema: &Schema, exprs: Vec<Expr>) -> Result<Vec<Expr>> {
    exprs
        .into_iter()
        .map(|e| fix_field_indexes(schema, e))
        .collect()
}

/// Rewrite every `GetField` inside `expr` so its index points into `schema`.
/// Match is by name only; type and nullability are kept from the original
/// accessor.
fn fix_field_indexes(schema: &Schema, expr: Expr) -> Result<Expr> {
    expr.transform_up(&mut |e| match e {
        Expr::GetField {
            data_type,
            table,
            name,
            nullable,
            ..
        } => match schema.index_of(&name) {
            Some(index) => Ok(Expr::GetField {
                index,
                data_type,
                table,
                name,
                nullable,
            }),
            None => Err(Error::FieldMissing(name)),
        },
        other => Ok(other),
    })
}

/// Downgrade a root `Distinct` to `OrderedDistinct` when its subtree sorts.
pub fn optimize_distinct(_a: &Analyzer<'_>, plan: Plan) -> Result<Plan> {
    fn has_sort(plan: &Plan) -> bool {
        matches!(plan, Plan::Sort { .. }) || plan.children().iter().any(|c| has_sort(c))
    }

    match plan {
        Plan::Distinct { input } if has_sort(&input) => {
            debug!("distinct optimized for ordered output");
            Ok(Plan::OrderedDistinct { input })
        }
        other => Ok(other),
    }
}
