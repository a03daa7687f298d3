use arrow_schema::{DataType, TimeUnit};
use rq_common::{Error, Result};
use sqlparser::ast::{
    BinaryOperator as SqlBinaryOp, ColumnOption, CreateTable, DataType as SqlDataType, Distinct,
    Expr as SqlExpr, Function, FunctionArg, FunctionArgExpr, FunctionArguments, GroupByExpr,
    ObjectName, Query, SelectItem, SetExpr, Statement, TableFactor, TableWithJoins,
    UnaryOperator, Value as SqlValue,
};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

use crate::catalog::{Column, Schema};
use crate::logical_plan::{BinaryOp, Expr, LiteralValue, Plan, SortField};

/// Convert a SQL string into an unresolved [`Plan`].
///
/// Contract:
/// - exactly one statement must be present;
/// - supported statements are queries, `SHOW TABLES`, and `CREATE TABLE`.
///
/// Error taxonomy:
/// - `Parse`: the text is not valid SQL at all
/// - `Unsupported`: valid SQL outside the supported subset, naming the
///   construct
pub fn plan_sql(sql: &str) -> Result<Plan> {
    let dialect = GenericDialect {};
    let statements =
        Parser::parse_sql(&dialect, sql).map_err(|e| Error::Parse(e.to_string()))?;
    if statements.len() > 1 {
        return Err(Error::Unsupported(format!(
            "expected a single statement, got {}",
            statements.len()
        )));
    }
    match statements.into_iter().next() {
        Some(statement) => statement_to_plan(statement),
        None => Err(Error::Unsupported("empty SQL input".to_string())),
    }
}

fn statement_to_plan(statement: Statement) -> Result<Plan> {
    match statement {
        Statement::Query(query) => query_to_plan(*query),
        Statement::ShowTables { .. } => Ok(Plan::ShowTables { database: None }),
        Statement::CreateTable(create) => create_table_to_plan(create),
        other => Err(Error::Unsupported(format!("statement: {other}"))),
    }
}

fn create_table_to_plan(create: CreateTable) -> Result<Plan> {
    let name = object_name(&create.name);
    let columns = create
        .columns
        .into_iter()
        .map(|def| {
            let nullable = !def
                .options
                .iter()
                .any(|o| matches!(o.option, ColumnOption::NotNull));
            Ok(Column::new(
                &def.name.value,
                column_type(&def.data_type)?,
                &name,
                nullable,
            ))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Plan::CreateTable {
        database: None,
        name,
        schema: Schema::new(columns),
    })
}

fn column_type(data_type: &SqlDataType) -> Result<DataType> {
    match data_type {
        SqlDataType::Text | SqlDataType::Varchar(_) | SqlDataType::Char(_) => Ok(DataType::Utf8),
        SqlDataType::Int(_) | SqlDataType::Integer(_) | SqlDataType::BigInt(_) => {
            Ok(DataType::Int64)
        }
        SqlDataType::Boolean => Ok(DataType::Boolean),
        SqlDataType::Bytea | SqlDataType::Blob(_) | SqlDataType::Binary(_) => Ok(DataType::Binary),
        SqlDataType::Timestamp(_, _) => Ok(DataType::Timestamp(TimeUnit::Second, None)),
        other => Err(Error::Unsupported(format!("column type: {other}"))),
    }
}

fn query_to_plan(query: Query) -> Result<Plan> {
    let Query {
        with,
        body,
        order_by,
        limit,
        offset,
        ..
    } = query;
    if with.is_some() {
        return Err(Error::Unsupported("WITH clauses".to_string()));
    }
    if limit.is_some() || offset.is_some() {
        return Err(Error::Unsupported("LIMIT/OFFSET".to_string()));
    }

    let select = match *body {
        SetExpr::Select(select) => *select,
        other => return Err(Error::Unsupported(format!("query body: {other}"))),
    };

    match &select.group_by {
        GroupByExpr::Expressions(exprs, modifiers) if exprs.is_empty() && modifiers.is_empty() => {}
        _ => return Err(Error::Unsupported("GROUP BY".to_string())),
    }
    if select.having.is_some() {
        return Err(Error::Unsupported("HAVING".to_string()));
    }

    let mut plan = from_to_plan(select.from)?;

    if let Some(selection) = select.selection {
        plan = Plan::Filter {
            predicate: sql_expr(selection)?,
            input: Box::new(plan),
        };
    }

    let exprs = select
        .projection
        .into_iter()
        .map(|item| match item {
            SelectItem::Wildcard(_) => Ok(Expr::Star),
            SelectItem::UnnamedExpr(e) => sql_expr(e),
            SelectItem::ExprWithAlias { .. } => {
                Err(Error::Unsupported("column aliases".to_string()))
            }
            SelectItem::QualifiedWildcard(..) => {
                Err(Error::Unsupported("qualified wildcards".to_string()))
            }
        })
        .collect::<Result<Vec<_>>>()?;
    plan = Plan::Project {
        exprs,
        input: Box::new(plan),
    };

    if let Some(order_by) = order_by {
        let fields = order_by
            .exprs
            .into_iter()
            .map(|o| {
                Ok(SortField {
                    expr: sql_expr(o.expr)?,
                    ascending: o.asc.unwrap_or(true),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        plan = Plan::Sort {
            fields,
            input: Box::new(plan),
        };
    }

    match select.distinct {
        None => {}
        Some(Distinct::Distinct) => {
            plan = Plan::Distinct {
                input: Box::new(plan),
            };
        }
        Some(Distinct::On(_)) => return Err(Error::Unsupported("DISTINCT ON".to_string())),
    }

    Ok(plan)
}

fn from_to_plan(from: Vec<TableWithJoins>) -> Result<Plan> {
    let mut relations = Vec::new();
    for table in from {
        if !table.joins.is_empty() {
            return Err(Error::Unsupported("JOIN clauses".to_string()));
        }
        relations.push(relation_to_plan(table.relation)?);
    }
    let mut relations = relations.into_iter();
    let first = relations
        .next()
        .ok_or_else(|| Error::Unsupported("queries without FROM".to_string()))?;
    // comma-separated relations form a left-deep cross join
    Ok(relations.fold(first, |left, right| Plan::CrossJoin {
        left: Box::new(left),
        right: Box::new(right),
    }))
}

fn relation_to_plan(relation: TableFactor) -> Result<Plan> {
    match relation {
        TableFactor::Table { name, alias, .. } => {
            let table = Plan::UnresolvedTable {
                name: object_name(&name),
            };
            Ok(match alias {
                Some(alias) => Plan::TableAlias {
                    name: alias.name.value,
                    input: Box::new(table),
                },
                None => table,
            })
        }
        TableFactor::Derived {
            subquery,
            alias: Some(alias),
            ..
        } => Ok(Plan::SubqueryAlias {
            name: alias.name.value,
            input: Box::new(query_to_plan(*subquery)?),
        }),
        TableFactor::Derived { alias: None, .. } => {
            Err(Error::Unsupported("derived tables without alias".to_string()))
        }
        other => Err(Error::Unsupported(format!("relation: {other}"))),
    }
}

fn sql_expr(expr: SqlExpr) -> Result<Expr> {
    match expr {
        SqlExpr::Identifier(ident) => Ok(Expr::UnresolvedColumn {
            table: None,
            name: ident.value,
        }),
        SqlExpr::CompoundIdentifier(mut parts) => {
            if parts.len() != 2 {
                return Err(Error::Unsupported(format!(
                    "column path with {} segments",
                    parts.len()
                )));
            }
            let column = parts.pop();
            let table = parts.pop();
            match (table, column) {
                (Some(table), Some(column)) => Ok(Expr::UnresolvedColumn {
                    table: Some(table.value),
                    name: column.value,
                }),
                _ => Err(Error::Unsupported("empty column path".to_string())),
            }
        }
        SqlExpr::Value(value) => literal(value),
        SqlExpr::BinaryOp { left, op, right } => {
            let left = Box::new(sql_expr(*left)?);
            let right = Box::new(sql_expr(*right)?);
            match op {
                SqlBinaryOp::And => Ok(Expr::And(left, right)),
                SqlBinaryOp::Or => Ok(Expr::Or(left, right)),
                other => Ok(Expr::BinaryOp {
                    left,
                    op: binary_op(other)?,
                    right,
                }),
            }
        }
        SqlExpr::UnaryOp {
            op: UnaryOperator::Not,
            expr,
        } => Ok(Expr::Not(Box::new(sql_expr(*expr)?))),
        SqlExpr::Nested(inner) => sql_expr(*inner),
        SqlExpr::Function(func) => function_call(func),
        other => Err(Error::Unsupported(format!("expression: {other}"))),
    }
}

fn function_call(func: Function) -> Result<Expr> {
    let Function { name, args, .. } = func;
    let args = match args {
        FunctionArguments::None => Vec::new(),
        FunctionArguments::List(list) => list
            .args
            .into_iter()
            .map(|arg| match arg {
                FunctionArg::Unnamed(FunctionArgExpr::Expr(e)) => sql_expr(e),
                other => Err(Error::Unsupported(format!("function argument: {other}"))),
            })
            .collect::<Result<Vec<_>>>()?,
        FunctionArguments::Subquery(_) => {
            return Err(Error::Unsupported("subquery function arguments".to_string()))
        }
    };
    Ok(Expr::UnresolvedFunction {
        name: object_name(&name),
        args,
    })
}

fn binary_op(op: SqlBinaryOp) -> Result<BinaryOp> {
    match op {
        SqlBinaryOp::Eq => Ok(BinaryOp::Eq),
        SqlBinaryOp::NotEq => Ok(BinaryOp::NotEq),
        SqlBinaryOp::Lt => Ok(BinaryOp::Lt),
        SqlBinaryOp::LtEq => Ok(BinaryOp::LtEq),
        SqlBinaryOp::Gt => Ok(BinaryOp::Gt),
        SqlBinaryOp::GtEq => Ok(BinaryOp::GtEq),
        SqlBinaryOp::Plus => Ok(BinaryOp::Plus),
        SqlBinaryOp::Minus => Ok(BinaryOp::Minus),
        SqlBinaryOp::Multiply => Ok(BinaryOp::Multiply),
        SqlBinaryOp::Divide => Ok(BinaryOp::Divide),
        other => Err(Error::Unsupported(format!("operator: {other}"))),
    }
}

fn literal(value: SqlValue) -> Result<Expr> {
    match value {
        SqlValue::Number(n, _) => n
            .parse::<i64>()
            .map(|v| Expr::Literal(LiteralValue::Int64(v)))
            .map_err(|_| Error::Unsupported(format!("numeric literal: {n}"))),
        SqlValue::SingleQuotedString(s) | SqlValue::DoubleQuotedString(s) => {
            Ok(Expr::Literal(LiteralValue::Utf8(s)))
        }
        SqlValue::Boolean(b) => Ok(Expr::Literal(LiteralValue::Boolean(b))),
        SqlValue::Null => Ok(Expr::Literal(LiteralValue::Null)),
        other => Err(Error::Unsupported(format!("literal: {other}"))),
    }
}

fn object_name(name: &ObjectName) -> String {
    name.0
        .last()
        .map(|ident| ident.value.clone())
        .unwrap_or_default()
}
