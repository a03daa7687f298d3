use crate::logical_plan::{BinaryOp, Expr, LiteralValue, Plan};

/// Render a logical plan as human-readable multiline text.
pub fn explain_plan(plan: &Plan) -> String {
    let mut s = String::new();
    fmt_plan(plan, 0, &mut s);
    s
}

fn fmt_plan(plan: &Plan, indent: usize, out: &mut String) {
    let pad = "  ".repeat(indent);
    match plan {
        Plan::UnresolvedTable { name } => {
            out.push_str(&format!("{pad}UnresolvedTable name={name}\n"));
        }
        Plan::ResolvedTable { table } => {
            out.push_str(&format!("{pad}Table name={}\n", table.name()));
        }
        Plan::Project { exprs, input } => {
            out.push_str(&format!("{pad}Project\n"));
            for e in exprs {
                out.push_str(&format!("{pad}  {}\n", fmt_expr(e)));
            }
            fmt_plan(input, indent + 1, out);
        }
        Plan::Filter { predicate, input } => {
            out.push_str(&format!("{pad}Filter {}\n", fmt_expr(predicate)));
            fmt_plan(input, indent + 1, out);
        }
        Plan::Sort { fields, input } => {
            let keys = fields
                .iter()
                .map(|f| {
                    format!(
                        "{} {}",
                        fmt_expr(&f.expr),
                        if f.ascending { "ASC" } else { "DESC" }
                    )
                })
                .collect::<Vec<_>>()
                .join(", ");
            out.push_str(&format!("{pad}Sort [{keys}]\n"));
            fmt_plan(input, indent + 1, out);
        }
        Plan::Distinct { input } => {
            out.push_str(&format!("{pad}Distinct\n"));
            fmt_plan(input, indent + 1, out);
        }
        Plan::OrderedDistinct { input } => {
            out.push_str(&format!("{pad}OrderedDistinct\n"));
            fmt_plan(input, indent + 1, out);
        }
        Plan::CrossJoin { left, right } => {
            out.push_str(&format!("{pad}CrossJoin\n"));
            out.push_str(&format!("{pad}  left:\n"));
            fmt_plan(left, indent + 2, out);
            out.push_str(&format!("{pad}  right:\n"));
            fmt_plan(right, indent + 2, out);
        }
        Plan::TableAlias { name, input } => {
            out.push_str(&format!("{pad}TableAlias name={name}\n"));
            fmt_plan(input, indent + 1, out);
        }
        Plan::SubqueryAlias { name, input } => {
            out.push_str(&format!("{pad}SubqueryAlias name={name}\n"));
            fmt_plan(input, indent + 1, out);
        }
        Plan::ShowTables { database } => {
            let db = database
                .as_ref()
                .map(|d| d.name().to_string())
                .unwrap_or_else(|| "?".to_string());
            out.push_str(&format!("{pad}ShowTables database={db}\n"));
        }
        Plan::CreateTable {
            database,
            name,
            schema,
        } => {
            let db = database
                .as_ref()
                .map(|d| d.name().to_string())
                .unwrap_or_else(|| "?".to_string());
            out.push_str(&format!(
                "{pad}CreateTable database={db} table={name} columns={}\n",
                schema.len()
            ));
        }
        Plan::PushdownProjectionTable { columns, table } => {
            out.push_str(&format!(
                "{pad}PushdownProjectionTable table={} columns=[{}]\n",
                table.name(),
                columns.join(", ")
            ));
        }
        Plan::PushdownProjectionAndFiltersTable {
            columns,
            handled_filters,
            table,
        } => {
            out.push_str(&format!(
                "{pad}PushdownProjectionAndFiltersTable table={}\n",
                table.name()
            ));
            out.push_str(&format!("{pad}  columns={}\n", columns.len()));
            for c in columns {
                out.push_str(&format!("{pad}    {}\n", fmt_expr(c)));
            }
            out.push_str(&format!("{pad}  handled_filters={}\n", handled_filters.len()));
            for f in handled_filters {
                out.push_str(&format!("{pad}    {}\n", fmt_expr(f)));
            }
        }
    }
}

/// Render an expression on one line.
pub fn fmt_expr(e: &Expr) -> String {
    match e {
        Expr::UnresolvedColumn { table: None, name } => name.clone(),
        Expr::UnresolvedColumn {
            table: Some(table),
            name,
        }
        | Expr::UnresolvedQualifiedColumn { table, name } => format!("{table}.{name}"),
        Expr::UnresolvedFunction { name, args } => format!(
            "{name}({})",
            args.iter().map(fmt_expr).collect::<Vec<_>>().join(", ")
        ),
        Expr::GetField {
            index, table, name, ..
        } => {
            if table.is_empty() {
                format!("{name}#{index}")
            } else {
                format!("{table}.{name}#{index}")
            }
        }
        Expr::Star => "*".to_string(),
        Expr::Literal(v) => fmt_literal(v),
        Expr::BinaryOp { left, op, right } => {
            format!("({}) {} ({})", fmt_expr(left), fmt_op(*op), fmt_expr(right))
        }
        Expr::And(a, b) => format!("({}) AND ({})", fmt_expr(a), fmt_expr(b)),
        Expr::Or(a, b) => format!("({}) OR ({})", fmt_expr(a), fmt_expr(b)),
        Expr::Not(x) => format!("NOT ({})", fmt_expr(x)),
        Expr::Function { func, args } => format!(
            "{}({})",
            func.name(),
            args.iter().map(fmt_expr).collect::<Vec<_>>().join(", ")
        ),
    }
}

fn fmt_literal(v: &LiteralValue) -> String {
    match v {
        LiteralValue::Int64(n) => n.to_string(),
        LiteralValue::Utf8(s) => format!("{s:?}"),
        LiteralValue::Boolean(b) => b.to_string().to_uppercase(),
        LiteralValue::Null => "NULL".to_string(),
    }
}

fn fmt_op(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Eq => "=",
        BinaryOp::NotEq => "!=",
        BinaryOp::Lt => "<",
        BinaryOp::LtEq => "<=",
        BinaryOp::Gt => ">",
        BinaryOp::GtEq => ">=",
        BinaryOp::Plus => "+",
        BinaryOp::Minus => "-",
        BinaryOp::Multiply => "*",
        BinaryOp::Divide => "/",
    }
}
