use std::sync::Arc;

use arrow_schema::DataType;
use rq_common::Result;

use crate::catalog::{Column, Database, Schema, Table};
use crate::explain::fmt_expr;
use crate::functions::Func;

/// Literal values usable in expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    /// 64-bit signed integer.
    Int64(i64),
    /// UTF-8 string.
    Utf8(String),
    /// Boolean.
    Boolean(bool),
    /// SQL NULL.
    Null,
}

impl LiteralValue {
    /// The arrow type this literal inhabits.
    pub fn data_type(&self) -> DataType {
        match self {
            LiteralValue::Int64(_) => DataType::Int64,
            LiteralValue::Utf8(_) => DataType::Utf8,
            LiteralValue::Boolean(_) => DataType::Boolean,
            LiteralValue::Null => DataType::Null,
        }
    }
}

/// Binary operators: comparisons and arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `=`
    Eq,
    /// `!=`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    LtEq,
    /// `>`
    Gt,
    /// `>=`
    GtEq,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Multiply,
    /// `/`
    Divide,
}

impl BinaryOp {
    /// Whether the operator produces a boolean.
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::NotEq
                | BinaryOp::Lt
                | BinaryOp::LtEq
                | BinaryOp::Gt
                | BinaryOp::GtEq
        )
    }
}

/// One `Sort` key.
#[derive(Debug, Clone, PartialEq)]
pub struct SortField {
    /// Expression to order by.
    pub expr: Expr,
    /// `true` for ascending order.
    pub ascending: bool,
}

/// Expression tree.
///
/// A closed set of variants; analyzer rules pattern-match and leave variants
/// they do not know about unchanged. An expression is resolved once every
/// sub-expression is bound (see [`Expr::resolved`]).
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Column reference not yet bound; `table` is `None` for bare references.
    UnresolvedColumn {
        /// Optional table qualifier as written in the query.
        table: Option<String>,
        /// Column name as written in the query.
        name: String,
    },
    /// Column qualified with its table by `qualify_columns` but not yet bound
    /// to a field index.
    UnresolvedQualifiedColumn {
        /// Real (alias-expanded) table name.
        table: String,
        /// Column name.
        name: String,
    },
    /// Function call not yet bound to a catalog implementation.
    UnresolvedFunction {
        /// Function name as written in the query.
        name: String,
        /// Argument expressions.
        args: Vec<Expr>,
    },
    /// Positional, typed accessor into the row the evaluating node sees.
    GetField {
        /// Index into the schema of the node directly beneath the evaluator.
        index: usize,
        /// Column type.
        data_type: DataType,
        /// Owning table name; empty for derived columns.
        table: String,
        /// Column name.
        name: String,
        /// Whether the column may hold nulls.
        nullable: bool,
    },
    /// `*` projection placeholder.
    Star,
    /// Constant value.
    Literal(LiteralValue),
    /// Comparison or arithmetic over two operands.
    BinaryOp {
        /// Left operand.
        left: Box<Expr>,
        /// Operator.
        op: BinaryOp,
        /// Right operand.
        right: Box<Expr>,
    },
    /// Logical conjunction.
    And(Box<Expr>, Box<Expr>),
    /// Logical disjunction.
    Or(Box<Expr>, Box<Expr>),
    /// Logical negation.
    Not(Box<Expr>),
    /// Scalar function call bound by the catalog.
    Function {
        /// Bound function.
        func: Func,
        /// Argument expressions.
        args: Vec<Expr>,
    },
}

impl Expr {
    /// Whether every sub-expression is bound.
    pub fn resolved(&self) -> bool {
        match self {
            Expr::UnresolvedColumn { .. }
            | Expr::UnresolvedQualifiedColumn { .. }
            | Expr::UnresolvedFunction { .. }
            | Expr::Star => false,
            Expr::GetField { .. } | Expr::Literal(_) => true,
            _ => self.children().iter().all(|e| e.resolved()),
        }
    }

    /// Direct sub-expressions.
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::BinaryOp { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            Expr::And(a, b) | Expr::Or(a, b) => vec![a.as_ref(), b.as_ref()],
            Expr::Not(e) => vec![e.as_ref()],
            Expr::Function { args, .. } | Expr::UnresolvedFunction { args, .. } => {
                args.iter().collect()
            }
            _ => Vec::new(),
        }
    }

    /// Rebuild the expression bottom-up: sub-expressions are rewritten first,
    /// then `f` is applied to the rebuilt expression. Aborts on the first
    /// error. Callers must not rely on identity of unchanged expressions.
    pub fn transform_up<F>(self, f: &mut F) -> Result<Expr>
    where
        F: FnMut(Expr) -> Result<Expr>,
    {
        let rebuilt = match self {
            Expr::BinaryOp { left, op, right } => Expr::BinaryOp {
                left: Box::new(left.transform_up(f)?),
                op,
                right: Box::new(right.transform_up(f)?),
            },
            Expr::And(a, b) => Expr::And(
                Box::new(a.transform_up(f)?),
                Box::new(b.transform_up(f)?),
            ),
            Expr::Or(a, b) => Expr::Or(
                Box::new(a.transform_up(f)?),
                Box::new(b.transform_up(f)?),
            ),
            Expr::Not(e) => Expr::Not(Box::new(e.transform_up(f)?)),
            Expr::Function { func, args } => Expr::Function {
                func,
                args: args
                    .into_iter()
                    .map(|a| a.transform_up(f))
                    .collect::<Result<Vec<_>>>()?,
            },
            Expr::UnresolvedFunction { name, args } => Expr::UnresolvedFunction {
                name,
                args: args
                    .into_iter()
                    .map(|a| a.transform_up(f))
                    .collect::<Result<Vec<_>>>()?,
            },
            leaf => leaf,
        };
        f(rebuilt)
    }

    /// Display name used when the expression becomes a projected column.
    pub fn name(&self) -> String {
        match self {
            Expr::UnresolvedColumn { name, .. }
            | Expr::UnresolvedQualifiedColumn { name, .. }
            | Expr::GetField { name, .. } => name.clone(),
            other => fmt_expr(other),
        }
    }

    /// Value type the expression evaluates to; `Null` while unresolved.
    pub fn data_type(&self) -> DataType {
        match self {
            Expr::GetField { data_type, .. } => data_type.clone(),
            Expr::Literal(v) => v.data_type(),
            Expr::BinaryOp { left, op, .. } => {
                if op.is_comparison() {
                    DataType::Boolean
                } else {
                    left.data_type()
                }
            }
            Expr::And(..) | Expr::Or(..) | Expr::Not(_) => DataType::Boolean,
            Expr::Function { func, .. } => func.return_type(),
            _ => DataType::Null,
        }
    }

    /// Whether the expression may evaluate to null.
    pub fn nullable(&self) -> bool {
        match self {
            Expr::GetField { nullable, .. } => *nullable,
            Expr::Literal(v) => matches!(v, LiteralValue::Null),
            _ => self.children().iter().any(|e| e.nullable()),
        }
    }

    /// Owning table of the expression when it is a direct field access;
    /// empty otherwise.
    pub fn source(&self) -> &str {
        match self {
            Expr::GetField { table, .. } => table,
            _ => "",
        }
    }

    /// Column descriptor this expression contributes to its node's schema.
    pub fn column(&self) -> Column {
        Column {
            name: self.name(),
            data_type: self.data_type(),
            source: self.source().to_string(),
            nullable: self.nullable(),
        }
    }
}

/// Flatten the top-level `And` chain of a predicate into its conjuncts.
pub fn split_conjuncts(expr: &Expr) -> Vec<Expr> {
    match expr {
        Expr::And(a, b) => {
            let mut out = split_conjuncts(a);
            out.extend(split_conjuncts(b));
            out
        }
        other => vec![other.clone()],
    }
}

/// Rebuild a predicate from conjuncts, left-associated over `And`. `None`
/// when the list is empty.
pub fn join_and(conjuncts: Vec<Expr>) -> Option<Expr> {
    conjuncts
        .into_iter()
        .reduce(|acc, e| Expr::And(Box::new(acc), Box::new(e)))
}

/// Relational operator tree.
///
/// A closed set of variants. Within one analyzer pass trees are treated as
/// immutable values: rules consume a plan and produce a new one. A plan is
/// resolved once every descendant node and expression is resolved (see
/// [`Plan::resolved`]).
#[derive(Debug, Clone)]
pub enum Plan {
    /// Table reference not yet bound to the catalog.
    UnresolvedTable {
        /// Table name as written in the query.
        name: String,
    },
    /// Catalog-bound scan.
    ResolvedTable {
        /// The bound table.
        table: Arc<dyn Table>,
    },
    /// Expression projection over a child.
    Project {
        /// Projected expressions, in output order.
        exprs: Vec<Expr>,
        /// Input node.
        input: Box<Plan>,
    },
    /// Predicate filter over a child.
    Filter {
        /// Boolean predicate.
        predicate: Expr,
        /// Input node.
        input: Box<Plan>,
    },
    /// Ordering over a child.
    Sort {
        /// Sort keys, most significant first.
        fields: Vec<SortField>,
        /// Input node.
        input: Box<Plan>,
    },
    /// Duplicate elimination over an arbitrary child.
    Distinct {
        /// Input node.
        input: Box<Plan>,
    },
    /// Duplicate elimination valid over sorted input; cheaper than
    /// [`Plan::Distinct`] because only adjacent rows are compared.
    OrderedDistinct {
        /// Input node.
        input: Box<Plan>,
    },
    /// Cartesian product of two children; the output row is the left row
    /// followed by the right row.
    CrossJoin {
        /// Left input.
        left: Box<Plan>,
        /// Right input.
        right: Box<Plan>,
    },
    /// A renamed table.
    TableAlias {
        /// Alias name.
        name: String,
        /// Input node.
        input: Box<Plan>,
    },
    /// A named subquery in a `FROM` clause.
    SubqueryAlias {
        /// Alias name.
        name: String,
        /// Subquery plan.
        input: Box<Plan>,
    },
    /// Schema introspection: list the tables of the current database.
    ShowTables {
        /// Filled in by `resolve_database`.
        database: Option<Arc<dyn Database>>,
    },
    /// Table definition statement; analysis-only (no mutation happens here).
    CreateTable {
        /// Filled in by `resolve_database`.
        database: Option<Arc<dyn Database>>,
        /// Name of the table to create.
        name: String,
        /// Declared schema.
        schema: Schema,
    },
    /// Scan wrapper materializing only the named columns.
    PushdownProjectionTable {
        /// Column names the query uses, in first-use order.
        columns: Vec<String>,
        /// The wrapped scan.
        table: Arc<dyn Table>,
    },
    /// Scan wrapper materializing projected fields and evaluating the
    /// filters the scan accepted, both re-indexed against the scan's own
    /// schema.
    PushdownProjectionAndFiltersTable {
        /// Field accessors the query uses, in first-use order.
        columns: Vec<Expr>,
        /// Conjuncts the scan evaluates itself.
        handled_filters: Vec<Expr>,
        /// The wrapped scan.
        table: Arc<dyn Table>,
    },
}

impl Plan {
    /// Direct child nodes.
    pub fn children(&self) -> Vec<&Plan> {
        match self {
            Plan::Project { input, .. }
            | Plan::Filter { input, .. }
            | Plan::Sort { input, .. }
            | Plan::Distinct { input }
            | Plan::OrderedDistinct { input }
            | Plan::TableAlias { input, .. }
            | Plan::SubqueryAlias { input, .. } => vec![input.as_ref()],
            Plan::CrossJoin { left, right } => vec![left.as_ref(), right.as_ref()],
            _ => Vec::new(),
        }
    }

    /// Expressions held directly by this node (children excluded).
    pub fn expressions(&self) -> Vec<&Expr> {
        match self {
            Plan::Project { exprs, .. } => exprs.iter().collect(),
            Plan::Filter { predicate, .. } => vec![predicate],
            Plan::Sort { fields, .. } => fields.iter().map(|f| &f.expr).collect(),
            _ => Vec::new(),
        }
    }

    /// Ordered column descriptors of this node's output.
    pub fn schema(&self) -> Schema {
        match self {
            Plan::UnresolvedTable { .. } | Plan::CreateTable { .. } => Schema::default(),
            Plan::ResolvedTable { table }
            | Plan::PushdownProjectionTable { table, .. }
            | Plan::PushdownProjectionAndFiltersTable { table, .. } => table.schema().clone(),
            Plan::Project { exprs, .. } => {
                Schema::new(exprs.iter().map(Expr::column).collect())
            }
            Plan::Filter { input, .. }
            | Plan::Sort { input, .. }
            | Plan::Distinct { input }
            | Plan::OrderedDistinct { input }
            | Plan::TableAlias { input, .. }
            | Plan::SubqueryAlias { input, .. } => input.schema(),
            Plan::CrossJoin { left, right } => left.schema().concat(&right.schema()),
            Plan::ShowTables { .. } => Schema::new(vec![Column::new(
                "table",
                DataType::Utf8,
                "",
                false,
            )]),
        }
    }

    /// Whether every descendant node and expression is resolved.
    pub fn resolved(&self) -> bool {
        match self {
            Plan::UnresolvedTable { .. } => false,
            Plan::ResolvedTable { .. }
            | Plan::PushdownProjectionTable { .. }
            | Plan::PushdownProjectionAndFiltersTable { .. } => true,
            Plan::ShowTables { database } => database.is_some(),
            Plan::CreateTable { database, .. } => database.is_some(),
            _ => {
                self.expressions().iter().all(|e| e.resolved())
                    && self.children().iter().all(|c| c.resolved())
            }
        }
    }

    /// Rebuild the tree bottom-up: children are rewritten first, a new node
    /// is constructed from the rewritten children, then `f` is applied to
    /// that node. Aborts on the first error. Callers must not rely on
    /// identity of unchanged nodes.
    pub fn transform_up<F>(self, f: &mut F) -> Result<Plan>
    where
        F: FnMut(Plan) -> Result<Plan>,
    {
        let rebuilt = match self {
            Plan::Project { exprs, input } => Plan::Project {
                exprs,
                input: Box::new(input.transform_up(f)?),
            },
            Plan::Filter { predicate, input } => Plan::Filter {
                predicate,
                input: Box::new(input.transform_up(f)?),
            },
            Plan::Sort { fields, input } => Plan::Sort {
                fields,
                input: Box::new(input.transform_up(f)?),
            },
            Plan::Distinct { input } => Plan::Distinct {
                input: Box::new(input.transform_up(f)?),
            },
            Plan::OrderedDistinct { input } => Plan::OrderedDistinct {
                input: Box::new(input.transform_up(f)?),
            },
            Plan::TableAlias { name, input } => Plan::TableAlias {
                name,
                input: Box::new(input.transform_up(f)?),
            },
            Plan::SubqueryAlias { name, input } => Plan::SubqueryAlias {
                name,
                input: Box::new(input.transform_up(f)?),
            },
            Plan::CrossJoin { left, right } => Plan::CrossJoin {
                left: Box::new(left.transform_up(f)?),
                right: Box::new(right.transform_up(f)?),
            },
            leaf => leaf,
        };
        f(rebuilt)
    }

    /// Rebuild this node with every expression it holds rewritten bottom-up
    /// by `f`. Children nodes are untouched; whole-tree expression sweeps
    /// compose this with [`Plan::transform_up`].
    pub fn transform_expressions_up<F>(self, f: &mut F) -> Result<Plan>
    where
        F: FnMut(Expr) -> Result<Expr>,
    {
        match self {
            Plan::Project { exprs, input } => Ok(Plan::Project {
                exprs: exprs
                    .into_iter()
                    .map(|e| e.transform_up(f))
                    .collect::<Result<Vec<_>>>()?,
                input,
            }),
            Plan::Filter { predicate, input } => Ok(Plan::Filter {
                predicate: predicate.transform_up(f)?,
                input,
            }),
            Plan::Sort { fields, input } => Ok(Plan::Sort {
                fields: fields
                    .into_iter()
                    .map(|field| {
                        Ok(SortField {
                            expr: field.expr.transform_up(f)?,
                            ascending: field.ascending,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?,
                input,
            }),
            other => Ok(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use arrow_schema::DataType;

    use super::{join_and, split_conjuncts, Expr, Plan, SortField};
    use crate::catalog::{MemTable, PushdownSupport, Table};

    fn table(name: &str) -> Plan {
        Plan::ResolvedTable {
            table: std::sync::Arc::new(MemTable::new(
                name,
                vec![("a", DataType::Int64, false), ("b", DataType::Utf8, false)],
            )),
        }
    }

    fn col(name: &str) -> Expr {
        Expr::UnresolvedColumn {
            table: None,
            name: name.to_string(),
        }
    }

    #[test]
    fn transform_up_visits_children_before_parents() {
        let plan = Plan::Filter {
            predicate: col("a"),
            input: Box::new(Plan::Distinct {
                input: Box::new(table("t")),
            }),
        };

        let mut visited = Vec::new();
        plan.transform_up(&mut |node| {
            visited.push(match &node {
                Plan::Filter { .. } => "filter",
                Plan::Distinct { .. } => "distinct",
                Plan::ResolvedTable { .. } => "table",
                _ => "other",
            });
            Ok(node)
        })
        .expect("transform");
        assert_eq!(visited, vec!["table", "distinct", "filter"]);
    }

    #[test]
    fn transform_up_aborts_on_error() {
        let plan = Plan::Distinct {
            input: Box::new(table("t")),
        };
        let err = plan
            .transform_up(&mut |node| match node {
                Plan::ResolvedTable { .. } => {
                    Err(rq_common::Error::Unsupported("boom".to_string()))
                }
                other => Ok(other),
            })
            .expect_err("propagates error");
        assert!(err.to_string().contains("boom"), "{err}");
    }

    #[test]
    fn expression_transform_is_bottom_up() {
        let expr = Expr::And(
            Box::new(col("a")),
            Box::new(Expr::Not(Box::new(col("b")))),
        );
        let mut order = Vec::new();
        expr.transform_up(&mut |e| {
            order.push(match &e {
                Expr::UnresolvedColumn { name, .. } => name.clone(),
                Expr::Not(_) => "not".to_string(),
                Expr::And(..) => "and".to_string(),
                _ => "other".to_string(),
            });
            Ok(e)
        })
        .expect("transform");
        assert_eq!(order, vec!["a", "b", "not", "and"]);
    }

    #[test]
    fn transform_expressions_leaves_children_untouched() {
        let inner = Plan::Filter {
            predicate: col("a"),
            input: Box::new(table("t")),
        };
        let plan = Plan::Sort {
            fields: vec![SortField {
                expr: col("b"),
                ascending: true,
            }],
            input: Box::new(inner),
        };
        let mut seen = 0;
        let plan = plan
            .transform_expressions_up(&mut |e| {
                seen += 1;
                Ok(e)
            })
            .expect("transform");
        // only the sort key was visited, not the child filter predicate
        assert_eq!(seen, 1);
        match plan {
            Plan::Sort { input, .. } => match *input {
                Plan::Filter { predicate, .. } => assert_eq!(predicate, col("a")),
                other => panic!("expected filter child, got {other:?}"),
            },
            other => panic!("expected sort, got {other:?}"),
        }
    }

    #[test]
    fn cross_join_schema_concatenates_children() {
        let plan = Plan::CrossJoin {
            left: Box::new(table("l")),
            right: Box::new(table("r")),
        };
        let schema = plan.schema();
        assert_eq!(schema.len(), 4);
        assert_eq!(schema.columns()[0].source, "l");
        assert_eq!(schema.columns()[2].source, "r");
        assert_eq!(schema.columns()[2].name, "a");
    }

    #[test]
    fn resolved_requires_all_descendants() {
        let unresolved = Plan::Filter {
            predicate: col("a"),
            input: Box::new(table("t")),
        };
        assert!(!unresolved.resolved());

        let resolved = Plan::Filter {
            predicate: Expr::GetField {
                index: 0,
                data_type: DataType::Int64,
                table: "t".to_string(),
                name: "a".to_string(),
                nullable: false,
            },
            input: Box::new(table("t")),
        };
        assert!(resolved.resolved());

        let deep_unresolved = Plan::Distinct {
            input: Box::new(Plan::UnresolvedTable {
                name: "t".to_string(),
            }),
        };
        assert!(!deep_unresolved.resolved());
    }

    #[test]
    fn pushdown_wrapper_keeps_table_schema() {
        let mem = std::sync::Arc::new(
            MemTable::new(
                "t",
                vec![("a", DataType::Int64, false), ("b", DataType::Utf8, false)],
            )
            .with_support(PushdownSupport::Projection),
        );
        let plan = Plan::PushdownProjectionTable {
            columns: vec!["b".to_string()],
            table: std::sync::Arc::clone(&mem) as std::sync::Arc<dyn Table>,
        };
        assert_eq!(plan.schema(), mem.schema().clone());
        assert!(plan.resolved());
    }

    #[test]
    fn conjunct_split_and_join_round_trip() {
        let a = col("a");
        let b = col("b");
        let c = col("c");
        let pred = Expr::And(
            Box::new(Expr::And(Box::new(a.clone()), Box::new(b.clone()))),
            Box::new(c.clone()),
        );
        let conjuncts = split_conjuncts(&pred);
        assert_eq!(conjuncts, vec![a, b, c]);
        assert_eq!(join_and(conjuncts), Some(pred));
        assert_eq!(join_and(Vec::new()), None);
    }
}
