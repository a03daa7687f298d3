use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use arrow_schema::{DataType, TimeUnit};
use rq_common::{Error, Result};

use crate::functions::{FunctionBuilder, FunctionRegistry};
use crate::logical_plan::{BinaryOp, Expr};

/// A single column descriptor: name, type, owning table, and nullability.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Column name; unique within one schema.
    pub name: String,
    /// Value type of the column.
    pub data_type: DataType,
    /// Name of the table this column originates from; empty for derived
    /// columns.
    pub source: String,
    /// Whether the column may hold nulls.
    pub nullable: bool,
}

impl Column {
    /// Create a column descriptor.
    pub fn new(name: &str, data_type: DataType, source: &str, nullable: bool) -> Self {
        Self {
            name: name.to_string(),
            data_type,
            source: source.to_string(),
            nullable,
        }
    }
}

/// An ordered sequence of column descriptors.
///
/// Column names are unique within a schema but may repeat across sibling
/// schemas; positional indices are the contract between resolved expressions
/// and the rows the evaluating operator sees.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema(Vec<Column>);

impl Schema {
    /// Create a schema from columns in declaration order.
    pub fn new(columns: Vec<Column>) -> Self {
        Self(columns)
    }

    /// Columns in declaration order.
    pub fn columns(&self) -> &[Column] {
        &self.0
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the schema has no columns.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Position of the column with the given name, if any. Match is by name
    /// only.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.0.iter().position(|c| c.name == name)
    }

    /// Column at the given position.
    pub fn column(&self, index: usize) -> Option<&Column> {
        self.0.get(index)
    }

    /// Schema formed by appending `other`'s columns after this schema's.
    pub fn concat(&self, other: &Schema) -> Schema {
        let mut columns = self.0.clone();
        columns.extend(other.0.iter().cloned());
        Schema(columns)
    }
}

/// A single value produced by a table scan.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// UTF-8 string.
    Utf8(String),
    /// 64-bit signed integer.
    Int64(i64),
    /// Boolean.
    Bool(bool),
    /// Raw bytes.
    Binary(Vec<u8>),
    /// Seconds since the unix epoch.
    Timestamp(i64),
    /// Missing value.
    Null,
}

impl Value {
    /// The arrow type this value inhabits.
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Utf8(_) => DataType::Utf8,
            Value::Int64(_) => DataType::Int64,
            Value::Bool(_) => DataType::Boolean,
            Value::Binary(_) => DataType::Binary,
            Value::Timestamp(_) => DataType::Timestamp(TimeUnit::Second, None),
            Value::Null => DataType::Null,
        }
    }
}

/// One row of scan output; values follow the table schema order.
pub type Row = Vec<Value>;

/// Streaming iterator over scan rows.
pub type RowIter = Box<dyn Iterator<Item = Result<Row>> + Send>;

/// Pushdown capability advertised by a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushdownSupport {
    /// Scan absorbs nothing; projections and filters stay above it.
    None,
    /// Scan materializes only the requested columns.
    Projection,
    /// Scan materializes the requested columns and evaluates the filters it
    /// accepts via [`Table::handled_filters`].
    ProjectionAndFilters,
}

/// A named, schema'd relation the analyzer can bind against.
pub trait Table: fmt::Debug + Send + Sync {
    /// Table name as registered in its database.
    fn name(&self) -> &str;

    /// Output schema; the `source` of every column is the table name.
    fn schema(&self) -> &Schema;

    /// Full scan over the table rows.
    fn scan(&self) -> Result<RowIter>;

    /// Which pushdown the scan opts into.
    fn pushdown(&self) -> PushdownSupport {
        PushdownSupport::None
    }

    /// Subset of `filters` the scan will evaluate itself. Only meaningful for
    /// [`PushdownSupport::ProjectionAndFilters`] tables; every returned
    /// expression must be one of the inputs, unmodified.
    fn handled_filters(&self, _filters: &[Expr]) -> Vec<Expr> {
        Vec::new()
    }
}

/// A named collection of tables.
pub trait Database: fmt::Debug + Send + Sync {
    /// Database name as registered in the catalog.
    fn name(&self) -> &str;

    /// All tables, keyed by name.
    fn tables(&self) -> &HashMap<String, Arc<dyn Table>>;
}

/// Registry mapping database names to databases and function names to
/// builders. Read-only from the analyzer's point of view.
#[derive(Debug)]
pub struct Catalog {
    databases: HashMap<String, Arc<dyn Database>>,
    functions: FunctionRegistry,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog {
    /// Create a catalog with no databases and the built-in functions
    /// registered.
    pub fn new() -> Self {
        Self {
            databases: HashMap::new(),
            functions: FunctionRegistry::with_defaults(),
        }
    }

    /// Register or replace a database under its own name.
    pub fn register_database(&mut self, database: Arc<dyn Database>) {
        self.databases
            .insert(database.name().to_string(), database);
    }

    /// Look up a database by name.
    pub fn database(&self, name: &str) -> Result<Arc<dyn Database>> {
        self.databases
            .get(name)
            .cloned()
            .ok_or_else(|| Error::DatabaseNotFound(name.to_string()))
    }

    /// Look up a table by database and name. The table name is matched
    /// case-sensitively.
    pub fn table(&self, database: &str, name: &str) -> Result<Arc<dyn Table>> {
        let database = self.database(database)?;
        database
            .tables()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::TableNotFound(name.to_string()))
    }

    /// Register or replace a function builder.
    ///
    /// Returns `true` when an existing builder with the same name was
    /// replaced.
    pub fn register_function(&mut self, name: impl Into<String>, builder: FunctionBuilder) -> bool {
        self.functions.register(name, builder)
    }

    /// Look up a function builder by name.
    pub fn function(&self, name: &str) -> Result<FunctionBuilder> {
        self.functions.get(name)
    }
}

/// Filters a scan can claim for itself: conjuncts of the form
/// `col = literal` (either operand order) where `col` belongs to `table` and
/// is one of the scan's indexed `columns`.
pub fn equality_filters_over(table: &str, columns: &[&str], filters: &[Expr]) -> Vec<Expr> {
    filters
        .iter()
        .filter(|f| is_indexed_equality(table, columns, f))
        .cloned()
        .collect()
}

fn is_indexed_equality(table: &str, columns: &[&str], expr: &Expr) -> bool {
    let Expr::BinaryOp { left, op, right } = expr else {
        return false;
    };
    if *op != BinaryOp::Eq {
        return false;
    }
    let field = match (left.as_ref(), right.as_ref()) {
        (Expr::GetField { table: t, name, .. }, Expr::Literal(_)) => Some((t, name)),
        (Expr::Literal(_), Expr::GetField { table: t, name, .. }) => Some((t, name)),
        _ => None,
    };
    match field {
        Some((t, name)) => t == table && columns.contains(&name.as_str()),
        None => false,
    }
}

// -----------------------------
// In-memory table and database
// -----------------------------

/// A simple in-memory table, mostly useful for tests and examples.
#[derive(Debug, Clone)]
pub struct MemTable {
    name: String,
    schema: Schema,
    rows: Vec<Row>,
    support: PushdownSupport,
    filter_columns: Vec<String>,
}

impl MemTable {
    /// Create a table from column descriptors; `source` of every column is
    /// set to the table name.
    pub fn new(name: &str, columns: Vec<(&str, DataType, bool)>) -> Self {
        let columns = columns
            .into_iter()
            .map(|(col, data_type, nullable)| Column::new(col, data_type, name, nullable))
            .collect();
        Self {
            name: name.to_string(),
            schema: Schema::new(columns),
            rows: Vec::new(),
            support: PushdownSupport::None,
            filter_columns: Vec::new(),
        }
    }

    /// Set the advertised pushdown capability.
    pub fn with_support(mut self, support: PushdownSupport) -> Self {
        self.support = support;
        self
    }

    /// Columns for which the scan claims `col = literal` filters.
    pub fn with_filter_columns(mut self, columns: &[&str]) -> Self {
        self.filter_columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Replace the table rows.
    pub fn with_rows(mut self, rows: Vec<Row>) -> Self {
        self.rows = rows;
        self
    }
}

impl Table for MemTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn scan(&self) -> Result<RowIter> {
        Ok(Box::new(self.rows.clone().into_iter().map(Ok)))
    }

    fn pushdown(&self) -> PushdownSupport {
        self.support
    }

    fn handled_filters(&self, filters: &[Expr]) -> Vec<Expr> {
        let columns: Vec<&str> = self.filter_columns.iter().map(String::as_str).collect();
        equality_filters_over(&self.name, &columns, filters)
    }
}

/// A simple in-memory database over [`MemTable`]s (or any other tables).
#[derive(Debug, Default)]
pub struct MemDatabase {
    name: String,
    tables: HashMap<String, Arc<dyn Table>>,
}

impl MemDatabase {
    /// Create an empty database.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            tables: HashMap::new(),
        }
    }

    /// Register a table under its own name.
    pub fn add_table(mut self, table: Arc<dyn Table>) -> Self {
        self.tables.insert(table.name().to_string(), table);
        self
    }
}

impl Database for MemDatabase {
    fn name(&self) -> &str {
        &self.name
    }

    fn tables(&self) -> &HashMap<String, Arc<dyn Table>> {
        &self.tables
    }
}
