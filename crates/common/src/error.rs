use thiserror::Error;

/// Canonical repoquery error taxonomy used across crates.
///
/// Classification guidance:
/// - name-resolution kinds ([`Error::TableNotFound`],
///   [`Error::ColumnTableNotFound`], [`Error::AmbiguousColumnName`],
///   [`Error::FieldMissing`], [`Error::FunctionNotFound`],
///   [`Error::DatabaseNotFound`]) are raised by the analyzer and the catalog
///   while binding a plan; they carry the offending identifiers so callers
///   can emit actionable diagnostics
/// - [`Error::InvalidArgumentCount`] is raised by function builders and
///   passed through the analyzer verbatim
/// - [`Error::Parse`] / [`Error::Unsupported`] cover the SQL frontend
/// - [`Error::InvalidConfig`] / [`Error::Io`] cover configuration and
///   fixture loading
#[derive(Debug, Error)]
pub enum Error {
    /// The catalog has no database registered under this name.
    #[error("database not found: {0}")]
    DatabaseNotFound(String),

    /// A table reference (or a column qualifier) names an unknown table.
    ///
    /// Table lookup is case-sensitive; `Commits` does not resolve `commits`.
    #[error("table not found: {0}")]
    TableNotFound(String),

    /// A column does not exist in the named table, or an unqualified column
    /// does not exist in any table currently in scope. The table is empty in
    /// the unqualified case.
    #[error("table {table:?} does not have column {column:?}")]
    ColumnTableNotFound {
        /// Table the column was looked up in; empty when unqualified.
        table: String,
        /// Column name as written in the query.
        column: String,
    },

    /// An unqualified column name is exposed by more than one table in scope.
    #[error("ambiguous column name {column:?}, it's present in all these tables: {}", .tables.join(", "))]
    AmbiguousColumnName {
        /// Column name as written in the query.
        column: String,
        /// Every table exposing the column, in scope order.
        tables: Vec<String>,
    },

    /// Field-index fixup could not locate a column by name in the target
    /// schema.
    #[error("field {0:?} is not on schema")]
    FieldMissing(String),

    /// The catalog has no function registered under this name.
    #[error("function not found: {0}")]
    FunctionNotFound(String),

    /// A function was called with the wrong number of arguments.
    #[error("function {function:?} expects {expected} arguments, {actual} received")]
    InvalidArgumentCount {
        /// Function name as registered in the catalog.
        function: String,
        /// Human-readable expected arity, e.g. `1` or `2 or 3`.
        expected: String,
        /// Number of arguments actually supplied.
        actual: usize,
    },

    /// The SQL text could not be parsed at all.
    #[error("sql parse error: {0}")]
    Parse(String),

    /// Syntactically valid input outside the supported subset.
    ///
    /// Examples:
    /// - SQL constructs the frontend does not lower (JOIN ... ON, GROUP BY)
    /// - statements other than queries, SHOW TABLES, and CREATE TABLE
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Invalid or inconsistent configuration/fixture state.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Transparent std IO failures.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Standard repoquery result alias.
pub type Result<T> = std::result::Result<T, Error>;
