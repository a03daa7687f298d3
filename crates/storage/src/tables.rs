use std::sync::Arc;

use arrow_schema::{DataType, TimeUnit};
use rq_common::Result;
use rq_planner::{
    equality_filters_over, Column, Expr, PushdownSupport, Row, RowIter, Schema, Table, Value,
};

use crate::database::{
    BLOBS_TABLE_NAME, COMMITS_TABLE_NAME, REFS_TABLE_NAME, REMOTES_TABLE_NAME,
    REPOSITORIES_TABLE_NAME, TREE_ENTRIES_TABLE_NAME,
};
use crate::repository::Repository;

fn utf8(name: &str, source: &str) -> Column {
    Column::new(name, DataType::Utf8, source, false)
}

fn timestamp(name: &str, source: &str) -> Column {
    Column::new(name, DataType::Timestamp(TimeUnit::Second, None), source, false)
}

fn rows_iter(rows: Vec<Row>) -> RowIter {
    Box::new(rows.into_iter().map(Ok))
}

/// The `refs` table: one row per reference.
///
/// The scan evaluates `name`/`hash` equality filters itself; both columns
/// are keys in the underlying reference store.
#[derive(Debug)]
pub struct RefsTable {
    schema: Schema,
    repository: Arc<Repository>,
}

impl RefsTable {
    pub(crate) fn new(repository: Arc<Repository>) -> Self {
        Self {
            schema: Schema::new(vec![
                utf8("name", REFS_TABLE_NAME),
                utf8("hash", REFS_TABLE_NAME),
            ]),
            repository,
        }
    }
}

impl Table for RefsTable {
    fn name(&self) -> &str {
        REFS_TABLE_NAME
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn scan(&self) -> Result<RowIter> {
        let rows = self
            .repository
            .refs
            .iter()
            .map(|r| vec![Value::Utf8(r.name.clone()), Value::Utf8(r.hash.clone())])
            .collect();
        Ok(rows_iter(rows))
    }

    fn pushdown(&self) -> PushdownSupport {
        PushdownSupport::ProjectionAndFilters
    }

    fn handled_filters(&self, filters: &[Expr]) -> Vec<Expr> {
        equality_filters_over(REFS_TABLE_NAME, &["name", "hash"], filters)
    }
}

/// The `commits` table: one row per commit.
///
/// Only `hash` equality is evaluated by the scan; the commit store is keyed
/// by hash and everything else requires decoding the full object.
#[derive(Debug)]
pub struct CommitsTable {
    schema: Schema,
    repository: Arc<Repository>,
}

impl CommitsTable {
    pub(crate) fn new(repository: Arc<Repository>) -> Self {
        Self {
            schema: Schema::new(vec![
                utf8("hash", COMMITS_TABLE_NAME),
                utf8("author_name", COMMITS_TABLE_NAME),
                utf8("author_email", COMMITS_TABLE_NAME),
                timestamp("author_time", COMMITS_TABLE_NAME),
                utf8("committer_name", COMMITS_TABLE_NAME),
                utf8("committer_email", COMMITS_TABLE_NAME),
                timestamp("committer_time", COMMITS_TABLE_NAME),
                utf8("message", COMMITS_TABLE_NAME),
                utf8("tree_hash", COMMITS_TABLE_NAME),
            ]),
            repository,
        }
    }
}

impl Table for CommitsTable {
    fn name(&self) -> &str {
        COMMITS_TABLE_NAME
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn scan(&self) -> Result<RowIter> {
        let rows = self
            .repository
            .commits
            .iter()
            .map(|c| {
                vec![
                    Value::Utf8(c.hash.clone()),
                    Value::Utf8(c.author_name.clone()),
                    Value::Utf8(c.author_email.clone()),
                    Value::Timestamp(c.author_time),
                    Value::Utf8(c.committer_name.clone()),
                    Value::Utf8(c.committer_email.clone()),
                    Value::Timestamp(c.committer_time),
                    Value::Utf8(c.message.clone()),
                    Value::Utf8(c.tree_hash.clone()),
                ]
            })
            .collect();
        Ok(rows_iter(rows))
    }

    fn pushdown(&self) -> PushdownSupport {
        PushdownSupport::ProjectionAndFilters
    }

    fn handled_filters(&self, filters: &[Expr]) -> Vec<Expr> {
        equality_filters_over(COMMITS_TABLE_NAME, &["hash"], filters)
    }
}

/// The `blobs` table: one row per blob object.
#[derive(Debug)]
pub struct BlobsTable {
    schema: Schema,
    repository: Arc<Repository>,
}

impl BlobsTable {
    pub(crate) fn new(repository: Arc<Repository>) -> Self {
        Self {
            schema: Schema::new(vec![
                utf8("hash", BLOBS_TABLE_NAME),
                Column::new("size", DataType::Int64, BLOBS_TABLE_NAME, false),
                Column::new("content", DataType::Binary, BLOBS_TABLE_NAME, false),
            ]),
            repository,
        }
    }
}

impl Table for BlobsTable {
    fn name(&self) -> &str {
        BLOBS_TABLE_NAME
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn scan(&self) -> Result<RowIter> {
        let rows = self
            .repository
            .blobs
            .iter()
            .map(|b| {
                vec![
                    Value::Utf8(b.hash.clone()),
                    Value::Int64(b.size),
                    Value::Binary(b.content.clone()),
                ]
            })
            .collect();
        Ok(rows_iter(rows))
    }

    fn pushdown(&self) -> PushdownSupport {
        PushdownSupport::ProjectionAndFilters
    }

    fn handled_filters(&self, filters: &[Expr]) -> Vec<Expr> {
        equality_filters_over(BLOBS_TABLE_NAME, &["hash"], filters)
    }
}

/// The `tree_entries` table: one row per entry of every tree object.
#[derive(Debug)]
pub struct TreeEntriesTable {
    schema: Schema,
    repository: Arc<Repository>,
}

impl TreeEntriesTable {
    pub(crate) fn new(repository: Arc<Repository>) -> Self {
        Self {
            schema: Schema::new(vec![
                utf8("tree_hash", TREE_ENTRIES_TABLE_NAME),
                utf8("name", TREE_ENTRIES_TABLE_NAME),
                utf8("mode", TREE_ENTRIES_TABLE_NAME),
                utf8("hash", TREE_ENTRIES_TABLE_NAME),
            ]),
            repository,
        }
    }
}

impl Table for TreeEntriesTable {
    fn name(&self) -> &str {
        TREE_ENTRIES_TABLE_NAME
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn scan(&self) -> Result<RowIter> {
        let rows = self
            .repository
            .tree_entries
            .iter()
            .map(|e| {
                vec![
                    Value::Utf8(e.tree_hash.clone()),
                    Value::Utf8(e.name.clone()),
                    Value::Utf8(e.mode.clone()),
                    Value::Utf8(e.hash.clone()),
                ]
            })
            .collect();
        Ok(rows_iter(rows))
    }

    fn pushdown(&self) -> PushdownSupport {
        PushdownSupport::ProjectionAndFilters
    }

    fn handled_filters(&self, filters: &[Expr]) -> Vec<Expr> {
        equality_filters_over(TREE_ENTRIES_TABLE_NAME, &["tree_hash", "hash"], filters)
    }
}

/// The `repositories` table: a single row describing the repository backing
/// this database. No pushdown; the table is one row wide.
#[derive(Debug)]
pub struct RepositoriesTable {
    schema: Schema,
    repository: Arc<Repository>,
}

impl RepositoriesTable {
    pub(crate) fn new(repository: Arc<Repository>) -> Self {
        Self {
            schema: Schema::new(vec![
                utf8("id", REPOSITORIES_TABLE_NAME),
                utf8("path", REPOSITORIES_TABLE_NAME),
            ]),
            repository,
        }
    }
}

impl Table for RepositoriesTable {
    fn name(&self) -> &str {
        REPOSITORIES_TABLE_NAME
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn scan(&self) -> Result<RowIter> {
        let rows = vec![vec![
            Value::Utf8(self.repository.id.clone()),
            Value::Utf8(self.repository.path.clone()),
        ]];
        Ok(rows_iter(rows))
    }
}

/// The `remotes` table: one row per configured remote. The scan can narrow
/// its output columns but evaluates no filters.
#[derive(Debug)]
pub struct RemotesTable {
    schema: Schema,
    repository: Arc<Repository>,
}

impl RemotesTable {
    pub(crate) fn new(repository: Arc<Repository>) -> Self {
        Self {
            schema: Schema::new(vec![
                utf8("name", REMOTES_TABLE_NAME),
                utf8("url", REMOTES_TABLE_NAME),
                Column::new("push_url", DataType::Utf8, REMOTES_TABLE_NAME, true),
            ]),
            repository,
        }
    }
}

impl Table for RemotesTable {
    fn name(&self) -> &str {
        REMOTES_TABLE_NAME
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn scan(&self) -> Result<RowIter> {
        let rows = self
            .repository
            .remotes
            .iter()
            .map(|r| {
                vec![
                    Value::Utf8(r.name.clone()),
                    Value::Utf8(r.url.clone()),
                    match &r.push_url {
                        Some(url) => Value::Utf8(url.clone()),
                        None => Value::Null,
                    },
                ]
            })
            .collect();
        Ok(rows_iter(rows))
    }

    fn pushdown(&self) -> PushdownSupport {
        PushdownSupport::Projection
    }
}
