use std::collections::HashMap;
use std::sync::Arc;

use rq_planner::{Database, Table};

use crate::repository::Repository;
use crate::tables::{
    BlobsTable, CommitsTable, RefsTable, RemotesTable, RepositoriesTable, TreeEntriesTable,
};

/// Name of the refs table.
pub const REFS_TABLE_NAME: &str = "refs";
/// Name of the commits table.
pub const COMMITS_TABLE_NAME: &str = "commits";
/// Name of the blobs table.
pub const BLOBS_TABLE_NAME: &str = "blobs";
/// Name of the tree entries table.
pub const TREE_ENTRIES_TABLE_NAME: &str = "tree_entries";
/// Name of the repositories table.
pub const REPOSITORIES_TABLE_NAME: &str = "repositories";
/// Name of the remotes table.
pub const REMOTES_TABLE_NAME: &str = "remotes";

/// All git repository tables under one database name.
#[derive(Debug)]
pub struct GitDatabase {
    name: String,
    tables: HashMap<String, Arc<dyn Table>>,
}

impl GitDatabase {
    /// Create a database over the given repository snapshot, initializing
    /// every table with it.
    pub fn new(name: impl Into<String>, repository: Arc<Repository>) -> Self {
        let mut tables: HashMap<String, Arc<dyn Table>> = HashMap::new();
        tables.insert(
            REFS_TABLE_NAME.to_string(),
            Arc::new(RefsTable::new(Arc::clone(&repository))),
        );
        tables.insert(
            COMMITS_TABLE_NAME.to_string(),
            Arc::new(CommitsTable::new(Arc::clone(&repository))),
        );
        tables.insert(
            BLOBS_TABLE_NAME.to_string(),
            Arc::new(BlobsTable::new(Arc::clone(&repository))),
        );
        tables.insert(
            TREE_ENTRIES_TABLE_NAME.to_string(),
            Arc::new(TreeEntriesTable::new(Arc::clone(&repository))),
        );
        tables.insert(
            REPOSITORIES_TABLE_NAME.to_string(),
            Arc::new(RepositoriesTable::new(Arc::clone(&repository))),
        );
        tables.insert(
            REMOTES_TABLE_NAME.to_string(),
            Arc::new(RemotesTable::new(repository)),
        );
        Self {
            name: name.into(),
            tables,
        }
    }
}

impl Database for GitDatabase {
    fn name(&self) -> &str {
        &self.name
    }

    fn tables(&self) -> &HashMap<String, Arc<dyn Table>> {
        &self.tables
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rq_planner::Database;

    use super::*;
    use crate::repository::Repository;

    #[test]
    fn database_exposes_the_six_tables() {
        let db = GitDatabase::new("repo", Arc::new(Repository::example()));
        assert_eq!(db.name(), "repo");
        let mut names: Vec<&str> = db.tables().keys().map(String::as_str).collect();
        names.sort_unstable();
        assert_eq!(
            names,
            vec![
                BLOBS_TABLE_NAME,
                COMMITS_TABLE_NAME,
                REFS_TABLE_NAME,
                REMOTES_TABLE_NAME,
                REPOSITORIES_TABLE_NAME,
                TREE_ENTRIES_TABLE_NAME,
            ]
        );
    }

    #[test]
    fn table_schemas_carry_their_source() {
        let db = GitDatabase::new("repo", Arc::new(Repository::example()));
        for (name, table) in db.tables() {
            for col in table.schema().columns() {
                assert_eq!(&col.source, name, "column {} of {}", col.name, name);
            }
        }
    }
}
