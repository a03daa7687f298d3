use std::fs;
use std::path::Path;

use rq_common::{Error, Result};
use serde::{Deserialize, Serialize};

/// A single reference (branch, tag, or HEAD) and the commit it points at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reference {
    /// Full reference name, e.g. `refs/heads/main`.
    pub name: String,
    /// Hash of the commit the reference points at.
    pub hash: String,
}

/// Commit metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commit {
    pub hash: String,
    pub author_name: String,
    pub author_email: String,
    /// Author timestamp, seconds since the unix epoch.
    pub author_time: i64,
    pub committer_name: String,
    pub committer_email: String,
    /// Committer timestamp, seconds since the unix epoch.
    pub committer_time: i64,
    pub message: String,
    /// Hash of the root tree of the commit.
    pub tree_hash: String,
}

/// Blob contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blob {
    pub hash: String,
    /// Blob size in bytes; kept explicit so fixtures may omit content.
    pub size: i64,
    #[serde(default)]
    pub content: Vec<u8>,
}

/// One entry of a tree object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeEntry {
    /// Hash of the tree holding the entry.
    pub tree_hash: String,
    /// Entry name within the tree.
    pub name: String,
    /// File mode, e.g. `100644`.
    pub mode: String,
    /// Hash of the blob or subtree the entry points at.
    pub hash: String,
}

/// A configured remote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Remote {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub push_url: Option<String>,
}

/// In-memory snapshot of one git repository.
///
/// The snapshot is immutable once constructed; tables borrow it via `Arc`
/// and iterate its collections on every scan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Repository {
    /// Repository identifier, e.g. its canonical URL.
    pub id: String,
    /// Local filesystem path of the repository.
    pub path: String,
    #[serde(default)]
    pub refs: Vec<Reference>,
    #[serde(default)]
    pub commits: Vec<Commit>,
    #[serde(default)]
    pub blobs: Vec<Blob>,
    #[serde(default)]
    pub tree_entries: Vec<TreeEntry>,
    #[serde(default)]
    pub remotes: Vec<Remote>,
}

impl Repository {
    /// Parse a snapshot from its JSON fixture form.
    pub fn from_json(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|e| Error::InvalidConfig(e.to_string()))
    }

    /// Load a snapshot from a JSON fixture file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let s = fs::read_to_string(path)?;
        Self::from_json(&s)
    }

    /// A small self-contained repository used by tests and examples.
    pub fn example() -> Self {
        Repository {
            id: "github.com/src/repoquery".to_string(),
            path: "/repos/repoquery".to_string(),
            refs: vec![
                Reference {
                    name: "HEAD".to_string(),
                    hash: "b2c3d4".to_string(),
                },
                Reference {
                    name: "refs/heads/main".to_string(),
                    hash: "b2c3d4".to_string(),
                },
                Reference {
                    name: "refs/tags/v0.1.0".to_string(),
                    hash: "a1b2c3".to_string(),
                },
            ],
            commits: vec![
                Commit {
                    hash: "a1b2c3".to_string(),
                    author_name: "Ada".to_string(),
                    author_email: "ada@example.com".to_string(),
                    author_time: 1_700_000_000,
                    committer_name: "Ada".to_string(),
                    committer_email: "ada@example.com".to_string(),
                    committer_time: 1_700_000_000,
                    message: "initial import".to_string(),
                    tree_hash: "t1".to_string(),
                },
                Commit {
                    hash: "b2c3d4".to_string(),
                    author_name: "Grace".to_string(),
                    author_email: "grace@example.com".to_string(),
                    author_time: 1_700_100_000,
                    committer_name: "Ada".to_string(),
                    committer_email: "ada@example.com".to_string(),
                    committer_time: 1_700_100_500,
                    message: "add parser".to_string(),
                    tree_hash: "t2".to_string(),
                },
            ],
            blobs: vec![
                Blob {
                    hash: "f1".to_string(),
                    size: 11,
                    content: b"hello world".to_vec(),
                },
                Blob {
                    hash: "f2".to_string(),
                    size: 4,
                    content: b"fn m".to_vec(),
                },
            ],
            tree_entries: vec![
                TreeEntry {
                    tree_hash: "t1".to_string(),
                    name: "README".to_string(),
                    mode: "100644".to_string(),
                    hash: "f1".to_string(),
                },
                TreeEntry {
                    tree_hash: "t2".to_string(),
                    name: "README".to_string(),
                    mode: "100644".to_string(),
                    hash: "f1".to_string(),
                },
                TreeEntry {
                    tree_hash: "t2".to_string(),
                    name: "main.rs".to_string(),
                    mode: "100644".to_string(),
                    hash: "f2".to_string(),
                },
            ],
            remotes: vec![Remote {
                name: "origin".to_string(),
                url: "https://github.com/src/repoquery".to_string(),
                push_url: None,
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::Repository;

    fn unique_path() -> std::path::PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock before epoch")
            .as_nanos();
        std::env::temp_dir().join(format!("rq_repository_test_{nanos}.json"))
    }

    #[test]
    fn parses_fixture_with_defaults() {
        let repo = Repository::from_json(
            r#"{
                "id": "example.com/r",
                "path": "/repos/r",
                "refs": [{"name": "HEAD", "hash": "abc"}]
            }"#,
        )
        .expect("parse fixture");
        assert_eq!(repo.refs.len(), 1);
        assert!(repo.commits.is_empty());
        assert!(repo.remotes.is_empty());
    }

    #[test]
    fn rejects_malformed_fixture() {
        let err = Repository::from_json("{\"id\": 3}").expect_err("reject");
        assert!(err.to_string().starts_with("invalid configuration"), "{err}");
    }

    #[test]
    fn loads_fixture_from_disk() {
        let path = unique_path();
        let payload = serde_json::to_string(&Repository::example()).expect("encode fixture");
        std::fs::write(&path, payload).expect("write fixture");

        let repo = Repository::load(&path).expect("load fixture");
        assert_eq!(repo.id, "github.com/src/repoquery");
        assert_eq!(repo.commits.len(), 2);

        let _ = std::fs::remove_file(path);
    }
}
