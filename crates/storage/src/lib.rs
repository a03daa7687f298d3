//! Read-only git repository tables for repoquery.
//!
//! Architecture role:
//! - in-memory snapshot model of one git repository
//! - the six fixed tables (`refs`, `commits`, `blobs`, `tree_entries`,
//!   `repositories`, `remotes`) implementing the planner's `Table` contract,
//!   including their pushdown capabilities
//! - the `Database` implementation wiring the tables together
//!
//! Key modules:
//! - [`repository`]
//! - [`tables`]
//! - [`database`]

pub mod database;
pub mod repository;
pub mod tables;

pub use database::*;
pub use repository::*;
pub use tables::*;
