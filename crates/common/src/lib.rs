#![deny(missing_docs)]

//! Shared configuration and error types for repoquery crates.
//!
//! Architecture role:
//! - defines the engine/session configuration consumed by the planner
//! - provides the common [`Error`] / [`Result`] contracts shared by the
//!   catalog, the analyzer, and the storage layer
//!
//! Key modules:
//! - [`config`]
//! - [`error`]

/// Engine/session configuration types.
pub mod config;
/// Shared error taxonomy.
pub mod error;

pub use config::EngineConfig;
pub use error::{Error, Result};
