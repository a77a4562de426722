//! ---
//! sh_section: "02-persistence-logging"
//! sh_subsection: "module"
//! sh_type: "source"
//! sh_scope: "code"
//! sh_description: "Execution history persistence."
//! sh_version: "v0.1.0"
//! sh_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! Durable record of every batch execution, kept as a single JSON array.

use std::path::PathBuf;

/// Result alias used throughout the history crate.
pub type Result<T> = std::result::Result<T, HistoryError>;

/// Error type for history store reads and writes.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    /// Wrapper for IO errors encountered while reading/writing the store.
    #[error("io error on {}: {source}", .path.display())]
    Io {
        /// File or directory being accessed.
        path: PathBuf,
        /// Underlying failure.
        #[source]
        source: std::io::Error,
    },
    /// The store document exists but is not a valid execution array.
    #[error("history document {} is malformed: {source}", .path.display())]
    Json {
        /// Path of the store document.
        path: PathBuf,
        /// Underlying failure.
        #[source]
        source: serde_json::Error,
    },
}

pub mod store;

pub use store::{ExecutionPatch, HistoryStore};
