//! Crate-wide error taxonomy.
//!
//! Matches the error kinds each component can raise so callers that need to
//! branch on failure kind (the CLI orchestrator, tests) don't have to string-match
//! an `anyhow::Error`. The binary's top-level `main` still collapses everything to
//! `anyhow::Result` before printing and setting the exit code.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HygieneError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("index storage unavailable at {path}: {source}")]
    StorageUnavailable {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("no target resolves to a directory: {0:?}")]
    InvalidTarget(Vec<PathBuf>),

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("path not found in index: {0}")]
    NotFound(PathBuf),

    #[error("path already present in index: {0}")]
    Conflict(PathBuf),

    #[error("index write failed: {0}")]
    IndexWrite(#[from] rusqlite::Error),

    #[error("filesystem error moving {path}: {source}")]
    ActionFilesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, HygieneError>;
