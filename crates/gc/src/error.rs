//! Garbage collection error types.

use narsweep_storage::StorageError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a garbage collection run.
///
/// Every variant is fatal: the run never deletes anything based on an
/// incomplete picture of what is live.
#[derive(Debug, Error)]
pub enum GcError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("failed to read cache info '{key}': {source}")]
    CacheInfo {
        key: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("root path does not exist: {}", .0.display())]
    RootNotFound(PathBuf),

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid store path: {0}")]
    StorePath(#[from] narsweep_core::Error),

    #[error("closure query for {} failed: {message}", path.display())]
    Closure { path: PathBuf, message: String },

    #[error("failed to fetch narinfo '{key}': {source}")]
    Fetch {
        key: String,
        #[source]
        source: StorageError,
    },

    #[error("failed to parse narinfo '{key}': {source}")]
    NarInfo {
        key: String,
        #[source]
        source: narsweep_core::Error,
    },

    #[error("fetch worker failed: {0}")]
    Worker(String),

    #[error("failed to delete items {first}-{last}/{total}: {source}")]
    Delete {
        first: usize,
        last: usize,
        total: usize,
        #[source]
        source: StorageError,
    },
}

/// Result type for garbage collection operations.
pub type Result<T> = std::result::Result<T, GcError>;
