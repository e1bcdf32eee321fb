//! Storage error types.

use thiserror::Error;

/// Storage operation errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("S3 error: {0}")]
    S3(#[from] Box<dyn std::error::Error + Send + Sync>),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("batch of {count} keys exceeds the bulk-delete limit of {limit}")]
    BatchTooLarge { count: usize, limit: usize },

    #[error("bulk delete failed for {failed} of {requested} keys (first: {first_key}: {message})")]
    PartialDelete {
        requested: usize,
        failed: usize,
        first_key: String,
        message: String,
    },
}

impl StorageError {
    /// Whether retrying the same request may succeed.
    ///
    /// Transport and service errors are retryable; missing objects, invalid
    /// input and configuration problems are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StorageError::S3(_) | StorageError::Io(_) | StorageError::PartialDelete { .. }
        )
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
