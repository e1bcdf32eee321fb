//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid store path: {0}")]
    InvalidStorePath(String),

    #[error("narinfo parse error: {0}")]
    NarInfoParse(String),

    #[error("cache info parse error: {0}")]
    CacheInfoParse(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
