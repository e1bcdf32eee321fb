//! Object storage abstraction and backends for narsweep.
//!
//! This crate provides:
//! - The `ObjectStore` trait the garbage collector is written against
//! - Paginated listing with optional delimiter grouping
//! - Bulk deletion bounded by the S3 `DeleteObjects` limit
//! - Backends: S3-compatible and local filesystem
//! - Bounded retry with exponential backoff

pub mod backends;
pub mod error;
pub mod retry;
pub mod traits;

pub use backends::{filesystem::FilesystemBackend, s3::S3Backend};
pub use error::{StorageError, StorageResult};
pub use retry::with_retry;
pub use traits::{ListingOptions, ListingPage, ObjectStore, ObjectStoreListStreamExt, PageStream};

use narsweep_core::config::StorageConfig;
use std::sync::Arc;

/// Create an object store from configuration.
pub async fn from_config(config: &StorageConfig) -> StorageResult<Arc<dyn ObjectStore>> {
    config.validate().map_err(StorageError::Config)?;

    match config {
        StorageConfig::Filesystem { path } => {
            let backend = FilesystemBackend::new(path).await?;
            Ok(Arc::new(backend))
        }
        StorageConfig::S3 {
            bucket,
            endpoint,
            region,
            prefix,
            access_key_id,
            secret_access_key,
            force_path_style,
        } => {
            let backend = S3Backend::new(
                bucket,
                endpoint.clone(),
                region.clone(),
                prefix.clone(),
                access_key_id.clone(),
                secret_access_key.clone(),
                *force_path_style,
            )
            .await?;
            Ok(Arc::new(backend))
        }
    }
}
