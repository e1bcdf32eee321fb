//! Catalog reading: what the cache bucket currently holds.
//!
//! Two flat namespaces are enumerated: narinfo metadata objects at the root of
//! the bucket, and NAR blobs under the blob prefix. Both listings are single
//! level; nested keys never count as catalog entries.

use crate::error::{GcError, Result};
use futures::TryStreamExt;
use narsweep_core::config::{GcConfig, RetryConfig};
use narsweep_core::{BlobRef, CacheInfo, Identifier};
use narsweep_storage::{ListingOptions, ObjectStore, ObjectStoreListStreamExt, with_retry};
use std::collections::BTreeSet;

/// Object key layout of a binary cache.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheLayout {
    pub cache_info_key: String,
    pub narinfo_suffix: String,
    pub nar_prefix: String,
}

impl Default for CacheLayout {
    fn default() -> Self {
        Self {
            cache_info_key: narsweep_core::CACHE_INFO_KEY.to_string(),
            narinfo_suffix: narsweep_core::NARINFO_SUFFIX.to_string(),
            nar_prefix: narsweep_core::NAR_PREFIX.to_string(),
        }
    }
}

impl From<&GcConfig> for CacheLayout {
    fn from(config: &GcConfig) -> Self {
        Self {
            cache_info_key: config.cache_info_key.clone(),
            narinfo_suffix: config.narinfo_suffix.clone(),
            nar_prefix: config.nar_prefix.clone(),
        }
    }
}

/// Reads the cache descriptor and both catalogs from an object store.
pub struct CatalogReader<'a> {
    store: &'a dyn ObjectStore,
    layout: &'a CacheLayout,
    retry: &'a RetryConfig,
}

impl<'a> CatalogReader<'a> {
    pub fn new(store: &'a dyn ObjectStore, layout: &'a CacheLayout, retry: &'a RetryConfig) -> Self {
        Self {
            store,
            layout,
            retry,
        }
    }

    /// Fetch and parse the cache descriptor.
    ///
    /// A missing descriptor is fatal: without `StoreDir` roots cannot be
    /// mapped to cache entries.
    pub async fn read_cache_info(&self) -> Result<CacheInfo> {
        let key = self.layout.cache_info_key.as_str();
        let body = with_retry(self.retry, "get cache info", || self.store.get(key))
            .await
            .map_err(|e| GcError::CacheInfo {
                key: key.to_string(),
                source: Box::new(e),
            })?;

        let text = std::str::from_utf8(&body).map_err(|e| GcError::CacheInfo {
            key: key.to_string(),
            source: Box::new(e),
        })?;

        let info = CacheInfo::parse(text).map_err(|e| GcError::CacheInfo {
            key: key.to_string(),
            source: Box::new(e),
        })?;

        tracing::info!(
            store_dir = %info.store_dir.display(),
            "Read cache info"
        );
        Ok(info)
    }

    /// Identifiers of every narinfo object at the root of the bucket.
    pub async fn list_catalog(&self) -> Result<BTreeSet<Identifier>> {
        let suffix = self.layout.narinfo_suffix.as_str();
        let keys = self.list_single_level("", "list narinfos").await?;

        let catalog: BTreeSet<Identifier> = keys
            .iter()
            .filter_map(|key| Identifier::from_narinfo_key(key, suffix))
            .collect();

        tracing::debug!(
            objects = keys.len(),
            narinfos = catalog.len(),
            "Listed metadata catalog"
        );
        Ok(catalog)
    }

    /// Keys of every blob directly under the blob prefix.
    pub async fn list_blob_catalog(&self) -> Result<BTreeSet<BlobRef>> {
        let prefix = self.layout.nar_prefix.as_str();
        let keys = self.list_single_level(prefix, "list nars").await?;

        let catalog: BTreeSet<BlobRef> = keys
            .into_iter()
            .filter(|key| key.len() > prefix.len())
            .map(BlobRef::new)
            .collect();

        tracing::debug!(nars = catalog.len(), "Listed blob catalog");
        Ok(catalog)
    }

    /// Collect a complete single-level listing, restarting it on transient failures.
    async fn list_single_level(&self, prefix: &str, operation: &str) -> Result<Vec<String>> {
        let keys = with_retry(self.retry, operation, || {
            self.store
                .list_stream_ext(prefix, Some(ListingOptions::default().single_level()))
                .try_collect::<Vec<String>>()
        })
        .await?;
        Ok(keys)
    }
}
