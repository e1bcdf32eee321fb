//! Storage trait definitions.

use crate::error::StorageResult;
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::pin::Pin;

/// Page size constraints for listing operations.
pub const DEFAULT_PAGE_SIZE: usize = 1000;
pub const MIN_PAGE_SIZE: usize = 1;
pub const MAX_PAGE_SIZE: usize = 1000;

/// A boxed stream of listing pages.
pub type PageStream<'a> = Pin<Box<dyn Stream<Item = StorageResult<ListingPage>> + Send + 'a>>;

/// A single page of listing results.
#[derive(Clone, Debug, Default)]
pub struct ListingPage {
    /// Object keys in this page, relative to the store's prefix.
    pub keys: Vec<String>,
}

/// Options for listing operations.
#[derive(Clone, Debug)]
pub struct ListingOptions {
    /// Number of keys to fetch per page.
    ///
    /// Clamped to [MIN_PAGE_SIZE, MAX_PAGE_SIZE] by backends.
    pub page_size: usize,

    /// Group keys on this delimiter, returning only keys with no delimiter
    /// after the prefix (a single "directory" level).
    pub delimiter: Option<String>,
}

impl ListingOptions {
    /// Create new listing options with the given page size and no delimiter.
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size,
            delimiter: None,
        }
    }

    /// List a single level below the prefix, like `Delimiter=/` on S3.
    pub fn single_level(mut self) -> Self {
        self.delimiter = Some("/".to_string());
        self
    }

    /// Get the normalized page size.
    pub fn normalized_page_size(&self) -> usize {
        self.page_size.clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE)
    }
}

impl Default for ListingOptions {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

/// Object store abstraction over a binary cache bucket.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Get an object's content.
    async fn get(&self, key: &str) -> StorageResult<Bytes>;

    /// Delete up to [`MAX_DELETE_BATCH`](narsweep_core::MAX_DELETE_BATCH) objects
    /// in a single request.
    ///
    /// Keys that do not exist are not an error. Backends report per-key failures
    /// as [`StorageError::PartialDelete`](crate::StorageError::PartialDelete).
    async fn delete_many(&self, keys: &[String]) -> StorageResult<()>;

    /// List objects with a prefix, returning a stream of pages.
    ///
    /// The stream is lazy: each page is fetched when polled.
    fn list_pages<'a>(&'a self, prefix: &str, options: ListingOptions) -> PageStream<'a>;

    /// Get the name of this storage backend (e.g., "s3", "filesystem").
    fn backend_name(&self) -> &'static str;

    /// Verify storage backend connectivity.
    ///
    /// The default implementation returns Ok(()).
    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// Extension trait providing a flat key stream on top of [`ObjectStore::list_pages`].
///
/// Implemented for every `ObjectStore` through a blanket implementation.
pub trait ObjectStoreListStreamExt: ObjectStore {
    /// List objects with a prefix, returning a flat stream of keys.
    fn list_stream_ext<'a>(
        &'a self,
        prefix: &str,
        options: Option<ListingOptions>,
    ) -> Pin<Box<dyn Stream<Item = StorageResult<String>> + Send + 'a>> {
        let options = options.unwrap_or_default();
        let page_stream = self.list_pages(prefix, options);

        let key_stream = page_stream.flat_map(|page_result| match page_result {
            Ok(page) => futures::stream::iter(page.keys.into_iter().map(Ok)).boxed(),
            Err(e) => futures::stream::once(async move { Err(e) }).boxed(),
        });

        Box::pin(key_stream)
    }
}

impl<T: ObjectStore + ?Sized> ObjectStoreListStreamExt for T {}

/// Whether `key` lies exactly one level below `prefix` for the given delimiter.
pub(crate) fn is_single_level(key: &str, prefix: &str, delimiter: Option<&str>) -> bool {
    match delimiter {
        None => true,
        Some(delimiter) => key
            .strip_prefix(prefix)
            .is_some_and(|rest| !rest.contains(delimiter)),
    }
}
