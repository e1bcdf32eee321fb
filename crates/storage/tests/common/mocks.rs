use async_trait::async_trait;
use bytes::Bytes;
use narsweep_storage::{ListingOptions, ListingPage, ObjectStore, PageStream, StorageError, StorageResult};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::time::Duration;

/// Synthetic narinfo listing that counts the pages it serves.
///
/// Keys are `h00000.narinfo`, `h00001.narinfo`, ... generated on the fly.
/// Optionally fails once, with a transient error, when asked for a given page.
#[allow(dead_code)]
pub struct InstrumentedBackend {
    pub total_keys: usize,
    pub pages_fetched: Arc<AtomicUsize>,
    pub listings_started: AtomicUsize,
    fail_once_at_page: Option<usize>,
    failed: AtomicBool,
}

#[allow(dead_code)]
impl InstrumentedBackend {
    pub fn new(total_keys: usize) -> (Arc<Self>, Arc<AtomicUsize>) {
        Self::build(total_keys, None)
    }

    /// Fail the first time page number `page` (0-based) is requested.
    pub fn flaky(total_keys: usize, page: usize) -> (Arc<Self>, Arc<AtomicUsize>) {
        Self::build(total_keys, Some(page))
    }

    fn build(total_keys: usize, fail_once_at_page: Option<usize>) -> (Arc<Self>, Arc<AtomicUsize>) {
        let counter = Arc::new(AtomicUsize::new(0));
        let backend = Arc::new(Self {
            total_keys,
            pages_fetched: counter.clone(),
            listings_started: AtomicUsize::new(0),
            fail_once_at_page,
            failed: AtomicBool::new(false),
        });
        (backend, counter)
    }

    pub fn key(i: usize) -> String {
        format!("h{i:05}.narinfo")
    }
}

#[async_trait]
impl ObjectStore for InstrumentedBackend {
    async fn get(&self, _key: &str) -> StorageResult<Bytes> {
        Err(StorageError::NotFound("instrumented backend".to_string()))
    }

    async fn delete_many(&self, _keys: &[String]) -> StorageResult<()> {
        Err(StorageError::InvalidKey(
            "instrumented backend is read-only".to_string(),
        ))
    }

    fn list_pages<'a>(&'a self, prefix: &str, options: ListingOptions) -> PageStream<'a> {
        let page_size = options.normalized_page_size();
        let prefix = prefix.to_string();
        let pages_counter = self.pages_fetched.clone();
        self.listings_started.fetch_add(1, Ordering::SeqCst);

        Box::pin(async_stream::try_stream! {
            let mut index = 0;
            let mut page = 0;
            while index < self.total_keys {
                pages_counter.fetch_add(1, Ordering::SeqCst);

                if self.fail_once_at_page == Some(page) && !self.failed.swap(true, Ordering::SeqCst) {
                    Err::<(), _>(StorageError::Io(std::io::Error::other("connection reset")))?;
                }

                let end = (index + page_size).min(self.total_keys);
                let keys: Vec<String> = (index..end)
                    .map(Self::key)
                    .filter(|key| key.starts_with(&prefix))
                    .collect();

                yield ListingPage { keys };

                index = end;
                page += 1;

                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
    }

    fn backend_name(&self) -> &'static str {
        "instrumented"
    }
}
