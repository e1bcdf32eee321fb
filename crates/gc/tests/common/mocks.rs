use async_trait::async_trait;
use bytes::Bytes;
use narsweep_gc::{ClosureQuery, GcError};
use narsweep_storage::{ListingOptions, ListingPage, ObjectStore, PageStream, StorageError, StorageResult};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// In-memory object store that records every bulk-delete request.
#[allow(dead_code)]
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, Bytes>>,
    delete_requests: Mutex<Vec<Vec<String>>>,
    failing_gets: Mutex<HashSet<String>>,
    transient_delete_failures: AtomicUsize,
    pub gets: AtomicUsize,
}

#[allow(dead_code)]
impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: &str, body: impl Into<Bytes>) {
        self.objects.lock().unwrap().insert(key.to_string(), body.into());
    }

    pub fn remove(&self, key: &str) {
        self.objects.lock().unwrap().remove(key);
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    /// Keys of every bulk-delete request, in the order they were issued.
    pub fn delete_requests(&self) -> Vec<Vec<String>> {
        self.delete_requests.lock().unwrap().clone()
    }

    /// Make every `get` of `key` fail with a non-retryable error.
    pub fn fail_get(&self, key: &str) {
        self.failing_gets.lock().unwrap().insert(key.to_string());
    }

    /// Fail the next `count` bulk deletes with a transient error.
    pub fn fail_next_deletes(&self, count: usize) {
        self.transient_delete_failures.store(count, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.failing_gets.lock().unwrap().contains(key) {
            return Err(StorageError::InvalidKey(format!("injected failure: {key}")));
        }
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn delete_many(&self, keys: &[String]) -> StorageResult<()> {
        if keys.len() > narsweep_core::MAX_DELETE_BATCH {
            return Err(StorageError::BatchTooLarge {
                count: keys.len(),
                limit: narsweep_core::MAX_DELETE_BATCH,
            });
        }

        let pending = self.transient_delete_failures.load(Ordering::SeqCst);
        if pending > 0 {
            self.transient_delete_failures
                .store(pending - 1, Ordering::SeqCst);
            return Err(StorageError::Io(std::io::Error::other("slow down")));
        }

        self.delete_requests.lock().unwrap().push(keys.to_vec());
        let mut objects = self.objects.lock().unwrap();
        for key in keys {
            objects.remove(key);
        }
        Ok(())
    }

    fn list_pages<'a>(&'a self, prefix: &str, options: ListingOptions) -> PageStream<'a> {
        let prefix = prefix.to_string();
        let page_size = options.normalized_page_size();

        let keys: Vec<String> = self
            .objects
            .lock()
            .unwrap()
            .keys()
            .filter(|key| match key.strip_prefix(prefix.as_str()) {
                None => false,
                Some(rest) => match options.delimiter.as_deref() {
                    Some(delimiter) => !rest.contains(delimiter),
                    None => true,
                },
            })
            .cloned()
            .collect();

        Box::pin(async_stream::stream! {
            for chunk in keys.chunks(page_size) {
                yield Ok::<_, StorageError>(ListingPage { keys: chunk.to_vec() });
            }
        })
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

/// Closure collaborator answering from a fixed table.
///
/// Querying a path with no entry fails, like `nix-store` on an invalid path.
#[allow(dead_code)]
#[derive(Default)]
pub struct ScriptedClosure {
    closures: HashMap<PathBuf, Vec<PathBuf>>,
    calls: Mutex<Vec<PathBuf>>,
}

#[allow(dead_code)]
impl ScriptedClosure {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the closure of `path`; `path` itself is prepended.
    pub fn with(mut self, path: impl Into<PathBuf>, requisites: &[&str]) -> Self {
        let path = path.into();
        let mut closure = vec![path.clone()];
        closure.extend(requisites.iter().map(PathBuf::from));
        self.closures.insert(path, closure);
        self
    }

    pub fn calls(&self) -> Vec<PathBuf> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ClosureQuery for ScriptedClosure {
    async fn requisites(&self, store_path: &Path) -> Result<Vec<PathBuf>, GcError> {
        self.calls.lock().unwrap().push(store_path.to_path_buf());
        self.closures
            .get(store_path)
            .cloned()
            .ok_or_else(|| GcError::Closure {
                path: store_path.to_path_buf(),
                message: "path is not valid".to_string(),
            })
    }
}
