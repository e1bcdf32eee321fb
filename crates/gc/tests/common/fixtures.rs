use super::mocks::MemoryStore;
use narsweep_core::config::{GcConfig, RetryConfig};
use narsweep_gc::{ClosureQuery, GarbageCollector};
use narsweep_storage::ObjectStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Body of a minimal narinfo pointing at `url`.
#[allow(dead_code)]
pub fn narinfo_body(id: &str, url: &str) -> String {
    format!(
        "StorePath: /nix/store/{id}-pkg\nURL: {url}\nCompression: xz\nFileSize: 4\nNarSize: 8\n"
    )
}

/// An in-memory cache whose `nix-cache-info` names a store directory on disk.
#[allow(dead_code)]
pub struct CacheFixture {
    pub store: Arc<MemoryStore>,
    pub store_dir: PathBuf,
}

#[allow(dead_code)]
impl CacheFixture {
    pub fn new(store_dir: &Path) -> Self {
        let store = Arc::new(MemoryStore::new());
        store.insert(
            "nix-cache-info",
            format!(
                "StoreDir: {}\nWantMassQuery: 1\nPriority: 40\n",
                store_dir.display()
            ),
        );
        Self {
            store,
            store_dir: store_dir.to_path_buf(),
        }
    }

    /// Create `<store_dir>/<basename>` on disk and return its path.
    pub fn store_path(&self, basename: &str) -> PathBuf {
        let path = self.store_dir.join(basename);
        std::fs::create_dir_all(&path).unwrap();
        path
    }

    /// Add a narinfo for `id` referencing `url`, and the blob itself when `with_blob`.
    pub fn entry(self, id: &str, url: &str, with_blob: bool) -> Self {
        self.store
            .insert(&format!("{id}.narinfo"), narinfo_body(id, url));
        if with_blob {
            self.store.insert(url, "blob");
        }
        self
    }

    /// Add a blob nothing references.
    pub fn blob(self, key: &str) -> Self {
        self.store.insert(key, "blob");
        self
    }

    /// A collector over this cache with `jobs` workers sharing the store.
    pub fn collector(&self, closure: Arc<dyn ClosureQuery>, config: GcConfig) -> GarbageCollector {
        let store: Arc<dyn ObjectStore> = self.store.clone();
        let workers = (0..config.jobs).map(|_| Arc::clone(&store)).collect();
        GarbageCollector::new(store, workers, closure, config, RetryConfig::disabled()).unwrap()
    }
}
