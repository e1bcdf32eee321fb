//! Local filesystem storage backend.
//!
//! Serves binary caches laid out on disk (as written by `nix copy --to file://...`).
//! Keys map to paths relative to the cache root.

use crate::error::{StorageError, StorageResult};
use crate::traits::{ListingOptions, ListingPage, ObjectStore, PageStream, is_single_level};
use async_trait::async_trait;
use bytes::Bytes;
use narsweep_core::MAX_DELETE_BATCH;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::instrument;

/// Local filesystem object store.
#[derive(Debug)]
pub struct FilesystemBackend {
    root: PathBuf,
}

impl FilesystemBackend {
    /// Open an existing cache directory.
    pub async fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        match fs::metadata(&root).await {
            Ok(meta) if meta.is_dir() => Ok(Self { root }),
            Ok(_) => Err(StorageError::Config(format!(
                "cache root is not a directory: {}",
                root.display()
            ))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::Config(
                format!("cache root does not exist: {}", root.display()),
            )),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    /// Get the full path for a key, with path traversal protection.
    async fn key_path(&self, key: &str) -> StorageResult<PathBuf> {
        let root = self.root.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || Self::key_path_sync(&root, &key))
            .await
            .map_err(|e| {
                StorageError::Io(std::io::Error::other(format!("spawn_blocking failed: {e}")))
            })?
    }

    /// Synchronous key path validation.
    ///
    /// Rejects keys that would escape the cache root, lexically or through symlinks.
    fn key_path_sync(root: &Path, key: &str) -> StorageResult<PathBuf> {
        if key.starts_with('/') || key.starts_with('\\') {
            return Err(StorageError::InvalidKey(format!(
                "path traversal not allowed: {key}"
            )));
        }

        for component in Path::new(key).components() {
            if !matches!(component, Component::Normal(_)) {
                return Err(StorageError::InvalidKey(format!(
                    "contains unsafe path component: {key}"
                )));
            }
        }

        let path = root.join(key);

        match std::fs::symlink_metadata(&path) {
            Ok(_) => {
                let root_canonical = root.canonicalize()?;
                let canonical = path.canonicalize().map_err(|_| {
                    StorageError::InvalidKey(format!("symlink target missing or invalid: {key}"))
                })?;
                if !canonical.starts_with(&root_canonical) {
                    return Err(StorageError::InvalidKey(format!(
                        "resolved path escapes storage root: {key}"
                    )));
                }
                Ok(path)
            }
            // Reads of a missing path surface as NotFound at the call site.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(path),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    /// Key of `path` relative to the root, using `/` separators.
    fn relative_key(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let parts: Option<Vec<&str>> = rel.components().map(|c| c.as_os_str().to_str()).collect();
        parts.map(|parts| parts.join("/"))
    }

    /// Walk the directory behind `prefix`, recursing unless `single_level`.
    ///
    /// Symlinks are not followed.
    async fn collect_keys(&self, prefix: &str, single_level: bool) -> StorageResult<Vec<String>> {
        let base_path = self.key_path(prefix).await?;
        let mut keys = Vec::new();

        match fs::try_exists(&base_path).await {
            Ok(true) => {}
            Ok(false) => return Ok(keys),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(keys),
            Err(e) => return Err(StorageError::Io(e)),
        }

        let mut stack = vec![base_path];
        while let Some(dir) = stack.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    if !single_level {
                        stack.push(path);
                    }
                } else if file_type.is_file()
                    && let Some(key) = self.relative_key(&path)
                {
                    keys.push(key);
                }
            }
        }

        keys.sort();
        Ok(keys)
    }
}

#[async_trait]
impl ObjectStore for FilesystemBackend {
    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        let path = self.key_path(key).await?;
        let data = fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(key.to_string())
            } else {
                StorageError::Io(e)
            }
        })?;
        Ok(Bytes::from(data))
    }

    #[instrument(skip(self, keys), fields(backend = "filesystem", count = keys.len()))]
    async fn delete_many(&self, keys: &[String]) -> StorageResult<()> {
        if keys.len() > MAX_DELETE_BATCH {
            return Err(StorageError::BatchTooLarge {
                count: keys.len(),
                limit: MAX_DELETE_BATCH,
            });
        }

        for key in keys {
            let path = self.key_path(key).await?;
            match fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(StorageError::Io(e)),
            }
        }
        Ok(())
    }

    fn list_pages<'a>(&'a self, prefix: &str, options: ListingOptions) -> PageStream<'a> {
        let prefix = prefix.to_string();
        let page_size = options.normalized_page_size();

        Box::pin(async_stream::try_stream! {
            let single_level = options.delimiter.is_some();
            let keys: Vec<String> = self
                .collect_keys(&prefix, single_level)
                .await?
                .into_iter()
                .filter(|key| is_single_level(key, &prefix, options.delimiter.as_deref()))
                .collect();

            for chunk in keys.chunks(page_size) {
                yield ListingPage { keys: chunk.to_vec() };
            }
        })
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }

    async fn health_check(&self) -> StorageResult<()> {
        fs::read_dir(&self.root).await?;
        Ok(())
    }
}
