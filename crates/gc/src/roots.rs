//! Root resolution: from filesystem roots to the set of live identifiers.
//!
//! A root is a path on the local machine. After resolving symlinks it is
//! either inside the store directory (a store path, whose closure is live),
//! a directory (every child is walked as a root), or a regular file outside
//! the store (live if a store entry with the same basename exists). Anything
//! else contributes nothing.

use crate::closure::ClosureQuery;
use crate::error::{GcError, Result};
use narsweep_core::Identifier;
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

/// Resolves roots against a store directory using a closure query.
pub struct RootResolver<'a> {
    /// Store directory as the cache names it; store paths are built under it.
    store_dir: PathBuf,
    /// Store directory with symlinks resolved; canonical roots are matched against it.
    canonical_store_dir: PathBuf,
    closure: &'a dyn ClosureQuery,
}

impl<'a> RootResolver<'a> {
    pub async fn new(store_dir: impl Into<PathBuf>, closure: &'a dyn ClosureQuery) -> Self {
        let store_dir = store_dir.into();
        let canonical_store_dir = fs::canonicalize(&store_dir)
            .await
            .unwrap_or_else(|_| store_dir.clone());
        Self {
            store_dir,
            canonical_store_dir,
            closure,
        }
    }

    /// Resolve every root to the union of the closures it reaches.
    ///
    /// Top-level roots must exist. Paths discovered while walking directories
    /// that cannot be resolved (dangling symlinks, races) are skipped.
    pub async fn resolve_roots(&self, roots: &[PathBuf]) -> Result<BTreeSet<Identifier>> {
        for root in roots {
            let exists = fs::try_exists(root).await.map_err(|source| GcError::Io {
                path: root.clone(),
                source,
            })?;
            if !exists {
                return Err(GcError::RootNotFound(root.clone()));
            }
        }

        let mut live = BTreeSet::new();
        let mut pending: Vec<PathBuf> = roots.iter().rev().cloned().collect();

        while let Some(path) = pending.pop() {
            let resolved = match fs::canonicalize(&path).await {
                Ok(resolved) => resolved,
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "Skipping unresolvable root");
                    continue;
                }
            };

            if let Some(store_path) = self.store_entry(&resolved) {
                tracing::debug!(
                    root = %path.display(),
                    store_path = %store_path.display(),
                    "Root points into the store"
                );
                self.add_closure(&store_path, &mut live).await?;
                continue;
            }

            let meta = match fs::metadata(&resolved).await {
                Ok(meta) => meta,
                Err(e) => {
                    tracing::debug!(path = %resolved.display(), error = %e, "Skipping unreadable root");
                    continue;
                }
            };

            if meta.is_dir() {
                let mut children = Vec::new();
                let mut entries = fs::read_dir(&resolved).await.map_err(|source| GcError::Io {
                    path: resolved.clone(),
                    source,
                })?;
                while let Some(entry) = entries.next_entry().await.map_err(|source| GcError::Io {
                    path: resolved.clone(),
                    source,
                })? {
                    children.push(entry.path());
                }
                children.sort();
                pending.extend(children.into_iter().rev());
            } else if meta.is_file() {
                let Some(name) = resolved.file_name() else {
                    continue;
                };
                let candidate = self.store_dir.join(name);
                if fs::try_exists(&candidate).await.unwrap_or(false) {
                    tracing::debug!(
                        root = %path.display(),
                        store_path = %candidate.display(),
                        "File root names a store entry"
                    );
                    self.add_closure(&candidate, &mut live).await?;
                }
            }
        }

        tracing::debug!(live = live.len(), "Resolved roots");
        Ok(live)
    }

    /// The top-level store path containing `resolved`, if it lies inside the store.
    ///
    /// Paths nested deeper than a store entry map to that entry.
    fn store_entry(&self, resolved: &Path) -> Option<PathBuf> {
        let rest = resolved.strip_prefix(&self.canonical_store_dir).ok()?;
        match rest.components().next()? {
            Component::Normal(name) => Some(self.store_dir.join(name)),
            _ => None,
        }
    }

    /// Add the closure of `store_path` to `live`, unless its entry is already there.
    ///
    /// A closure is closed under reachability, so an entry already present
    /// implies its whole closure is present too.
    async fn add_closure(&self, store_path: &Path, live: &mut BTreeSet<Identifier>) -> Result<()> {
        let id = Identifier::from_path(store_path)?;
        if live.contains(&id) {
            tracing::debug!(id = %id, "Closure already added");
            return Ok(());
        }

        let requisites = self.closure.requisites(store_path).await?;
        for requisite in requisites {
            live.insert(Identifier::from_path(&requisite)?);
        }
        live.insert(id);
        Ok(())
    }
}
