//! Concurrent narinfo fetching.
//!
//! A fixed pool of workers drains a shared queue of identifiers. Each worker
//! owns its own store handle. The queue position doubles as the progress
//! counter: it is claimed under the same lock as the work item, so progress
//! lines are numbered strictly in order.

use crate::error::{GcError, Result};
use crate::reconcile::FetchedRef;
use narsweep_core::config::RetryConfig;
use narsweep_core::{Identifier, NarInfo};
use narsweep_storage::{ObjectStore, with_retry};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use tokio::task::JoinSet;

/// Work queue shared by all fetch workers.
struct WorkQueue {
    items: std::vec::IntoIter<Identifier>,
    claimed: usize,
    total: usize,
    width: usize,
}

impl WorkQueue {
    fn new(items: Vec<Identifier>) -> Self {
        let total = items.len();
        Self {
            items: items.into_iter(),
            claimed: 0,
            total,
            width: total.to_string().len(),
        }
    }

    /// Claim the next identifier and report progress for it.
    ///
    /// Returns the 1-based position of the claim alongside the identifier.
    fn claim(&mut self, suffix: &str) -> Option<(usize, Identifier)> {
        let id = self.items.next()?;
        self.claimed += 1;
        tracing::info!(
            "[{:>width$}/{}] fetching {}...",
            self.claimed,
            self.total,
            id.narinfo_key(suffix),
            width = self.width
        );
        Some((self.claimed, id))
    }
}

/// Pool of narinfo fetch workers.
pub struct Fetcher {
    workers: Vec<Arc<dyn ObjectStore>>,
    narinfo_suffix: String,
    retry: RetryConfig,
}

impl Fetcher {
    /// Build a pool with one worker per store handle.
    pub fn new(
        workers: Vec<Arc<dyn ObjectStore>>,
        narinfo_suffix: impl Into<String>,
        retry: RetryConfig,
    ) -> Result<Self> {
        if workers.is_empty() {
            return Err(GcError::Config(
                "fetcher needs at least one worker".to_string(),
            ));
        }
        Ok(Self {
            workers,
            narinfo_suffix: narinfo_suffix.into(),
            retry,
        })
    }

    /// Number of workers in the pool.
    pub fn concurrency(&self) -> usize {
        self.workers.len()
    }

    /// Fetch the narinfo of every identifier and extract its blob reference.
    ///
    /// The first failure aborts the remaining workers and is returned.
    /// Results are sorted by identifier.
    pub async fn fetch_blob_refs(&self, identifiers: &BTreeSet<Identifier>) -> Result<Vec<FetchedRef>> {
        if identifiers.is_empty() {
            return Ok(Vec::new());
        }

        let queue = Arc::new(Mutex::new(WorkQueue::new(
            identifiers.iter().cloned().collect(),
        )));
        let active = self.workers.len().min(identifiers.len());
        tracing::debug!(total = identifiers.len(), workers = active, "Fetching narinfos");

        let mut tasks = JoinSet::new();
        for store in self.workers.iter().take(active) {
            let store = Arc::clone(store);
            let queue = Arc::clone(&queue);
            let suffix = self.narinfo_suffix.clone();
            let retry = self.retry.clone();

            tasks.spawn(async move {
                let mut fetched = Vec::new();
                loop {
                    let next = match queue.lock() {
                        Ok(mut queue) => queue.claim(&suffix),
                        Err(_) => {
                            return Err(GcError::Worker("work queue lock poisoned".to_string()));
                        }
                    };
                    let Some((_, identifier)) = next else {
                        break;
                    };
                    fetched.push(fetch_one(store.as_ref(), identifier, &suffix, &retry).await?);
                }
                Ok::<_, GcError>(fetched)
            });
        }

        let mut results = Vec::with_capacity(identifiers.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(fetched)) => results.extend(fetched),
                Ok(Err(e)) => {
                    tasks.abort_all();
                    return Err(e);
                }
                Err(e) => {
                    tasks.abort_all();
                    return Err(GcError::Worker(e.to_string()));
                }
            }
        }

        results.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        Ok(results)
    }
}

/// Read one narinfo and extract its `URL`.
async fn fetch_one(
    store: &dyn ObjectStore,
    identifier: Identifier,
    suffix: &str,
    retry: &RetryConfig,
) -> Result<FetchedRef> {
    let key = identifier.narinfo_key(suffix);
    let body = with_retry(retry, "get narinfo", || store.get(&key))
        .await
        .map_err(|source| GcError::Fetch {
            key: key.clone(),
            source,
        })?;

    let text = std::str::from_utf8(&body).map_err(|_| GcError::NarInfo {
        key: key.clone(),
        source: narsweep_core::Error::NarInfoParse("body is not valid UTF-8".to_string()),
    })?;
    tracing::debug!(key = %key, body = text, "Fetched narinfo");

    let narinfo = NarInfo::parse(text).map_err(|source| GcError::NarInfo {
        key: key.clone(),
        source,
    })?;

    Ok(FetchedRef {
        identifier,
        blob: narinfo.url,
    })
}
