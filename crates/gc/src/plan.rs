//! Deletion planning and execution.

use crate::error::{GcError, Result};
use narsweep_core::config::RetryConfig;
use narsweep_core::{BlobRef, Identifier, MAX_DELETE_BATCH};
use narsweep_storage::{ObjectStore, with_retry};
use std::collections::BTreeSet;

/// Object keys to delete, grouped in the order they are deleted.
///
/// Dead blobs go before dead narinfos: a narinfo removed ahead of its blob
/// would leave the blob orphaned with nothing pointing at it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeletionPlan {
    /// Narinfos of live entries whose blob is gone.
    pub dangling_narinfos: Vec<String>,
    /// Blobs no live narinfo references.
    pub dead_blobs: Vec<String>,
    /// Narinfos no root reaches.
    pub dead_narinfos: Vec<String>,
}

impl DeletionPlan {
    pub fn new(
        dangling: &BTreeSet<Identifier>,
        dead_blobs: &BTreeSet<BlobRef>,
        dead: &BTreeSet<Identifier>,
        narinfo_suffix: &str,
    ) -> Self {
        Self {
            dangling_narinfos: dangling.iter().map(|id| id.narinfo_key(narinfo_suffix)).collect(),
            dead_blobs: dead_blobs.iter().map(|blob| blob.as_str().to_string()).collect(),
            dead_narinfos: dead.iter().map(|id| id.narinfo_key(narinfo_suffix)).collect(),
        }
    }

    /// All keys in deletion order.
    pub fn keys(&self) -> Vec<String> {
        self.dangling_narinfos
            .iter()
            .chain(&self.dead_blobs)
            .chain(&self.dead_narinfos)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.dangling_narinfos.len() + self.dead_blobs.len() + self.dead_narinfos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// What an execution did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeletionStats {
    /// Bulk-delete requests issued.
    pub requests: usize,
    /// Keys covered by those requests.
    pub keys: usize,
    pub dry_run: bool,
}

/// Delete `keys` in order, at most `batch_limit` per bulk request.
///
/// In dry-run mode every batch is logged and no request is issued. Batches
/// are not transactional: on failure, earlier batches stay deleted.
pub async fn execute(
    store: &dyn ObjectStore,
    keys: &[String],
    dry_run: bool,
    batch_limit: usize,
    retry: &RetryConfig,
) -> Result<DeletionStats> {
    if batch_limit == 0 || batch_limit > MAX_DELETE_BATCH {
        return Err(GcError::Config(format!(
            "batch limit must be between 1 and {MAX_DELETE_BATCH}, got {batch_limit}"
        )));
    }

    let total = keys.len();
    let mut stats = DeletionStats {
        dry_run,
        ..DeletionStats::default()
    };

    if dry_run && total > 0 {
        tracing::warn!(total, "DRY-RUN MODE: not deleting anything");
    }

    for (index, batch) in keys.chunks(batch_limit).enumerate() {
        let first = index * batch_limit + 1;
        let last = first + batch.len() - 1;
        tracing::info!("deleting items {first}-{last}/{total}...");

        for key in batch {
            tracing::debug!(key = %key, dry_run, "Deleting");
        }

        if dry_run {
            continue;
        }

        with_retry(retry, "delete batch", || store.delete_many(batch))
            .await
            .map_err(|source| GcError::Delete {
                first,
                last,
                total,
                source,
            })?;
        stats.requests += 1;
        stats.keys += batch.len();
    }

    Ok(stats)
}
