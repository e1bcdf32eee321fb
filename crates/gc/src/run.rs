//! The full mark-and-sweep pipeline.

use crate::catalog::{CacheLayout, CatalogReader};
use crate::closure::ClosureQuery;
use crate::error::{GcError, Result};
use crate::fetch::Fetcher;
use crate::plan::{DeletionPlan, DeletionStats, execute};
use crate::reconcile::{BlobPartition, MetadataPartition};
use crate::roots::RootResolver;
use narsweep_core::Identifier;
use narsweep_core::config::{GcConfig, RetryConfig};
use narsweep_storage::ObjectStore;
use std::path::PathBuf;
use std::sync::Arc;

/// Narinfo counts of one run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NarinfoCounts {
    pub all: usize,
    /// Reachable, present, and backed by a blob.
    pub live: usize,
    pub dead: usize,
    pub dangling: usize,
}

/// Blob counts of one run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NarCounts {
    pub all: usize,
    pub live: usize,
    pub dead: usize,
}

/// Summary of a completed run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GcReport {
    pub narinfos: NarinfoCounts,
    pub nars: NarCounts,
    pub plan: DeletionPlan,
    pub deletion: DeletionStats,
}

/// How a run ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GcOutcome {
    /// The sweep ran (or was planned, in dry-run mode).
    Completed(GcReport),
    /// Roots reach entries the cache does not hold; nothing was fetched or deleted.
    MissingRoots(Vec<Identifier>),
}

/// Garbage collector for one binary cache.
pub struct GarbageCollector {
    store: Arc<dyn ObjectStore>,
    fetcher: Fetcher,
    closure: Arc<dyn ClosureQuery>,
    layout: CacheLayout,
    config: GcConfig,
    retry: RetryConfig,
}

impl GarbageCollector {
    /// Create a collector.
    ///
    /// `store` serves listing and deletion; each handle in `fetch_workers`
    /// backs one narinfo fetch worker.
    pub fn new(
        store: Arc<dyn ObjectStore>,
        fetch_workers: Vec<Arc<dyn ObjectStore>>,
        closure: Arc<dyn ClosureQuery>,
        config: GcConfig,
        retry: RetryConfig,
    ) -> Result<Self> {
        config.validate().map_err(GcError::Config)?;
        let fetcher = Fetcher::new(fetch_workers, config.narinfo_suffix.clone(), retry.clone())?;
        Ok(Self {
            store,
            fetcher,
            closure,
            layout: CacheLayout::from(&config),
            config,
            retry,
        })
    }

    /// Run mark and sweep from `roots`.
    ///
    /// With `all_live` set the roots are ignored and every narinfo is live.
    pub async fn run(&self, roots: &[PathBuf]) -> Result<GcOutcome> {
        tracing::info!(
            backend = self.store.backend_name(),
            roots = roots.len(),
            jobs = self.fetcher.concurrency(),
            dry_run = self.config.dry_run,
            all_live = self.config.all_live,
            "Starting garbage collection"
        );

        let reader = CatalogReader::new(self.store.as_ref(), &self.layout, &self.retry);
        let cache_info = reader.read_cache_info().await?;

        tracing::info!("listing narinfos...");
        let catalog = reader.list_catalog().await?;

        let live = if self.config.all_live {
            tracing::info!("treating all narinfos as live");
            catalog.clone()
        } else {
            tracing::info!("resolving roots...");
            RootResolver::new(&cache_info.store_dir, self.closure.as_ref())
                .await
                .resolve_roots(roots)
                .await?
        };

        let partition = MetadataPartition::new(&catalog, &live);

        if self.config.check_missing {
            for id in &partition.missing {
                tracing::info!("find missing store hash: {id}");
            }
            if !partition.missing.is_empty() {
                tracing::error!(
                    missing = partition.missing.len(),
                    "Roots reach store paths missing from the cache, aborting"
                );
                return Ok(GcOutcome::MissingRoots(
                    partition.missing.into_iter().collect(),
                ));
            }
        }

        tracing::info!("listing nars...");
        let blob_catalog = reader.list_blob_catalog().await?;

        tracing::info!("fetching live narinfos...");
        let fetched = self.fetcher.fetch_blob_refs(&partition.presented_live).await?;
        let blobs = BlobPartition::new(&fetched, &blob_catalog);

        for blob in &blobs.live {
            tracing::debug!("find live nar \"{blob}\"");
        }
        for blob in &blobs.dead {
            tracing::debug!("find dead nar \"{blob}\"");
        }

        let nars = NarCounts {
            all: blob_catalog.len(),
            live: blobs.live.len(),
            dead: blobs.dead.len(),
        };
        tracing::info!("nars: all({}), live({}), dead({})", nars.all, nars.live, nars.dead);

        let narinfos = NarinfoCounts {
            all: catalog.len(),
            live: partition.presented_live.len() - blobs.dangling.len(),
            dead: partition.dead.len(),
            dangling: blobs.dangling.len(),
        };
        tracing::info!(
            "narinfos: all({}), live({}), dead({}), dangling({})",
            narinfos.all,
            narinfos.live,
            narinfos.dead,
            narinfos.dangling
        );

        let plan = DeletionPlan::new(
            &blobs.dangling,
            &blobs.dead,
            &partition.dead,
            &self.layout.narinfo_suffix,
        );
        let deletion = execute(
            self.store.as_ref(),
            &plan.keys(),
            self.config.dry_run,
            self.config.batch_limit,
            &self.retry,
        )
        .await?;

        tracing::info!(
            planned = plan.len(),
            requests = deletion.requests,
            deleted = deletion.keys,
            dry_run = deletion.dry_run,
            "Garbage collection completed"
        );

        Ok(GcOutcome::Completed(GcReport {
            narinfos,
            nars,
            plan,
            deletion,
        }))
    }
}
