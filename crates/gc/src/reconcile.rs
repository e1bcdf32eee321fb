//! Set reconciliation between the catalogs and the live set.
//!
//! Everything here is pure: catalogs and live sets go in, partitions come out.

use narsweep_core::{BlobRef, Identifier};
use std::collections::BTreeSet;

/// Metadata entries split by liveness.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MetadataPartition {
    /// In the catalog but not live.
    pub dead: BTreeSet<Identifier>,
    /// In the catalog and live.
    pub presented_live: BTreeSet<Identifier>,
    /// Live but absent from the catalog.
    pub missing: BTreeSet<Identifier>,
}

impl MetadataPartition {
    pub fn new(catalog: &BTreeSet<Identifier>, live: &BTreeSet<Identifier>) -> Self {
        Self {
            dead: dead(catalog, live),
            presented_live: presented_live(catalog, live),
            missing: missing(catalog, live),
        }
    }
}

/// Catalog entries no root reaches.
pub fn dead(catalog: &BTreeSet<Identifier>, live: &BTreeSet<Identifier>) -> BTreeSet<Identifier> {
    catalog.difference(live).cloned().collect()
}

/// Catalog entries some root reaches.
pub fn presented_live(
    catalog: &BTreeSet<Identifier>,
    live: &BTreeSet<Identifier>,
) -> BTreeSet<Identifier> {
    catalog.intersection(live).cloned().collect()
}

/// Reachable entries the cache does not hold.
pub fn missing(catalog: &BTreeSet<Identifier>, live: &BTreeSet<Identifier>) -> BTreeSet<Identifier> {
    live.difference(catalog).cloned().collect()
}

/// The blob reference recovered from one live narinfo.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchedRef {
    pub identifier: Identifier,
    pub blob: BlobRef,
}

/// Blob catalog split by liveness, plus entries whose blob is gone.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlobPartition {
    /// Live entries whose blob is not in the blob catalog.
    pub dangling: BTreeSet<Identifier>,
    /// Blobs referenced by a live entry and present in the catalog.
    pub live: BTreeSet<BlobRef>,
    /// Blobs in the catalog referenced by no live entry.
    pub dead: BTreeSet<BlobRef>,
}

impl BlobPartition {
    pub fn new(fetched: &[FetchedRef], blob_catalog: &BTreeSet<BlobRef>) -> Self {
        let mut partition = Self::default();

        for entry in fetched {
            if blob_catalog.contains(&entry.blob) {
                partition.live.insert(entry.blob.clone());
            } else {
                tracing::debug!(
                    id = %entry.identifier,
                    url = %entry.blob,
                    "Narinfo references a missing blob"
                );
                partition.dangling.insert(entry.identifier.clone());
            }
        }

        partition.dead = blob_catalog.difference(&partition.live).cloned().collect();
        partition
    }
}
