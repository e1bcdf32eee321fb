//! Mark-and-sweep garbage collection for Nix binary caches in object storage.
//!
//! The pipeline reads the cache's catalogs, resolves filesystem roots to live
//! entries through their closures, fetches the narinfos of live entries to
//! learn which blobs they use, and deletes everything else:
//!
//! 1. [`catalog`]: list narinfos and NAR blobs, read `nix-cache-info`
//! 2. [`roots`]: expand roots into live identifiers
//! 3. [`reconcile`]: partition catalogs into live, dead and dangling
//! 4. [`fetch`]: concurrent narinfo fetching
//! 5. [`plan`]: ordered, batched deletion

pub mod catalog;
pub mod closure;
pub mod error;
pub mod fetch;
pub mod plan;
pub mod reconcile;
pub mod roots;
pub mod run;

pub use catalog::{CacheLayout, CatalogReader};
pub use closure::{ClosureQuery, NixStoreClosure};
pub use error::{GcError, Result};
pub use fetch::Fetcher;
pub use plan::{DeletionPlan, DeletionStats, execute};
pub use reconcile::{BlobPartition, FetchedRef, MetadataPartition};
pub use roots::RootResolver;
pub use run::{GarbageCollector, GcOutcome, GcReport, NarCounts, NarinfoCounts};
