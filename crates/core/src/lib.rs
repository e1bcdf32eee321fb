//! Core domain types for narsweep.
//!
//! This crate defines the data model shared by the other crates:
//! - Cache entry identifiers derived from store path basenames
//! - Blob references (NAR object keys)
//! - Narinfo and `nix-cache-info` record parsing
//! - Configuration types

pub mod config;
pub mod error;
pub mod narinfo;
pub mod store_path;

pub use error::{Error, Result};
pub use narinfo::{CacheInfo, NarInfo, Record};
pub use store_path::{BlobRef, Identifier};

/// Key of the cache descriptor object at the root of a binary cache.
pub const CACHE_INFO_KEY: &str = "nix-cache-info";

/// Suffix of narinfo object keys.
pub const NARINFO_SUFFIX: &str = ".narinfo";

/// Key prefix under which NAR blobs are stored.
pub const NAR_PREFIX: &str = "nar/";

/// Maximum number of keys accepted by a single bulk-delete request.
pub const MAX_DELETE_BATCH: usize = 1000;
