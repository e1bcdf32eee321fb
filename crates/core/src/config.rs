//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Storage backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// A binary cache laid out in a local directory.
    Filesystem {
        /// Root directory of the cache.
        path: PathBuf,
    },
    /// S3-compatible storage.
    S3 {
        /// Bucket name.
        bucket: String,
        /// Optional endpoint URL (for MinIO, R2, etc.).
        endpoint: Option<String>,
        /// AWS region.
        region: Option<String>,
        /// Optional key prefix the cache lives under.
        prefix: Option<String>,
        /// AWS access key ID. Falls back to the default credential chain if not set.
        /// WARNING: Prefer env vars or IAM roles over storing secrets in config files.
        access_key_id: Option<String>,
        /// AWS secret access key. Falls back to the default credential chain if not set.
        secret_access_key: Option<String>,
        /// Force path-style URLs (`endpoint/bucket/key` instead of `bucket.endpoint/key`).
        /// Required for MinIO and some S3-compatible services.
        #[serde(default)]
        force_path_style: bool,
    },
}

impl StorageConfig {
    /// Validate storage configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StorageConfig::S3 {
                bucket,
                access_key_id,
                secret_access_key,
                ..
            } => {
                if bucket.is_empty() {
                    return Err("s3 config requires a non-empty bucket".to_string());
                }
                match (access_key_id.as_ref(), secret_access_key.as_ref()) {
                    (Some(_), Some(_)) | (None, None) => Ok(()),
                    _ => Err(
                        "s3 config requires both access_key_id and secret_access_key when either is set"
                            .to_string(),
                    ),
                }
            }
            StorageConfig::Filesystem { path } => {
                if path.as_os_str().is_empty() {
                    return Err("filesystem config requires a path".to_string());
                }
                Ok(())
            }
        }
    }
}

/// Garbage collection configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GcConfig {
    /// Number of parallel narinfo fetch workers (default: 1).
    #[serde(default = "default_jobs")]
    pub jobs: usize,
    /// Maximum keys per bulk-delete request (default and maximum: 1000).
    #[serde(default = "default_batch_limit")]
    pub batch_limit: usize,
    /// Report what would be deleted without deleting anything.
    #[serde(default)]
    pub dry_run: bool,
    /// Fail (exit 1) if any root resolves to an entry absent from the cache.
    #[serde(default)]
    pub check_missing: bool,
    /// Treat every narinfo in the cache as live, skipping root resolution.
    #[serde(default)]
    pub all_live: bool,
    /// Suffix of narinfo object keys.
    #[serde(default = "default_narinfo_suffix")]
    pub narinfo_suffix: String,
    /// Key prefix of NAR blobs.
    #[serde(default = "default_nar_prefix")]
    pub nar_prefix: String,
    /// Key of the cache descriptor.
    #[serde(default = "default_cache_info_key")]
    pub cache_info_key: String,
    /// Program used to compute closures (`<program> --query --requisites <path>`).
    #[serde(default = "default_closure_program")]
    pub closure_program: String,
}

fn default_jobs() -> usize {
    1
}

fn default_batch_limit() -> usize {
    crate::MAX_DELETE_BATCH
}

fn default_narinfo_suffix() -> String {
    crate::NARINFO_SUFFIX.to_string()
}

fn default_nar_prefix() -> String {
    crate::NAR_PREFIX.to_string()
}

fn default_cache_info_key() -> String {
    crate::CACHE_INFO_KEY.to_string()
}

fn default_closure_program() -> String {
    "nix-store".to_string()
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            jobs: default_jobs(),
            batch_limit: default_batch_limit(),
            dry_run: false,
            check_missing: false,
            all_live: false,
            narinfo_suffix: default_narinfo_suffix(),
            nar_prefix: default_nar_prefix(),
            cache_info_key: default_cache_info_key(),
            closure_program: default_closure_program(),
        }
    }
}

impl GcConfig {
    /// Validate GC configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.jobs == 0 {
            return Err("gc.jobs must be at least 1".to_string());
        }
        if self.batch_limit == 0 || self.batch_limit > crate::MAX_DELETE_BATCH {
            return Err(format!(
                "gc.batch_limit must be between 1 and {}, got {}",
                crate::MAX_DELETE_BATCH,
                self.batch_limit
            ));
        }
        if self.narinfo_suffix.is_empty() {
            return Err("gc.narinfo_suffix must not be empty".to_string());
        }
        Ok(())
    }
}

/// Retry policy for object store requests.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt (default: 3).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay before the first retry, doubled on each further retry (default: 1000ms).
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

impl RetryConfig {
    /// No retries at all.
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            base_delay_ms: 0,
        }
    }

    /// Delay before retry number `attempt` (1-based): 1s, 2s, 4s with the defaults.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.base_delay_ms.saturating_mul(1 << shift))
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    /// Storage backend configuration.
    pub storage: StorageConfig,
    /// Garbage collection configuration.
    #[serde(default)]
    pub gc: GcConfig,
    /// Retry policy for object store requests.
    #[serde(default)]
    pub retry: RetryConfig,
}

impl AppConfig {
    /// Validate all sections.
    pub fn validate(&self) -> crate::Result<()> {
        self.storage.validate().map_err(crate::Error::Config)?;
        self.gc.validate().map_err(crate::Error::Config)?;
        Ok(())
    }
}
