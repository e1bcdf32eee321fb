//! Garbage collector for Nix binary caches hosted in S3-compatible storage.

use anyhow::{Context, Result};
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use narsweep_core::config::AppConfig;
use narsweep_gc::{GarbageCollector, GcOutcome, NixStoreClosure};
use narsweep_storage::ObjectStore;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Exit status when `--check-missing` finds roots absent from the cache.
const EXIT_MISSING_ROOTS: u8 = 1;
/// Exit status for any fatal error.
const EXIT_FATAL: u8 = 2;

/// Delete narinfos and NARs no longer reachable from the given roots.
#[derive(Parser, Debug)]
#[command(name = "narsweep")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Bucket holding the cache, or `file:///path` for a local cache directory
    bucket: Option<String>,

    /// S3 endpoint URL (for MinIO, R2, etc.)
    #[arg(long)]
    endpoint: Option<String>,

    /// AWS region
    #[arg(long)]
    region: Option<String>,

    /// Use path-style bucket addressing
    #[arg(long)]
    force_path_style: bool,

    /// GC root: a store path, a file named like a store path, or a directory of roots
    #[arg(short, long = "roots", value_name = "PATH")]
    roots: Vec<PathBuf>,

    /// Fail if a root reaches a store path the cache does not hold
    #[arg(long)]
    check_missing: bool,

    /// Consider every narinfo in the cache live
    #[arg(long)]
    all_live: bool,

    /// Number of parallel narinfo fetch workers
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Report what would be deleted without deleting anything
    #[arg(long)]
    dry_run: bool,

    /// Path to configuration file
    #[arg(short, long, env = "NARSWEEP_CONFIG")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, conflicts_with = "quiet")]
    verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    fn default_log_filter(&self) -> &'static str {
        if self.quiet {
            return "warn";
        }
        match self.verbose {
            0 => "info",
            1 => "info,narsweep=debug,narsweep_gc=debug,narsweep_storage=debug",
            _ => "debug,narsweep=trace,narsweep_gc=trace,narsweep_storage=trace",
        }
    }
}

/// Layer configuration: TOML file, then `NARSWEEP_` environment, then flags.
fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut figment = Figment::new();

    if let Some(path) = &cli.config {
        if !path.exists() {
            anyhow::bail!("config file not found: {}", path.display());
        }
        tracing::debug!(config_path = %path.display(), "Loading configuration from file");
        figment = figment.merge(Toml::file(path));
    }

    figment = figment.merge(Env::prefixed("NARSWEEP_").ignore(&["CONFIG"]).split("__"));

    if let Some(bucket) = &cli.bucket {
        if let Some(path) = bucket.strip_prefix("file://") {
            figment = figment
                .merge(("storage.type", "filesystem"))
                .merge(("storage.path", path));
        } else {
            figment = figment
                .merge(("storage.type", "s3"))
                .merge(("storage.bucket", bucket.as_str()));
        }
    }
    if let Some(endpoint) = &cli.endpoint {
        figment = figment.merge(("storage.endpoint", endpoint.as_str()));
    }
    if let Some(region) = &cli.region {
        figment = figment.merge(("storage.region", region.as_str()));
    }
    if cli.force_path_style {
        figment = figment.merge(("storage.force_path_style", true));
    }
    if let Some(jobs) = cli.jobs {
        figment = figment.merge(("gc.jobs", jobs));
    }
    if cli.check_missing {
        figment = figment.merge(("gc.check_missing", true));
    }
    if cli.all_live {
        figment = figment.merge(("gc.all_live", true));
    }
    if cli.dry_run {
        figment = figment.merge(("gc.dry_run", true));
    }

    let config: AppConfig = figment.extract().context(
        "failed to load configuration (pass a bucket, or set [storage] in a config file)",
    )?;
    config.validate().context("invalid configuration")?;
    Ok(config)
}

async fn run(cli: Cli) -> Result<GcOutcome> {
    let config = load_config(&cli)?;

    let store = narsweep_storage::from_config(&config.storage)
        .await
        .context("failed to initialize storage")?;
    store
        .health_check()
        .await
        .context("storage health check failed")?;
    tracing::debug!(backend = store.backend_name(), "Storage backend connectivity verified");

    // Each fetch worker gets its own client.
    let mut workers: Vec<Arc<dyn ObjectStore>> = Vec::with_capacity(config.gc.jobs);
    for _ in 0..config.gc.jobs {
        workers.push(
            narsweep_storage::from_config(&config.storage)
                .await
                .context("failed to initialize storage for fetch worker")?,
        );
    }

    let closure = Arc::new(NixStoreClosure::new(config.gc.closure_program.clone()));
    let gc = GarbageCollector::new(store, workers, closure, config.gc, config.retry)?;
    let outcome = gc.run(&cli.roots).await?;
    Ok(outcome)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.default_log_filter().into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(std::io::stderr().is_terminal()),
        )
        .init();

    match run(cli).await {
        Ok(GcOutcome::Completed(_)) => ExitCode::SUCCESS,
        Ok(GcOutcome::MissingRoots(_)) => ExitCode::from(EXIT_MISSING_ROOTS),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(EXIT_FATAL)
        }
    }
}
