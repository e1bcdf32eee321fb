//! Closure queries against the local Nix store.

use crate::error::{GcError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// Computes the transitive runtime closure of a store path.
#[async_trait]
pub trait ClosureQuery: Send + Sync {
    /// Every store path reachable from `store_path`, including itself.
    ///
    /// A failed query is fatal to the run.
    async fn requisites(&self, store_path: &Path) -> Result<Vec<PathBuf>>;
}

/// Closure query backed by `nix-store --query --requisites`.
#[derive(Clone, Debug)]
pub struct NixStoreClosure {
    program: String,
}

impl NixStoreClosure {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for NixStoreClosure {
    fn default() -> Self {
        Self::new("nix-store")
    }
}

#[async_trait]
impl ClosureQuery for NixStoreClosure {
    async fn requisites(&self, store_path: &Path) -> Result<Vec<PathBuf>> {
        tracing::debug!(
            program = %self.program,
            path = %store_path.display(),
            "Querying closure"
        );

        let mut cmd = Command::new(&self.program);
        cmd.arg("--query").arg("--requisites").arg(store_path);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let output = cmd.output().await.map_err(|e| GcError::Closure {
            path: store_path.to_path_buf(),
            message: format!("failed to spawn {} (is it on PATH?): {e}", self.program),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GcError::Closure {
                path: store_path.to_path_buf(),
                message: format!("{} exited with {}: {}", self.program, output.status, stderr.trim()),
            });
        }

        let stdout = String::from_utf8(output.stdout).map_err(|_| GcError::Closure {
            path: store_path.to_path_buf(),
            message: "output is not valid UTF-8".to_string(),
        })?;

        Ok(parse_requisites(&stdout))
    }
}

/// One store path per non-blank line.
fn parse_requisites(stdout: &str) -> Vec<PathBuf> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(PathBuf::from)
        .collect()
}
