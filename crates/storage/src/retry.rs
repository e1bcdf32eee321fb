//! Bounded retry with exponential backoff for object store requests.

use crate::error::StorageResult;
use narsweep_core::config::RetryConfig;
use std::future::Future;

/// Run `request` until it succeeds, fails with a non-retryable error, or the
/// retry budget in `policy` is exhausted.
///
/// The request must be idempotent: listings, gets and bulk deletes are.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryConfig,
    operation: &str,
    mut request: F,
) -> StorageResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = StorageResult<T>>,
{
    let mut attempt = 0;

    loop {
        match request().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < policy.max_retries => {
                attempt += 1;
                let delay = policy.backoff(attempt);
                tracing::warn!(
                    operation,
                    attempt,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Object store request failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
