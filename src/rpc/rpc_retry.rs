//! Retry helper with jittered backoff for idempotent RPC calls

use std::future::Future;
use tokio::time::sleep;
use tracing::{debug, warn};

use super::rpc_errors::{RetryPolicy, RpcError};

/// Retry an async RPC operation according to the policy
///
/// Only errors classified as retryable trigger another attempt; anything
/// else is returned immediately.
pub async fn retry_with_backoff<F, Fut, T>(
    operation_name: &str,
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, RpcError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RpcError>>,
{
    let mut attempt = 0u32;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!(
                        operation = operation_name,
                        attempts = attempt + 1,
                        "Operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) if !err.is_retryable() => {
                debug!(
                    operation = operation_name,
                    error = %err,
                    "Permanent error, not retrying"
                );
                return Err(err);
            }
            Err(err) => match policy.calculate_delay(attempt) {
                Some(backoff) => {
                    debug!(
                        operation = operation_name,
                        attempt = attempt + 1,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "Transient error, backing off before retry"
                    );
                    sleep(backoff).await;
                    attempt += 1;
                }
                None => {
                    warn!(
                        operation = operation_name,
                        attempts = attempt + 1,
                        error = %err,
                        "All retry attempts exhausted"
                    );
                    return Err(err);
                }
            },
        }
    }
}
