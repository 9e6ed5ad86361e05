//! Timeout and retry policy for store and registry calls.

use std::future::Future;
use std::time::Duration;

use crate::config::{DEFAULT_STORE_RETRY_BACKOFF_MS, DEFAULT_STORE_TIMEOUT_MS, STORE_RETRIES};
use crate::errors::{AppError, AppResult};

/// Bounds every backing-store call.
///
/// A call that times out or fails transiently is retried `retries` times
/// after `backoff`; if it still fails it surfaces as
/// [`AppError::ServiceUnavailable`]. Non-transient errors pass through
/// untouched.
#[derive(Debug, Clone)]
pub struct StorePolicy {
    pub timeout: Duration,
    pub retries: u32,
    pub backoff: Duration,
}

impl Default for StorePolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_STORE_TIMEOUT_MS),
            retries: STORE_RETRIES,
            backoff: Duration::from_millis(DEFAULT_STORE_RETRY_BACKOFF_MS),
        }
    }
}

impl StorePolicy {
    /// Run `call` under the policy. `operation` names the call in logs.
    pub async fn run<T, F, Fut>(&self, operation: &'static str, mut call: F) -> AppResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let mut attempt = 0;

        loop {
            let outcome = match tokio::time::timeout(self.timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(AppError::service_unavailable(format!(
                    "{} timed out",
                    operation
                ))),
            };

            match outcome {
                Err(e) if e.is_transient() => {
                    if attempt < self.retries {
                        attempt += 1;
                        tracing::warn!(operation, attempt, error = %e, "Transient store failure, retrying");
                        tokio::time::sleep(self.backoff).await;
                        continue;
                    }

                    tracing::error!(operation, error = %e, "Store call failed after retries");
                    return Err(AppError::service_unavailable(operation));
                }
                other => return other,
            }
        }
    }
}
