//! Retry with doubling backoff for remote calls.

use crate::{ErrorKind, Result};
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (zero-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.initial_delay
            .saturating_mul(2u32.saturating_pow(retry))
    }

    /// Run `operation`, retrying transient failures
    ///
    /// Non-transient errors are returned immediately. When every attempt
    /// fails, the last error is returned.
    pub async fn run<F, Fut, T>(&self, operation_name: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        info!(
                            operation = operation_name,
                            attempt, "Operation succeeded after retry"
                        );
                    }
                    return Ok(value);
                }
                Err(err) if attempt < attempts && err.kind() == ErrorKind::Transient => {
                    let delay = self.delay_for(attempt - 1);
                    warn!(
                        operation = operation_name,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SyncError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn delays_double() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried() {
        let calls = AtomicU32::new(0);

        let result = RetryPolicy::default()
            .run("download", || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(SyncError::Storage("timeout".to_string()))
                } else {
                    Ok(7)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_returns_last_error() {
        let calls = AtomicU32::new(0);

        let result: Result<()> = RetryPolicy::default()
            .run("upload", || async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                Err(SyncError::Storage(format!("attempt {n}")))
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(result, Err(SyncError::Storage(msg)) if msg == "attempt 2"));
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_errors_are_not_retried() {
        let calls = AtomicU32::new(0);

        let result: Result<()> = RetryPolicy::default()
            .run("download", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(SyncError::NotConnected)
            })
            .await;

        assert!(matches!(result, Err(SyncError::NotConnected)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
