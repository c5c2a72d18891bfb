use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::debug;

use crate::config::Config;
use crate::core::errors::LedgerError;

/// Bounds every store call in time and retries the transient failures.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(50),
            attempt_timeout: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        RetryPolicy {
            max_retries: config.store_max_retries,
            base_delay: Duration::from_millis(config.store_retry_base_ms),
            attempt_timeout: Duration::from_millis(config.store_timeout_ms),
        }
    }

    /// Runs `operation` until it succeeds, fails with a non-retryable error,
    /// or `max_retries` retries are spent. The delay doubles after each
    /// failed attempt.
    pub async fn run<F, Fut, T>(&self, mut operation: F) -> Result<T, LedgerError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LedgerError>>,
    {
        let mut attempt = 0;
        let mut delay = self.base_delay;

        loop {
            let result = match timeout(self.attempt_timeout, operation()).await {
                Ok(result) => result,
                Err(_) => Err(LedgerError::Timeout(self.attempt_timeout.as_millis() as u64)),
            };
            match result {
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    debug!(attempt, error = %e, "retrying store call");
                    sleep(delay).await;
                    delay *= 2;
                }
                other => return other,
            }
        }
    }
}
