//! Retry with exponential backoff for transient provider failures

use crate::config::RetryConfig;
use crate::domain::ProviderError;
use crate::log_retry_attempt;
use std::future::Future;
use std::time::Duration;

/// Backoff schedule plus the number of retries allowed for one integration
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    initial_delay_ms: u64,
    max_delay_ms: u64,
    backoff_multiplier: f64,
}

impl RetryPolicy {
    /// Policy with the configured backoff and `max_retries` retries
    pub fn new(backoff: &RetryConfig, max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_delay_ms: backoff.initial_delay_ms,
            max_delay_ms: backoff.max_delay_ms,
            backoff_multiplier: backoff.backoff_multiplier,
        }
    }

    /// Single attempt, no retries
    pub fn none() -> Self {
        Self::new(&RetryConfig::default(), 0)
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Delay before retry number `retry` (1-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = self
            .backoff_multiplier
            .powi(retry.saturating_sub(1) as i32);
        let delay_ms = (self.initial_delay_ms as f64 * factor) as u64;
        Duration::from_millis(delay_ms.min(self.max_delay_ms))
    }

    /// Runs `operation`, retrying transient failures
    ///
    /// Non-transient errors are returned immediately. After the last retry
    /// the final transient error is returned.
    pub async fn run<F, Fut, T>(&self, mut operation: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut retry = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && retry < self.max_retries => {
                    retry += 1;
                    log_retry_attempt!(retry, self.max_retries, e);
                    tokio::time::sleep(self.delay_for(retry)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
