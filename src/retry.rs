//! Bounded retry with exponential backoff for a single provider call.

use std::future::Future;
use std::time::Duration;

use crate::error::{ProviderError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry; doubled for every later retry.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Single attempt, no backoff.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay before retry `k` (0-indexed): `base * 2^k`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(retry))
    }
}

/// Runs `call` until it succeeds, fails permanently, or the attempt budget is
/// spent. `call` receives the 0-based attempt number.
///
/// Only errors for which [`ProviderError::is_transient`] holds are retried.
/// When attempts run out the error from the last attempt is returned.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut call: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        let error: ProviderError = match call(attempt).await {
            Ok(value) => {
                if attempt > 0 {
                    log::info!("Succeeded on attempt {}/{}", attempt + 1, max_attempts);
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        let remaining = max_attempts - attempt - 1;
        if !error.is_transient() {
            log::warn!("Attempt {} failed permanently: {}", attempt + 1, error);
            return Err(error);
        }
        if remaining == 0 {
            log::error!(
                "Giving up after {} attempts, last error: {}",
                max_attempts,
                error
            );
            return Err(error);
        }

        let delay = policy.delay_for(attempt);
        log::warn!(
            "Attempt {}/{} failed with transient error ({}), retrying in {:?}",
            attempt + 1,
            max_attempts,
            error,
            delay
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
