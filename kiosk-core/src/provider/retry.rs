use std::{future::Future, time::Duration};

use tracing::warn;

use crate::error::{KioskError, Result};

/// Fixed-count exponential backoff for transient provider failures.
///
/// With the defaults a failing call is attempted four times, sleeping 1 s,
/// 2 s and 4 s between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Sleep before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: usize) -> Duration {
        let shift = retry.saturating_sub(1).min(16) as u32;
        self.base_delay
            .saturating_mul(1u32 << shift)
            .min(self.max_delay)
    }

    pub async fn run<F, Fut, T>(&self, operation: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut retry = 0usize;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(KioskError::Provider(err))
                    if retry < self.max_retries && err.is_transient() =>
                {
                    retry += 1;
                    let delay = self.delay_for(retry);
                    warn!(
                        operation,
                        attempt = retry,
                        max_retries = self.max_retries,
                        ?delay,
                        error = %err,
                        "provider call failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
