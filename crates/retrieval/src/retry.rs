//! Bounded exponential backoff.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Retry budget with a doubling delay capped at `max_delay_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::downloads()
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay_ms: initial_delay.as_millis() as u64,
            max_delay_ms: max_delay.as_millis() as u64,
        }
    }

    /// Policy for single HTTP transfers.
    pub fn downloads() -> Self {
        Self::new(5, Duration::from_secs(2), Duration::from_secs(120))
    }

    /// Policy for whole per-mission tasks.
    pub fn tasks() -> Self {
        Self::new(3, Duration::from_secs(1), Duration::from_secs(30))
    }

    /// No retries at all.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO, Duration::ZERO)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    /// Total number of attempts, the first one included.
    pub fn attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let mut delay = self.initial_delay();
        for _ in 1..retry {
            delay = std::cmp::min(delay * 2, self.max_delay());
        }
        std::cmp::min(delay, self.max_delay())
    }

    /// Run `op` until it succeeds, fails with an error `retryable` rejects,
    /// or the budget is spent. The last error is returned.
    pub async fn retry<T, E, F, Fut, R>(
        &self,
        operation: &str,
        retryable: R,
        mut op: F,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        R: Fn(&E) -> bool,
        E: Display,
    {
        let mut retry = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if retry < self.max_retries && retryable(&e) => {
                    retry += 1;
                    let delay = self.delay_for(retry);
                    warn!(
                        error = %e,
                        operation,
                        retry,
                        max_retries = self.max_retries,
                        delay_secs = delay.as_secs_f64(),
                        "Operation failed, retrying"
                    );
                    counter!("sampler_retries_total", "operation" => operation.to_string())
                        .increment(1);
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
