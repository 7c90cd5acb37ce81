// src/retry/strategy.rs

use crate::config::RetryConfig;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Retry policy for probes that talk to flaky dependencies. The aggregator
/// never retries; a probe opts in by wrapping its own check.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts.max(1)
    }

    /// Run `f` until it succeeds or the attempts are exhausted, returning the
    /// last error.
    pub async fn execute<F, Fut, T, E>(&self, label: &str, mut f: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let max_attempts = self.max_attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;

            match f().await {
                Ok(result) => return Ok(result),
                Err(error) => {
                    if attempt >= max_attempts {
                        warn!(
                            "{} failed after {} attempts: {}",
                            label, attempt, error
                        );
                        return Err(error);
                    }

                    let backoff = self.calculate_backoff(attempt);
                    debug!(
                        "{} attempt {} failed: {}. Retrying in {:?}",
                        label, attempt, error, backoff
                    );

                    sleep(backoff).await;
                }
            }
        }
    }

    /// Exponential backoff capped at the configured maximum, plus up to 25%
    /// jitter.
    fn calculate_backoff(&self, attempt: u32) -> Duration {
        let base = self.config.backoff_base().as_millis() as u64;
        let max = self.config.backoff_max().as_millis() as u64;

        let exponential = base.saturating_mul(2u64.saturating_pow(attempt - 1));
        let capped = exponential.min(max);
        let jitter = (capped as f64 * rand::random::<f64>() * 0.25) as u64;

        Duration::from_millis(capped + jitter)
    }
}
