//! In-place retry for consumer-side processing.
//!
//! A handler that fails on a transient error is retried with exponential
//! backoff before the message is handed back to the transport for
//! redelivery (and, eventually, dead-lettering).

use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Bounded exponential backoff policy.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Backoff before the second attempt; doubles on each retry.
    pub initial_backoff: Duration,
    /// Cap on the backoff growth.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Run `operation` until it succeeds or `max_attempts` is exhausted.
    ///
    /// `context` names the operation in logs (e.g. `"dispatch:task.created"`).
    pub async fn run<F, Fut, T, E>(&self, context: &str, operation: F) -> Result<T, E>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt = 0;
        let mut backoff = self.initial_backoff;

        loop {
            attempt += 1;

            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(context = %context, attempt, "Operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) => {
                    if attempt >= self.max_attempts {
                        warn!(
                            context = %context,
                            attempts = attempt,
                            error = %e,
                            "Operation failed, retries exhausted"
                        );
                        return Err(e);
                    }

                    warn!(
                        context = %context,
                        attempt,
                        max_attempts = self.max_attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Operation failed, backing off before retry"
                    );

                    sleep(backoff).await;
                    backoff = std::cmp::min(backoff * 2, self.max_backoff);
                }
            }
        }
    }
}
