//! Bounded retry with exponential backoff for downstream commit calls.
//!
//! The confirm-payment workflow must not give up on a transient collaborator
//! failure after the local SUCCESS flip, but it must also terminate: on
//! budget exhaustion the caller records a reconciliation task instead of
//! retrying forever.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

/// Retry policy for downstream calls.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts after the initial call.
    pub max_retries: usize,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Cap for the exponential backoff.
    pub max_delay: Duration,
    /// Backoff multiplier per attempt.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries, for tests that exercise failure paths.
    pub fn no_retries() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
            multiplier: 1.0,
        }
    }

    /// Calculates the delay before retry number `attempt` (zero-based),
    /// capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let delay_ms =
            self.initial_delay.as_millis() as f64 * self.multiplier.powi(attempt as i32);
        let delay = Duration::from_millis(delay_ms as u64);
        delay.min(self.max_delay)
    }
}

/// Runs `operation` until it succeeds or the retry budget is exhausted,
/// returning the last error in that case.
pub async fn retry_with_backoff<T, E, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < policy.max_retries => {
                let delay = policy.delay_for_attempt(attempt);
                tracing::warn!(
                    error = %e,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "retrying after transient failure"
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
