//! Retry policy with quadratic backoff.
//!
//! Used while the services wait for the database and broker at startup:
//! the delay before retry `n` (zero-based) is `initial_delay * (n + 1)^2`,
//! capped at `max_delay`, which gives 1s, 4s, 9s, 16s for five attempts.
//!
//! # Example
//!
//! ```ignore
//! let pool = retry_with_backoff(RetryPolicy::startup(5), || {
//!     PgPoolOptions::new().connect(&url)
//! })
//! .await?;
//! ```

use std::time::Duration;
use tokio::time::sleep;

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt
    pub max_retries: usize,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Startup dependency policy: `attempts` tries in total, one second
    /// scaled quadratically between them.
    #[must_use]
    pub const fn startup(attempts: usize) -> Self {
        Self {
            max_retries: attempts.saturating_sub(1),
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }

    /// Calculate delay for a given (zero-based) retry attempt.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let step = u32::try_from(attempt + 1).unwrap_or(u32::MAX);
        self.initial_delay
            .checked_mul(step.saturating_mul(step))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

/// Retry an async operation according to `policy`.
///
/// Every failure is logged at `warn` with the upcoming delay; the final
/// failure is logged at `error` and returned.
///
/// # Errors
///
/// Returns the last error once all retries are exhausted.
pub async fn retry_with_backoff<F, Fut, T, E>(policy: RetryPolicy, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::info!(attempt, "Operation succeeded after retry");
                }
                return Ok(result);
            },
            Err(err) => {
                if attempt >= policy.max_retries {
                    tracing::error!(attempt, error = %err, "Operation failed after max retries");
                    return Err(err);
                }

                let delay = policy.delay_for_attempt(attempt);
                tracing::warn!(
                    attempt,
                    delay_ms = delay.as_millis(),
                    error = %err,
                    "Operation failed, retrying..."
                );

                sleep(delay).await;
                attempt += 1;
            },
        }
    }
}
