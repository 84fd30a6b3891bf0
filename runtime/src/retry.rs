//! Retry logic with exponential backoff for transient failures.
//!
//! Used by the synchronization worker to retry document writes before
//! reporting them as failed.
//!
//! # Example
//!
//! ```rust
//! use tasklists_runtime::retry::{RetryPolicy, retry_with_predicate};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let policy = RetryPolicy::builder()
//!     .max_retries(2)
//!     .initial_delay(Duration::from_millis(10))
//!     .build();
//!
//! let value = retry_with_predicate(&policy, || async { Ok::<_, String>(42) }, |_| true)
//!     .await
//!     .map_err(|exhausted| exhausted.error)?;
//! assert_eq!(value, 42);
//! # Ok(())
//! # }
//! ```

use std::time::Duration;
use tokio::time::sleep;

/// Retry policy configuration for exponential backoff.
///
/// # Default Values
///
/// - `max_retries`: 3
/// - `initial_delay`: 100ms
/// - `max_delay`: 5 seconds
/// - `multiplier`: 2.0 (delay doubles each retry)
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: usize,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Cap for the exponential backoff
    pub max_delay: Duration,
    /// Backoff multiplier
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
    /// Create a new policy builder.
    #[must_use]
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder {
            policy: Self::default(),
        }
    }

    /// A policy that never retries.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            multiplier: 1.0,
        }
    }

    /// Delay before retry number `attempt` (0-based).
    ///
    /// `initial_delay * multiplier^attempt`, capped at `max_delay`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay_ms = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        if !delay_ms.is_finite() {
            return self.max_delay;
        }
        Duration::from_millis(delay_ms as u64).min(self.max_delay)
    }
}

/// Builder for [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct RetryPolicyBuilder {
    policy: RetryPolicy,
}

impl RetryPolicyBuilder {
    /// Set maximum number of retries.
    #[must_use]
    pub const fn max_retries(mut self, max_retries: usize) -> Self {
        self.policy.max_retries = max_retries;
        self
    }

    /// Set initial delay before first retry.
    #[must_use]
    pub const fn initial_delay(mut self, delay: Duration) -> Self {
        self.policy.initial_delay = delay;
        self
    }

    /// Set maximum delay (cap for exponential backoff).
    #[must_use]
    pub const fn max_delay(mut self, delay: Duration) -> Self {
        self.policy.max_delay = delay;
        self
    }

    /// Set multiplier for exponential backoff.
    #[must_use]
    pub const fn multiplier(mut self, multiplier: f64) -> Self {
        self.policy.multiplier = multiplier;
        self
    }

    /// Build the [`RetryPolicy`].
    #[must_use]
    pub fn build(self) -> RetryPolicy {
        self.policy
    }
}

/// The last error of an operation that never succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exhausted<E> {
    /// Error of the final attempt
    pub error: E,
    /// Attempts made, including the first
    pub attempts: usize,
}

/// Retry an async operation while `is_retryable` accepts its error.
///
/// # Errors
///
/// Returns [`Exhausted`] with the final error when retries run out or the
/// error is not retryable.
pub async fn retry_with_predicate<F, Fut, T, E, P>(
    policy: &RetryPolicy,
    mut operation: F,
    is_retryable: P,
) -> Result<T, Exhausted<E>>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::info!(attempt, "Operation succeeded after retry");
                    metrics::counter!("retry.recovered").increment(1);
                }
                return Ok(result);
            },
            Err(error) => {
                if !is_retryable(&error) {
                    tracing::warn!(error = %error, "Error is not retryable, failing immediately");
                    return Err(Exhausted {
                        error,
                        attempts: attempt + 1,
                    });
                }

                if attempt >= policy.max_retries {
                    tracing::error!(attempt, error = %error, "Operation failed after max retries");
                    metrics::counter!("retry.exhausted").increment(1);
                    return Err(Exhausted {
                        error,
                        attempts: attempt + 1,
                    });
                }

                let delay = policy.delay_for_attempt(attempt);
                tracing::warn!(
                    attempt,
                    delay_ms = delay.as_millis(),
                    error = %error,
                    "Operation failed, retrying"
                );
                sleep(delay).await;
                attempt += 1;
            },
        }
    }
}
