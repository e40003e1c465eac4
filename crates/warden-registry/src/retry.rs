//! Cancellable backoff combinator.
//!
//! Runs an operation up to `max_attempts` times. The wait before attempt
//! `i` (zero-based) is `i * base_delay`, so the default policy waits 0s, 5s,
//! then 10s. Only errors accepted by the `is_retryable` predicate trigger
//! another attempt; anything else is returned immediately.
//!
//! Both the backoff sleep and the in-flight operation race against the
//! caller's [`CancellationToken`]; cancellation drops the in-flight future
//! and returns [`RetryError::Cancelled`] without waiting.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Default number of attempts, including the first.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default linear backoff step.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(5);

/// Attempt bound and linear backoff step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Values below 1 are treated as 1.
    pub max_attempts: u32,
    /// Delay multiplied by the attempt index before each retry.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Wait before the zero-based attempt `attempt_index`.
    pub fn delay_before(&self, attempt_index: u32) -> Duration {
        self.base_delay.saturating_mul(attempt_index)
    }

    /// Sum of all waits when every attempt is used.
    pub fn total_backoff(&self) -> Duration {
        (0..self.max_attempts.max(1))
            .map(|i| self.delay_before(i))
            .fold(Duration::ZERO, Duration::saturating_add)
    }
}

/// Why a retried operation did not produce a value.
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    /// Every attempt failed with a retryable error.
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted {
        /// Attempts made.
        attempts: u32,
        /// The final retryable error.
        last: E,
    },
    /// A non-retryable error ended the sequence.
    #[error("{0}")]
    Fatal(E),
    /// The caller cancelled while waiting or while an attempt was in flight.
    #[error("operation cancelled")]
    Cancelled,
}

/// Run `op` under `policy`, retrying errors for which `is_retryable` holds.
///
/// `op` receives the zero-based attempt index.
pub async fn retry_with_backoff<T, E, Op, Fut, P>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    is_retryable: P,
    mut op: Op,
) -> Result<T, RetryError<E>>
where
    Op: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let attempts = policy.max_attempts.max(1);
    for attempt in 0..attempts {
        let delay = policy.delay_before(attempt);
        if !delay.is_zero() {
            tracing::warn!(
                attempt = attempt + 1,
                max_attempts = attempts,
                "retrying in {delay:?}"
            );
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RetryError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RetryError::Cancelled),
            outcome = op(attempt) => outcome,
        };

        match outcome {
            Ok(value) => return Ok(value),
            Err(e) if is_retryable(&e) => {
                if attempt + 1 == attempts {
                    return Err(RetryError::Exhausted { attempts, last: e });
                }
                tracing::warn!(attempt = attempt + 1, error = %e, "retryable failure");
            }
            Err(e) => return Err(RetryError::Fatal(e)),
        }
    }
    Err(RetryError::Cancelled)
}
