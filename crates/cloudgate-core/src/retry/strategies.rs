//! Backoff delay computation and retry predicates

use crate::types::RetryConfig;
use rand::Rng;
use std::time::Duration;

/// Share of the current delay added at most as jitter
const JITTER_RATIO: f64 = 0.10;

/// Calculate the wait before the n-th retry
///
/// `attempt` is the 1-indexed sleep count; 0 is treated as 1. The delay is
/// `base_delay * backoff_factor^(attempt-1)`. With `jitter`, a uniform random
/// amount in `[0, 10%]` of that delay is added. The result never exceeds
/// `max_delay`, and values too large to represent saturate at it.
///
/// # Example
///
/// ```rust
/// use cloudgate_core::retry::calculate_delay;
/// use cloudgate_core::types::RetryConfig;
///
/// let config = RetryConfig {
///     max_retries: 3,
///     base_delay_ms: 1000,
///     max_delay_ms: 30000,
///     backoff_factor: 2.0,
///     jitter: false,
/// };
///
/// assert_eq!(calculate_delay(&config, 1, false).as_millis(), 1000);
/// assert_eq!(calculate_delay(&config, 2, false).as_millis(), 2000);
/// ```
pub fn calculate_delay(config: &RetryConfig, attempt: u32, jitter: bool) -> Duration {
    let exponent = attempt.max(1) - 1;
    let max_ms = config.max_delay_ms as f64;

    let mut delay_ms = config.base_delay_ms as f64 * config.backoff_factor.powf(exponent as f64);

    // Jitter only ever increases the delay, so a value already at the cap stays there
    if !delay_ms.is_finite() || delay_ms >= max_ms {
        return config.max_delay();
    }

    if jitter {
        let bound = delay_ms * JITTER_RATIO;
        if bound > 0.0 {
            delay_ms += rand::rng().random_range(0.0..=bound);
        }
    }

    Duration::from_nanos((delay_ms * 1_000_000.0) as u64).min(config.max_delay())
}

/// A predicate that determines whether an error should be retried
///
/// # Example
///
/// ```rust
/// use cloudgate_core::retry::RetryPredicate;
/// use std::io::{Error, ErrorKind};
///
/// struct IoRetryPredicate;
///
/// impl RetryPredicate<Error> for IoRetryPredicate {
///     fn should_retry(&self, error: &Error) -> bool {
///         matches!(error.kind(), ErrorKind::TimedOut | ErrorKind::ConnectionReset)
///     }
/// }
/// ```
pub trait RetryPredicate<E: ?Sized>: Send + Sync {
    /// Determine whether the given error should be retried
    fn should_retry(&self, error: &E) -> bool;
}

/// A predicate that always returns true (all errors are retryable)
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysRetry;

impl<E: ?Sized> RetryPredicate<E> for AlwaysRetry {
    fn should_retry(&self, _error: &E) -> bool {
        true
    }
}

/// A predicate that never retries (no errors are retryable)
#[derive(Debug, Clone, Copy)]
pub struct NeverRetry;

impl<E: ?Sized> RetryPredicate<E> for NeverRetry {
    fn should_retry(&self, _error: &E) -> bool {
        false
    }
}

/// A predicate that uses a closure to determine retryability
pub struct ClosurePredicate<F> {
    predicate: F,
}

impl<F> ClosurePredicate<F> {
    pub fn new(predicate: F) -> Self {
        Self { predicate }
    }
}

impl<E, F> RetryPredicate<E> for ClosurePredicate<F>
where
    F: Fn(&E) -> bool + Send + Sync,
{
    fn should_retry(&self, error: &E) -> bool {
        (self.predicate)(error)
    }
}
