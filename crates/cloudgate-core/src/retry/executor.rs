//! Retry execution engine
//!
//! This module provides the core retry loop. Attempts run strictly one after
//! another; every attempt and every inter-attempt wait is raced against the
//! caller's [`RetryContext`].

use std::error::Error;
use std::future::Future;

use tokio::time::Instant;
use tracing::trace;

use crate::types::RetryConfig;

use super::context::{CancelReason, RetryContext};
use super::error::RetryError;
use super::observer::{NoOpObserver, RetryObserver};
use super::strategies::{calculate_delay, AlwaysRetry, RetryPredicate};

/// Lifecycle of one orchestrated call
///
/// ```text
/// Attempting -> Succeeded | Waiting | FailedTerminal | Cancelled
/// Waiting    -> Attempting | Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    /// An attempt is in flight
    Attempting,
    /// Sleeping before the next attempt
    Waiting,
    Succeeded,
    /// Attempts exhausted or the error was not retryable
    FailedTerminal,
    Cancelled,
}

impl RetryState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RetryState::Succeeded | RetryState::FailedTerminal | RetryState::Cancelled
        )
    }

    /// Whether the state machine allows moving from `self` to `next`
    pub fn can_transition_to(self, next: RetryState) -> bool {
        use RetryState::*;
        matches!(
            (self, next),
            (Attempting, Succeeded)
                | (Attempting, Waiting)
                | (Attempting, FailedTerminal)
                | (Attempting, Cancelled)
                | (Waiting, Attempting)
                | (Waiting, Cancelled)
        )
    }
}

/// Execute an async operation with retry logic based on a config
///
/// Every error is treated as retryable and nothing is observed. For a
/// predicate or an observer, use `RetryExecutorBuilder`.
///
/// # Example
///
/// ```rust,no_run
/// use cloudgate_core::retry::{retry_with_config, RetryContext};
/// use cloudgate_core::types::RetryConfig;
///
/// async fn example() {
///     let config = RetryConfig::default();
///     let ctx = RetryContext::new();
///
///     let result = retry_with_config(&config, &ctx, || async {
///         Ok::<_, std::io::Error>("success")
///     })
///     .await;
/// }
/// ```
pub async fn retry_with_config<F, Fut, T, E>(
    config: &RetryConfig,
    ctx: &RetryContext,
    op: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Error + Send + 'static,
{
    RetryExecutorBuilder::new()
        .with_config(config.clone())
        .build()
        .execute(ctx, op)
        .await
}

/// Builder for configuring a `RetryExecutor`
///
/// # Example
///
/// ```rust
/// use cloudgate_core::retry::{RetryExecutorBuilder, TracingObserver};
/// use cloudgate_core::types::RetryConfig;
///
/// let executor = RetryExecutorBuilder::new()
///     .with_config(RetryConfig::default())
///     .with_observer(TracingObserver::new("list_instances"))
///     .with_jitter(false)
///     .build();
/// ```
pub struct RetryExecutorBuilder<P = AlwaysRetry, O = NoOpObserver> {
    config: RetryConfig,
    predicate: P,
    observer: O,
}

impl Default for RetryExecutorBuilder<AlwaysRetry, NoOpObserver> {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryExecutorBuilder<AlwaysRetry, NoOpObserver> {
    pub fn new() -> Self {
        Self {
            config: RetryConfig::default(),
            predicate: AlwaysRetry,
            observer: NoOpObserver,
        }
    }
}

impl<P, O> RetryExecutorBuilder<P, O> {
    pub fn with_config(mut self, config: RetryConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the predicate that decides whether an error is retried
    pub fn with_predicate<P2>(self, predicate: P2) -> RetryExecutorBuilder<P2, O> {
        RetryExecutorBuilder {
            config: self.config,
            predicate,
            observer: self.observer,
        }
    }

    pub fn with_observer<O2>(self, observer: O2) -> RetryExecutorBuilder<P, O2> {
        RetryExecutorBuilder {
            config: self.config,
            predicate: self.predicate,
            observer,
        }
    }

    /// Override the config's jitter flag
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.config.jitter = jitter;
        self
    }

    pub fn build(self) -> RetryExecutor<P, O> {
        RetryExecutor {
            config: self.config,
            predicate: self.predicate,
            observer: self.observer,
        }
    }
}

/// A retry executor with configurable config, predicate, and observer
///
/// Use `RetryExecutorBuilder` to create an instance.
pub struct RetryExecutor<P, O> {
    config: RetryConfig,
    predicate: P,
    observer: O,
}

impl<P, O> RetryExecutor<P, O>
where
    O: RetryObserver,
{
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Run `op` until it succeeds, fails terminally, or `ctx` is done
    ///
    /// At most `max_retries + 1` attempts are made. An attempt that is still
    /// in flight when `ctx` fires is dropped and does not count.
    pub async fn execute<F, Fut, T, E>(
        &self,
        ctx: &RetryContext,
        mut op: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Error + Send + 'static,
        P: RetryPredicate<E>,
    {
        let start = Instant::now();
        let max_attempts = self.config.total_attempts();
        let mut state = RetryState::Attempting;
        let mut completed: u32 = 0;
        let mut last_error: Option<E> = None;
        let mut attempt: u32 = 1;

        loop {
            if let Some(reason) = ctx.cancel_reason() {
                advance(&mut state, RetryState::Cancelled, attempt);
                return Err(self.cancelled(completed, reason, last_error));
            }
            if attempt > 1 {
                advance(&mut state, RetryState::Attempting, attempt);
            }
            self.observer.on_attempt_start(attempt, max_attempts);

            let outcome = tokio::select! {
                biased;
                reason = ctx.done() => Err(reason),
                result = op() => Ok(result),
            };
            let result = match outcome {
                Ok(result) => result,
                Err(reason) => {
                    advance(&mut state, RetryState::Cancelled, attempt);
                    return Err(self.cancelled(completed, reason, last_error));
                }
            };
            completed = attempt;

            let err = match result {
                Ok(value) => {
                    advance(&mut state, RetryState::Succeeded, attempt);
                    self.observer.on_success(attempt, start.elapsed());
                    return Ok(value);
                }
                Err(err) => err,
            };

            if attempt >= max_attempts {
                advance(&mut state, RetryState::FailedTerminal, attempt);
                self.observer.on_exhausted(attempt, &err);
                return Err(RetryError::exhausted(attempt, err, start.elapsed()));
            }

            if !self.predicate.should_retry(&err) {
                advance(&mut state, RetryState::FailedTerminal, attempt);
                self.observer.on_non_retryable(attempt, &err);
                return Err(RetryError::non_retryable(attempt, err));
            }

            let delay = calculate_delay(&self.config, attempt, self.config.jitter);
            advance(&mut state, RetryState::Waiting, attempt);
            self.observer.on_attempt_failed(attempt, &err, delay);

            if !delay.is_zero() {
                tokio::select! {
                    biased;
                    reason = ctx.done() => {
                        advance(&mut state, RetryState::Cancelled, attempt);
                        return Err(self.cancelled(completed, reason, Some(err)));
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            last_error = Some(err);
            attempt += 1;
        }
    }

    fn cancelled<E>(&self, attempts: u32, reason: CancelReason, last_error: Option<E>) -> RetryError<E>
    where
        E: Error + 'static,
    {
        self.observer
            .on_cancelled(attempts, reason, last_error.as_ref().map(|e| e as &dyn Error));
        RetryError::cancelled(attempts, reason, last_error)
    }
}

fn advance(state: &mut RetryState, next: RetryState, attempt: u32) {
    debug_assert!(
        state.can_transition_to(next),
        "invalid retry transition {:?} -> {:?}",
        state,
        next
    );
    trace!(from = ?*state, to = ?next, attempt, "retry state");
    *state = next;
}
