//! Retry orchestration with bounded, jittered exponential backoff
//!
//! This module wraps any zero-argument async operation and re-invokes it on
//! failure until it succeeds, the predicate rejects the error, the attempts
//! run out, or the caller's context is cancelled.
//!
//! # Features
//!
//! - Exponential backoff with optional additive jitter, capped at `max-delay-ms`
//! - Pluggable retryability via the `RetryPredicate` trait
//! - Observable retry attempts via the `RetryObserver` trait
//! - Interruptible attempts and waits through `RetryContext`
//! - Builder pattern for flexible executor configuration
//!
//! # Example
//!
//! ```rust,no_run
//! use cloudgate_core::retry::{retry_with_config, RetryContext, RetryError};
//! use cloudgate_core::types::RetryConfig;
//!
//! async fn example() -> Result<String, RetryError<std::io::Error>> {
//!     let config = RetryConfig::default();
//!     let ctx = RetryContext::new();
//!
//!     retry_with_config(&config, &ctx, || async {
//!         Ok("success".to_string())
//!     }).await
//! }
//! ```

mod context;
mod error;
mod executor;
mod observer;
mod strategies;

pub use context::{CancelReason, RetryContext};
pub use error::RetryError;
pub use executor::{retry_with_config, RetryExecutor, RetryExecutorBuilder, RetryState};
pub use observer::{NoOpObserver, RetryObserver, StatsObserver, TracingObserver};
pub use strategies::{calculate_delay, AlwaysRetry, ClosurePredicate, NeverRetry, RetryPredicate};
