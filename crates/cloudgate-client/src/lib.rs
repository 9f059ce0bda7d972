//! # cloudgate-client
//!
//! Resilient request layer for the remote cloud API:
//! - [`error`]: the error taxonomy and its retryability rules
//! - [`classify`]: mapping of HTTP error responses onto [`ApiError`]
//! - [`executor`]: one authenticated HTTP exchange per call
//! - [`client`]: the retrying boundary that ties the three together
//!
//! # Example
//!
//! ```rust,no_run
//! use cloudgate_client::{ApiRequest, Client, ClientConfig, RetryContext};
//! use serde_json::Value;
//!
//! async fn example() -> cloudgate_client::Result<Value> {
//!     let client = Client::new(ClientConfig::new("https://api.linode.com/v4", "token"))?;
//!     let ctx = RetryContext::new();
//!
//!     client
//!         .fetch(&ctx, &ApiRequest::get("list_instances", "/linode/instances"))
//!         .await
//! }
//! ```

pub mod classify;
pub mod client;
pub mod error;
pub mod executor;

pub use classify::{classify, parse_retry_after};
pub use client::{Client, ClientConfig};
pub use cloudgate_core::retry::{CancelReason, RetryContext};
pub use cloudgate_core::types::RetryConfig;
pub use error::{ApiError, Error, Result, TaxonomyPredicate};
pub use executor::{ApiRequest, RequestExecutor};
pub use reqwest::Method;
pub use tokio_util::sync::CancellationToken;
