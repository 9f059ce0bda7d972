//! # cloudgate-core
//!
//! Core library for cloudgate providing:
//! - Retry orchestration with bounded, jittered exponential backoff
//! - Cancellation and deadline handling for orchestrated calls
//! - Runtime configuration types (API endpoint, network, retry policies)
//! - Configuration loading with file and environment precedence

pub mod config;
pub mod error;
pub mod retry;
pub mod types;

pub use config::ConfigLoader;
pub use error::{Error, Result};
pub use types::{RetryConfig, RuntimeConfig};
