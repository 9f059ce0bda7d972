//! Common test infrastructure for cloudgate-client tests
//!
//! # Usage
//!
//! ```ignore
//! mod common;
//! use common::*;
//! ```
//!
//! # Modules
//!
//! - `constants`: tokens, user agent, paths shared by tests
//! - `mock_server`: wiremock setup helpers and client constructors

#![allow(dead_code)]

pub mod constants;
pub mod mock_server;

pub use constants::*;
pub use mock_server::*;
