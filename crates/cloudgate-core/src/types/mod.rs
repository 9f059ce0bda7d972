//! Type definitions for cloudgate configuration

mod runtime_config;

pub use runtime_config::*;
