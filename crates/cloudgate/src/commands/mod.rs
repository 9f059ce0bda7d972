//! CLI command implementations

pub mod config;
pub mod request;

use anyhow::{Context, Result};
use camino::Utf8Path;
use cloudgate_core::{ConfigLoader, RuntimeConfig};

/// Loader for `--config` when given, the standard location otherwise
pub(crate) fn loader(config_path: Option<&Utf8Path>) -> Result<ConfigLoader> {
    match config_path {
        Some(path) => Ok(ConfigLoader::with_file(path.to_path_buf())),
        None => ConfigLoader::new().context("Failed to locate the configuration directory"),
    }
}

pub(crate) fn load_config(config_path: Option<&Utf8Path>) -> Result<RuntimeConfig> {
    let loader = loader(config_path)?;
    loader
        .load()
        .with_context(|| format!("Failed to load configuration from {}", loader.config_path()))
}
