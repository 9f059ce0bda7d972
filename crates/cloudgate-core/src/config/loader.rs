//! Runtime configuration loader with precedence
//!
//! Loads configuration from multiple sources with the following precedence (low to high):
//! 1. Built-in defaults
//! 2. Config file (~/.cloudgate/config.yaml, or an explicit path)
//! 3. Environment variables (CLOUDGATE_* prefix)
//! 4. CLI flags (handled by caller)

use crate::error::{Error, Result};
use crate::types::RuntimeConfig;
use camino::{Utf8Path, Utf8PathBuf};
use std::env;
use std::fs;
use tracing::debug;

/// Name of the config file inside the config directory
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Runtime configuration loader
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Config file to read
    config_path: Utf8PathBuf,

    /// Whether a missing file is an error (explicit paths only)
    required: bool,
}

impl ConfigLoader {
    /// Create a loader for the standard config file (~/.cloudgate/config.yaml)
    pub fn new() -> Result<Self> {
        let config_dir = Self::default_config_dir()?;
        Ok(Self::with_dir(config_dir))
    }

    /// Create a loader reading `config.yaml` from a custom directory
    pub fn with_dir(config_dir: Utf8PathBuf) -> Self {
        Self {
            config_path: config_dir.join(CONFIG_FILE_NAME),
            required: false,
        }
    }

    /// Create a loader for an explicit config file, which must exist
    pub fn with_file(config_path: Utf8PathBuf) -> Self {
        Self {
            config_path,
            required: true,
        }
    }

    /// Get the standard config directory (~/.cloudgate)
    fn default_config_dir() -> Result<Utf8PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::invalid_config("Could not determine home directory"))?;
        let home = Utf8PathBuf::from_path_buf(home)
            .map_err(|_| Error::invalid_config("Home directory is not valid UTF-8"))?;
        Ok(home.join(".cloudgate"))
    }

    /// Load runtime configuration with precedence applied
    pub fn load(&self) -> Result<RuntimeConfig> {
        let mut config = if self.config_path.exists() {
            debug!("Loading configuration from {}", self.config_path);
            Self::load_yaml_file(&self.config_path)?
        } else if self.required {
            return Err(Error::config_not_found(self.config_path.as_str()));
        } else {
            debug!(
                "No configuration file at {}, using defaults",
                self.config_path
            );
            RuntimeConfig::default()
        };

        Self::apply_env_overrides(&mut config)?;

        config.retry.validate()?;
        for (operation, policy) in &config.operations {
            policy.validate().map_err(|e| {
                Error::invalid_config(format!("operations.{}: {}", operation, e))
            })?;
        }

        Ok(config)
    }

    /// Load a YAML file and parse it
    fn load_yaml_file(path: &Utf8Path) -> Result<RuntimeConfig> {
        let content = fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(RuntimeConfig::default());
        }
        Ok(serde_yaml_ng::from_str(&content)?)
    }

    /// Apply environment variable overrides to runtime config
    fn apply_env_overrides(config: &mut RuntimeConfig) -> Result<()> {
        if let Ok(val) = env::var("CLOUDGATE_API_URL") {
            config.api.base_url = val;
        }

        if let Ok(val) = env::var("CLOUDGATE_TOKEN") {
            config.api.token = val;
        }

        if let Ok(val) = env::var("CLOUDGATE_REQUEST_TIMEOUT_SECS") {
            config.network.request_timeout_secs = val.parse().map_err(|_| {
                Error::invalid_config("CLOUDGATE_REQUEST_TIMEOUT_SECS must be a valid number")
            })?;
        }

        if let Ok(val) = env::var("CLOUDGATE_MAX_RETRIES") {
            config.retry.max_retries = val.parse().map_err(|_| {
                Error::invalid_config("CLOUDGATE_MAX_RETRIES must be a valid number")
            })?;
        }

        if let Ok(val) = env::var("CLOUDGATE_USER_AGENT") {
            config.network.user_agent = val;
        }

        Ok(())
    }

    /// Get the config file path
    pub fn config_path(&self) -> &Utf8Path {
        &self.config_path
    }
}
