//! Configuration Loader
//!
//! Environment-aware configuration loading. Discovers the base YAML file,
//! merges an optional per-environment override, then applies environment
//! variables, and validates the result before anything else boots.

use std::path::PathBuf;

use tracing::debug;

use super::DialerConfig;
use crate::error::{DialerError, Result};

/// Loaded configuration plus the environment it was resolved for
pub struct ConfigManager {
    config: DialerConfig,
    environment: String,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> Result<Self> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory (defaults to `config/`)
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> Result<Self> {
        let environment = Self::detect_environment();
        let dir = config_dir.unwrap_or_else(|| PathBuf::from("config"));
        let base = dir.join("dialer");
        let overlay = dir.join(format!("dialer.{environment}"));

        debug!(
            environment = %environment,
            directory = %dir.display(),
            "loading dialer configuration"
        );

        let settings = config::Config::builder()
            .add_source(config::File::from(base).required(false))
            .add_source(config::File::from(overlay).required(false))
            .add_source(
                config::Environment::with_prefix("DIALER")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .map_err(|e| DialerError::Configuration(e.to_string()))?;

        let config: DialerConfig = settings
            .try_deserialize()
            .map_err(|e| DialerError::Configuration(e.to_string()))?;

        config.validate()?;

        Ok(Self {
            config,
            environment,
        })
    }

    pub fn config(&self) -> &DialerConfig {
        &self.config
    }

    pub fn into_config(self) -> DialerConfig {
        self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    fn detect_environment() -> String {
        std::env::var("DIALER_ENV")
            .or_else(|_| std::env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
    }
}
