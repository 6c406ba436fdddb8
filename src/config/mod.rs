//! Configuration management for vidferry
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. `VIDFERRY__*` environment variables
//! 4. The deployment variables `R2_ENDPOINT`, `R2_ACCESS_KEY_ID`,
//!    `R2_SECRET_ACCESS_KEY`, `R2_BUCKET_NAME` and `PORT` (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use vidferry::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Server listening on: {}", config.server.bind_addr);
//! ```
//!
//! # Environment Variables
//!
//! Any setting can be overridden with the pattern `VIDFERRY__<section>__<key>`:
//! - `VIDFERRY__FETCHER__MAX_RETRIES=5`
//! - `VIDFERRY__FETCHER__COOKIES_PATH=/etc/vidferry/cookies.txt`
//! - `VIDFERRY__LOGGING__FILE=/var/log/vidferry.log`
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/vidferry.toml`.
//! This can be overridden using the `VIDFERRY_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use models::{
    Config, FetcherConfig, LoggingConfig, PacingConfig, ServerConfig, StorageConfig,
};
pub use sources::apply_deployment_env;
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file is malformed
    /// - `PORT` is not a number
    /// - Validation fails (zero retries, inverted delay windows, etc.)
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path, ignoring deployment variables
    ///
    /// Useful for testing with custom configuration files.
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}
