//! Configuration management for harvestrelay
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use harvestrelay::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Budget per execution: {}", config.runner.budget);
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `HARVESTRELAY__<section>__<key>`
//!
//! Examples:
//! - `HARVESTRELAY__RUNNER__BUDGET=30s`
//! - `HARVESTRELAY__DISPATCH__MODE=in_process`
//! - `HARVESTRELAY__DISPATCH__ENDPOINT=https://workers.internal`
//!
//! The worker endpoint secret is only read from `HARVESTRELAY_DISPATCH_TOKEN`.
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/harvestrelay.toml`.
//! This can be overridden using the `HARVESTRELAY_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use crate::humanize::HumanDuration;
pub use models::{
    Config, DispatchConfig, DispatchTarget, FetcherConfig, LedgerConfig, RunnerConfig,
    ServerConfig, SinkConfig, SinkProvider,
};
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
    /// Returns an error if the configuration file is malformed or validation
    /// fails (zero budget, missing dispatch endpoint, unknown fetcher kind).
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(None)
    }

    /// Like [`Config::load`], reading the TOML file from `config_path` if given
    pub fn load_with(config_path: Option<std::path::PathBuf>) -> Result<Self, ConfigError> {
        let config = sources::load(config_path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_minimal_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[fetchers.feed]
kind = "json_feed"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = Config::load_from_path(config_path).unwrap();
        assert_eq!(config.fetchers.len(), 1);
        assert_eq!(config.dispatch.worker_name, "async-fetch");
    }

    #[test]
    fn test_validation_catches_missing_endpoint() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[dispatch]
target = "http"

[fetchers.feed]
kind = "json_feed"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let result = Config::load_from_path(config_path);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::ValidationError(ValidationError::MissingEndpoint)
        ));
    }

    #[test]
    fn test_validation_requires_fetchers() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("empty.toml");
        fs::write(&config_path, "").unwrap();

        let result = Config::load_from_path(config_path);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::ValidationError(ValidationError::NoFetchersConfigured)
        ));
    }
}
