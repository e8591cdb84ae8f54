use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "HARVESTRELAY_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/harvestrelay.toml";
const ENV_PREFIX: &str = "HARVESTRELAY";
const ENV_SEPARATOR: &str = "__";
const DISPATCH_TOKEN_ENV_VAR: &str = "HARVESTRELAY_DISPATCH_TOKEN";

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if exists)
/// 3. Environment variables from .env file (via dotenvy)
/// 4. System environment variables (highest priority)
///
/// An explicit `config_path` takes precedence over `HARVESTRELAY_CONFIG`.
pub fn load(config_path: Option<PathBuf>) -> Result<Config, ConfigError> {
    // A missing .env file is not an error
    let _ = dotenvy::dotenv();

    let config_path = config_path.unwrap_or_else(|| {
        env::var(CONFIG_ENV_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
    });

    let mut config = load_from_sources(config_path)?;

    load_secrets(&mut config);

    Ok(config)
}

/// Secrets are never read from TOML files, only from the environment
fn load_secrets(config: &mut Config) {
    if let Ok(token) = env::var(DISPATCH_TOKEN_ENV_VAR) {
        if !token.is_empty() {
            config.dispatch.auth_token = Some(token);
        }
    }
}

/// Load configuration from a specific path and environment
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::warn!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // HARVESTRELAY__RUNNER__BUDGET -> runner.budget
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    let config = builder.build()?;
    config.try_deserialize()
}
