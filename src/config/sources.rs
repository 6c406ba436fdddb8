use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "VIDFERRY_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/vidferry.toml";
const ENV_PREFIX: &str = "VIDFERRY";
const ENV_SEPARATOR: &str = "__";

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if exists)
/// 3. Environment variables from .env file (via dotenvy)
/// 4. System environment variables (highest priority)
pub fn load() -> Result<Config, ConfigError> {
    // Load .env file if it exists (ignore errors if file doesn't exist)
    let _ = dotenvy::dotenv();

    let config_path = env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    let mut config = load_from_sources(config_path)?;

    apply_deployment_env(&mut config, |name| env::var(name).ok())?;

    Ok(config)
}

/// Apply the well-known deployment variables on top of the layered config
///
/// Storage credentials are only ever read here, never from TOML. `PORT`
/// replaces the port of `server.bind_addr` and keeps its host.
pub fn apply_deployment_env<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let lookup = |name: &str| lookup(name).filter(|value| !value.is_empty());

    if let Some(endpoint) = lookup("R2_ENDPOINT") {
        config.storage.endpoint = Some(endpoint);
    }
    if let Some(bucket) = lookup("R2_BUCKET_NAME") {
        config.storage.bucket = Some(bucket);
    }
    if let Some(access_key) = lookup("R2_ACCESS_KEY_ID") {
        config.storage.access_key = Some(access_key);
    }
    if let Some(secret_key) = lookup("R2_SECRET_ACCESS_KEY") {
        config.storage.secret_key = Some(secret_key);
    }

    // Alternative: AWS-style environment variable names
    if config.storage.access_key.is_none() {
        config.storage.access_key = lookup("AWS_ACCESS_KEY_ID");
    }
    if config.storage.secret_key.is_none() {
        config.storage.secret_key = lookup("AWS_SECRET_ACCESS_KEY");
    }

    if let Some(port) = lookup("PORT") {
        let port: u16 = port
            .parse()
            .map_err(|_| ConfigError::Message(format!("PORT is not a valid port: {port}")))?;
        config.server.bind_addr.set_port(port);
    }

    Ok(())
}

/// Load configuration from a specific path and environment
/// Useful for testing with custom config files
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::debug!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // VIDFERRY__FETCHER__MAX_RETRIES -> fetcher.max_retries
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    let config = builder.build()?;
    config.try_deserialize()
}
