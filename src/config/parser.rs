use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// Environment overrides (see [`apply_env_overrides`]) are applied on top of
/// the file before validation.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use gamescout::config::load_config;
///
/// let config = load_config(Path::new("gamescout.toml")).unwrap();
/// println!("Polling every {}s", config.scheduler.poll_interval_secs);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut config = parse_config(&content)?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate(&config)?;
    Ok(config)
}

/// Parses configuration from TOML text without validating it
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Applies the deployment environment variables on top of a parsed config
///
/// Recognized variables:
///
/// | Variable | Setting |
/// |----------|---------|
/// | `HTML_SCRAPER_SERVICE_HOST` | `scraper.host` |
/// | `HTML_SCRAPER_SERVICE_PORT` | `scraper.port` |
/// | `RABBITMQ_PUBSUB_CONNECTION` | `queue.connection` |
/// | `GAMES_QUEUE_NAME` | `queue.name` |
/// | `TASK_INTERVAL` | `scheduler.poll-interval-secs` |
/// | `DATABASE_PATH` | `storage.database-path` |
/// | `CRAWLER_NODE_ID` | `node.identity` |
///
/// # Arguments
///
/// * `config` - The configuration to modify
/// * `lookup` - Variable lookup, `std::env::var` in production
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(host) = lookup("HTML_SCRAPER_SERVICE_HOST") {
        config.scraper.host = host;
    }
    if let Some(port) = lookup("HTML_SCRAPER_SERVICE_PORT") {
        config.scraper.port = parse_number("HTML_SCRAPER_SERVICE_PORT", &port)?;
    }
    if let Some(connection) = lookup("RABBITMQ_PUBSUB_CONNECTION") {
        config.queue.connection = Some(connection);
    }
    if let Some(name) = lookup("GAMES_QUEUE_NAME") {
        config.queue.name = name;
    }
    if let Some(interval) = lookup("TASK_INTERVAL") {
        config.scheduler.poll_interval_secs = parse_number("TASK_INTERVAL", &interval)?;
    }
    if let Some(path) = lookup("DATABASE_PATH") {
        config.storage.database_path = path;
    }
    if let Some(identity) = lookup("CRAWLER_NODE_ID") {
        config.node.identity = Some(identity);
    }
    Ok(())
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| {
        ConfigError::Validation(format!("{} must be a number, got '{}'", key, value))
    })
}

/// Computes a SHA-256 hash of the configuration file content
///
/// This is used to correlate crawler runs with the configuration they used.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}
