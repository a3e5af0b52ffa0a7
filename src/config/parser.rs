use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Reads, parses and validates the configuration file at `path`
///
/// Missing sections and keys fall back to their defaults, so an empty file is
/// a valid configuration.
///
/// ```no_run
/// use std::path::Path;
/// use sintegra_queue::config::load_config;
///
/// let config = load_config(Path::new("pipeline.toml")).unwrap();
/// println!("Queue: {}", config.broker.queue_name);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration from TOML text
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Hex-encoded SHA-256 of the configuration text
pub fn hash_config_text(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// Hashes the configuration file at `path`
///
/// Logged at startup so producer and worker processes can be checked for
/// running against the same configuration.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(hash_config_text(&content))
}

/// Loads a configuration together with the hash of the exact text parsed
///
/// The file is read once, so the hash can never describe a different version
/// of the file than the one that was loaded.
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config = parse_config(&content)?;
    Ok((config, hash_config_text(&content)))
}
