use crate::config::types::{BrokerConfig, Config, FetcherConfig, PersistenceConfig, StatusConfig};
use crate::retry::RetryPolicy;
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_broker_config(&config.broker)?;
    validate_status_config(&config.status)?;
    validate_fetcher_config(&config.fetcher)?;
    validate_persistence_config(&config.persistence)?;
    validate_lease_covers_fetch(&config.broker, &config.fetcher)?;
    Ok(())
}

/// Validates broker configuration
fn validate_broker_config(config: &BrokerConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "broker database_path cannot be empty".to_string(),
        ));
    }

    if config.queue_name.is_empty() {
        return Err(ConfigError::Validation(
            "queue_name cannot be empty".to_string(),
        ));
    }

    if config.connect_retry_delay_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "connect_retry_delay_ms must be >= 100ms, got {}ms",
            config.connect_retry_delay_ms
        )));
    }

    Ok(())
}

/// Validates status store configuration
fn validate_status_config(config: &StatusConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "status database_path cannot be empty".to_string(),
        ));
    }

    if config.result_ttl_seconds < 1 {
        return Err(ConfigError::Validation(format!(
            "result_ttl_seconds must be >= 1, got {}",
            config.result_ttl_seconds
        )));
    }

    Ok(())
}

/// Validates fetcher configuration
fn validate_fetcher_config(config: &FetcherConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base_url: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "base_url '{}' must use http or https",
            config.base_url
        )));
    }

    // Relative joins drop the last segment otherwise
    if !url.path().ends_with('/') {
        return Err(ConfigError::Validation(format!(
            "base_url '{}' must end with '/'",
            config.base_url
        )));
    }

    if config.request_timeout_seconds < 1 || config.request_timeout_seconds > 300 {
        return Err(ConfigError::Validation(format!(
            "request_timeout_seconds must be between 1 and 300, got {}",
            config.request_timeout_seconds
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates persistence configuration
fn validate_persistence_config(config: &PersistenceConfig) -> Result<(), ConfigError> {
    if config.enabled && config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "persistence database_path cannot be empty when persistence is enabled".to_string(),
        ));
    }

    Ok(())
}

/// A lease must outlive the slowest fetch, or a live job gets redelivered
fn validate_lease_covers_fetch(
    broker: &BrokerConfig,
    fetcher: &FetcherConfig,
) -> Result<(), ConfigError> {
    let policy = RetryPolicy::standard();
    let backoff: u64 = (1..policy.max_attempts)
        .map(|attempt| policy.delay_for(attempt).as_secs())
        .sum();
    let required = u64::from(policy.max_attempts) * fetcher.request_timeout_seconds + backoff;

    if broker.lease_timeout_secs < required {
        return Err(ConfigError::Validation(format!(
            "lease_timeout_secs must be >= {} (fetch timeout x attempts + backoff), got {}",
            required, broker.lease_timeout_secs
        )));
    }

    Ok(())
}
