//! Configuration module for Sintegra-Queue
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Producer and worker processes read the same file so they agree on the queue,
//! the status store and the result TTL.
//!
//! # Example
//!
//! ```no_run
//! use sintegra_queue::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.toml")).unwrap();
//! println!("Statuses expire after {}s", config.status.result_ttl_seconds);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{BrokerConfig, Config, FetcherConfig, PersistenceConfig, StatusConfig};

// Re-export parser functions
pub use parser::{
    compute_config_hash, hash_config_text, load_config, load_config_with_hash, parse_config,
};
