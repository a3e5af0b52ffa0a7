//! Sintegra-Queue: asynchronous registry lookups
//!
//! This crate turns a tax-identifier lookup into a background job: callers submit
//! an identifier and get a task handle back immediately, a worker fetches and parses
//! the registry page, and the outcome is polled from a TTL-bounded status store.

pub mod config;
pub mod identifier;
pub mod retry;
pub mod scrape;
pub mod service;
pub mod state;
pub mod storage;
pub mod worker;

use thiserror::Error;

/// Main error type for pipeline operations
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(#[from] IdentifierError),

    #[error("Failed to publish task {task_id}: {source}")]
    Publish {
        task_id: String,
        source: storage::StorageError,
    },

    #[error("External service failure: {0}")]
    Fetch(#[from] scrape::FetchError),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Persistence is disabled (set persistence.enabled = true)")]
    PersistenceDisabled,

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    /// Short, stable code identifying the error class
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidIdentifier(_) | Self::BadRequest(_) | Self::PersistenceDisabled => {
                "BAD_REQUEST"
            }
            Self::NotFound(_) => "NOT_FOUND",
            Self::Publish { .. } => "QUEUE_PUBLISH_FAILED",
            Self::Fetch(_) => "EXTERNAL_SERVICE_FAILED",
            Self::Config(_) => "CONFIG_ERROR",
            _ => "INTERNAL_ERROR",
        }
    }

    /// HTTP-style status class for the error
    ///
    /// Validation problems are client errors, a broker that stayed down through
    /// the retry budget is "service unavailable", and a registry that kept failing
    /// is a bad gateway.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidIdentifier(_) | Self::BadRequest(_) | Self::PersistenceDisabled => 400,
            Self::NotFound(_) => 404,
            Self::Publish { .. } => 503,
            Self::Fetch(_) => 502,
            _ => 500,
        }
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Identifier validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    #[error("identifier must have 14 digits, got {0}")]
    WrongLength(usize),

    #[error("identifier cannot be a single repeated digit")]
    RepeatedDigits,

    #[error("check digits do not match (expected {expected})")]
    ChecksumMismatch { expected: String },
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

// Re-export commonly used types
pub use config::Config;
pub use identifier::{mask, normalize, SubjectKey};
pub use scrape::{extract_record, ExtractedRecord};
pub use state::{JobStatus, StatusEntry, TaskMessage};
