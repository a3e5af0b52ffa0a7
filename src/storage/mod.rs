//! Storage module for task state, queued messages and extracted records
//!
//! This module handles all database operations for the pipeline, including:
//! - SQLite connection setup and schema management
//! - The status store with per-entry expiry
//! - The durable task queue with leases and redelivery
//! - The registrant sink

mod queue;
mod schema;
mod sink;
mod sqlite;
mod status;
mod traits;

pub use queue::SqliteTaskQueue;
pub use sink::SqliteRecordSink;
pub use sqlite::{open_connection, open_in_memory_connection};
pub use status::SqliteStatusStore;
pub use traits::{
    Delivery, RecordSink, StatusStore, StorageError, StorageResult, StoredRegistrant, TaskQueue,
};

use crate::config::{BrokerConfig, PersistenceConfig, StatusConfig};
use std::path::Path;
use std::time::Duration;

/// Opens the status store described by the configuration
///
/// # Arguments
///
/// * `config` - The status store configuration
///
/// # Returns
///
/// * `Ok(SqliteStatusStore)` - Successfully opened store
/// * `Err(StorageError)` - Failed to open the database
pub fn open_status_store(config: &StatusConfig) -> StorageResult<SqliteStatusStore> {
    SqliteStatusStore::open(
        Path::new(&config.database_path),
        Duration::from_secs(config.result_ttl_seconds),
    )
}

/// Opens the task queue described by the configuration
pub fn open_task_queue(config: &BrokerConfig) -> StorageResult<SqliteTaskQueue> {
    SqliteTaskQueue::open(
        Path::new(&config.database_path),
        &config.queue_name,
        Duration::from_secs(config.lease_timeout_secs),
    )
}

/// Opens the record sink described by the configuration
pub fn open_record_sink(config: &PersistenceConfig) -> StorageResult<SqliteRecordSink> {
    SqliteRecordSink::open(Path::new(&config.database_path))
}
