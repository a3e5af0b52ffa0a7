//! Storage traits and error types
//!
//! Three backends sit behind these traits: the status store (task id to
//! status entry, with expiry), the task queue (durable, at-least-once
//! delivery) and the record sink (extracted records keyed by subject key).
//! All implementations must be shareable across tasks.

use crate::scrape::ExtractedRecord;
use crate::state::{JobStatus, StatusEntry};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("Unknown delivery tag: {0}")]
    UnknownDelivery(i64),

    #[error("A message is already in flight for this consumer")]
    PrefetchExceeded,

    #[error("Storage lock poisoned")]
    LockPoisoned,

    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    /// Whether retrying the same operation could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Unavailable(_) => true,
            Self::Sqlite(rusqlite::Error::SqliteFailure(e, _)) => matches!(
                e.code,
                rusqlite::ErrorCode::DatabaseBusy
                    | rusqlite::ErrorCode::DatabaseLocked
                    | rusqlite::ErrorCode::CannotOpen
                    | rusqlite::ErrorCode::SystemIoFailure
            ),
            _ => false,
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Key-value store for task status entries
///
/// Every write overwrites the previous entry for the task id and restarts its
/// time to live. An expired entry reads exactly like one that never existed.
pub trait StatusStore: Send + Sync {
    /// Writes the entry for `task_id`, replacing any previous one
    fn set(&self, task_id: &str, entry: &StatusEntry) -> StorageResult<()>;

    /// Reads the live entry for `task_id`
    fn get(&self, task_id: &str) -> StorageResult<Option<StatusEntry>>;

    /// Reads several entries, preserving input order
    fn get_many(&self, task_ids: &[String]) -> StorageResult<Vec<Option<StatusEntry>>> {
        task_ids.iter().map(|id| self.get(id)).collect()
    }

    /// Deletes expired entries, returning how many were removed
    fn purge_expired(&self) -> StorageResult<usize>;

    /// Checks the backend is reachable
    fn ping(&self) -> StorageResult<()>;
}

/// A message handed to a consumer and not yet acknowledged
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Handle for `ack` and `abandon`
    pub delivery_tag: i64,

    /// Raw message body
    pub body: String,

    /// How many times the message has been delivered, including this one
    pub delivery_count: u32,
}

impl Delivery {
    /// True if an earlier delivery of this message was never acknowledged
    pub fn redelivered(&self) -> bool {
        self.delivery_count > 1
    }
}

/// Durable task queue with at-least-once delivery
///
/// A consumer holds at most one unacknowledged delivery at a time.
pub trait TaskQueue: Send + Sync {
    /// Appends a message to the queue
    fn publish(&self, body: &str) -> StorageResult<()>;

    /// Claims the next available message, if any
    ///
    /// Fails with `PrefetchExceeded` while a previous delivery is still
    /// unacknowledged.
    fn claim(&self) -> StorageResult<Option<Delivery>>;

    /// Acknowledges a delivery, removing the message for good
    fn ack(&self, delivery_tag: i64) -> StorageResult<()>;

    /// Gives a delivery up without acknowledging it
    ///
    /// The message stays leased and is redelivered once the lease runs out.
    fn abandon(&self, delivery_tag: i64) -> StorageResult<()>;

    /// Number of messages waiting or in flight
    fn pending_count(&self) -> StorageResult<u64>;
}

/// A registrant record as persisted by the sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRegistrant {
    pub subject_key: String,

    #[serde(flatten)]
    pub fields: ExtractedRecord,

    pub created_at: String,
    pub updated_at: String,
}

/// Long-lived store for extracted records
pub trait RecordSink: Send + Sync {
    /// Inserts or fully replaces the record for `subject_key`
    fn upsert(&self, subject_key: &str, record: &ExtractedRecord) -> StorageResult<()>;

    /// Looks up records by subject key; unknown keys are skipped
    fn find_many(&self, subject_keys: &[String]) -> StorageResult<Vec<StoredRegistrant>>;
}
