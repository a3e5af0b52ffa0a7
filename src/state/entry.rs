//! Status store entries
//!
//! One entry per task id, fully overwritten on every transition. The wire shape is
//! `{"status": ..., "result": ..., "subject_key": ...}`; a completed job keeps its
//! extracted record in `result`, a failed job keeps `{"error": "<message>"}`.

use crate::identifier::SubjectKey;
use crate::scrape::ExtractedRecord;
use crate::state::JobStatus;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// The value stored for a task in the status store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub status: JobStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_key: Option<String>,
}

impl StatusEntry {
    /// Entry written by the producer before publishing
    pub fn queued(subject_key: &SubjectKey) -> Self {
        Self {
            status: JobStatus::Queued,
            result: None,
            subject_key: Some(subject_key.to_string()),
        }
    }

    /// Entry written when a worker picks the job up
    pub fn processing(subject_key: &str) -> Self {
        Self {
            status: JobStatus::Processing,
            result: None,
            subject_key: Some(subject_key.to_string()),
        }
    }

    /// Terminal entry carrying the extracted record
    pub fn completed(subject_key: &str, record: &ExtractedRecord) -> Self {
        Self {
            status: JobStatus::Completed,
            result: Some(record.to_value()),
            subject_key: Some(subject_key.to_string()),
        }
    }

    /// Terminal entry carrying the failure reason
    pub fn failed(subject_key: Option<&str>, error: &str) -> Self {
        Self {
            status: JobStatus::Failed,
            result: Some(json!({ "error": error })),
            subject_key: subject_key.map(str::to_string),
        }
    }

    /// Returns the extracted record of a completed job
    pub fn record(&self) -> Option<ExtractedRecord> {
        if self.status != JobStatus::Completed {
            return None;
        }
        self.result
            .as_ref()
            .and_then(|value| ExtractedRecord::from_value(value).ok())
    }

    /// Returns the failure reason of a failed job
    pub fn error(&self) -> Option<&str> {
        if self.status != JobStatus::Failed {
            return None;
        }
        self.result.as_ref()?.get("error")?.as_str()
    }

    /// True when the job completed with at least one extracted field
    pub fn has_data(&self) -> bool {
        self.record().map(|r| !r.is_empty()).unwrap_or(false)
    }

    /// Serializes the entry for storage
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Deserializes a stored entry
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}
