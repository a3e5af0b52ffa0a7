//! Response shapes for job and registrant queries

use crate::scrape::IDENTIFIER_FIELD;
use crate::state::{JobStatus, StatusEntry};
use crate::storage::StoredRegistrant;
use serde::{Serialize, Serializer};
use serde_json::Value;

/// A job as seen by a caller polling for its outcome
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskView {
    pub task_id: String,

    /// `None` (rendered as `"unknown"`) when the task does not exist or expired
    #[serde(serialize_with = "serialize_status")]
    pub status: Option<JobStatus>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_data: Option<bool>,
}

fn serialize_status<S: Serializer>(status: &Option<JobStatus>, s: S) -> Result<S::Ok, S::Error> {
    match status {
        Some(status) => status.serialize(s),
        None => s.serialize_str("unknown"),
    }
}

impl TaskView {
    pub fn from_entry(task_id: &str, entry: StatusEntry) -> Self {
        let has_data = entry.has_data();
        // Older entries may only carry the identifier inside the record
        let subject_key = entry.subject_key.clone().or_else(|| {
            entry
                .record()
                .and_then(|r| r.get(IDENTIFIER_FIELD).map(str::to_string))
        });

        Self {
            task_id: task_id.to_string(),
            status: Some(entry.status),
            result: entry.result,
            subject_key,
            has_data: Some(has_data),
        }
    }

    pub fn unknown(task_id: &str) -> Self {
        Self {
            task_id: task_id.to_string(),
            status: None,
            result: None,
            subject_key: None,
            has_data: Some(false),
        }
    }

    pub fn summary(&self) -> TaskSummary {
        TaskSummary {
            task_id: self.task_id.clone(),
            subject_key: self.subject_key.clone(),
        }
    }
}

/// Task id and subject key, used to bucket batch results
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskSummary {
    pub task_id: String,
    pub subject_key: Option<String>,
}

/// Outcome of a batch status query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchResults {
    pub results: Vec<TaskView>,
    pub with_data: Vec<TaskSummary>,
    pub without_data: Vec<TaskSummary>,
}

impl BatchResults {
    pub fn from_views(results: Vec<TaskView>) -> Self {
        let (with, without): (Vec<&TaskView>, Vec<&TaskView>) = results
            .iter()
            .partition(|view| view.has_data == Some(true));

        let with_data = with.into_iter().map(TaskView::summary).collect();
        let without_data = without.into_iter().map(TaskView::summary).collect();

        Self {
            results,
            with_data,
            without_data,
        }
    }
}

/// Outcome of a registrant lookup
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RegistrantLookup {
    Single(StoredRegistrant),
    Batch {
        found: Vec<StoredRegistrant>,
        not_found: Vec<String>,
    },
}

/// Reachability of the backing stores
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub status_store: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_tasks: Option<u64>,
}
