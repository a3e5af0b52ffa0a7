//! Task queue wire message

use crate::identifier::SubjectKey;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Job descriptor published to the task queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskMessage {
    pub task_id: String,
    pub subject_key: String,
}

impl TaskMessage {
    pub fn new(task_id: impl Into<String>, subject_key: &SubjectKey) -> Self {
        Self {
            task_id: task_id.into(),
            subject_key: subject_key.to_string(),
        }
    }

    /// Encodes the message body
    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Decodes a message body
    pub fn decode(body: &str) -> serde_json::Result<Self> {
        serde_json::from_str(body)
    }

    /// Best-effort recovery of the task id and subject key from a body that
    /// failed to decode, so the failure can still be recorded against the task
    pub fn salvage(body: &str) -> (Option<String>, Option<String>) {
        let Ok(value) = serde_json::from_str::<Value>(body) else {
            return (None, None);
        };
        let field = |name: &str| value.get(name).and_then(Value::as_str).map(str::to_string);
        (field("task_id"), field("subject_key"))
    }
}
