//! Lookup job states
//!
//! `Queued` is written by the producer only. Workers move a job to
//! `Processing` and then to one of the two outcomes.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Accepted and waiting in the task queue
    Queued,

    /// A worker is fetching the registry page
    Processing,

    /// Page fetched and parsed; the record may be empty
    Completed,

    /// Publishing, fetching or parsing failed
    Failed,
}

impl JobStatus {
    pub const ALL: [JobStatus; 4] = [
        Self::Queued,
        Self::Processing,
        Self::Completed,
        Self::Failed,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether a worker may overwrite `self` with `next`
    ///
    /// Nothing returns to `Queued`. Everything else is allowed, including
    /// re-entering `Processing` from an outcome: a redelivered message is
    /// processed again and the last write wins.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        next != Self::Queued
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
