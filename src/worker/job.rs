//! Processing of a single delivered task
//!
//! # State machine
//!
//! ```text
//! queued ──► processing ──► completed
//!                 │
//!                 └───────► failed
//! ```
//!
//! Every job that reaches the worker ends in exactly one terminal write. The
//! `JobGuard` is created before anything can go wrong; if it is dropped without
//! a terminal write (early return, panic) it records `failed` itself.

use crate::identifier::SubjectKey;
use crate::scrape::{extract_record, ExtractedRecord, RegistryFetcher};
use crate::state::{JobStatus, StatusEntry, TaskMessage};
use crate::storage::{RecordSink, StatusStore, StorageError, StorageResult};
use std::sync::Arc;

/// Written by the guard when a job ends without recording an outcome
pub const ABORTED_MESSAGE: &str = "job aborted before recording an outcome";

/// Handles a job needs, cheap to clone into a spawned task
#[derive(Clone)]
pub struct JobContext {
    pub status: Arc<dyn StatusStore>,
    pub fetcher: RegistryFetcher,
    /// Present only when persistence is enabled
    pub sink: Option<Arc<dyn RecordSink>>,
}

/// How a delivery ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed { task_id: String, has_data: bool },
    Failed { task_id: String, error: String },
    /// Unreadable message with no task id to report against
    Discarded,
}

/// Scoped owner of a task's status while it is being processed
pub struct JobGuard {
    status: Arc<dyn StatusStore>,
    task_id: String,
    subject_key: Option<String>,
    current: Option<JobStatus>,
    terminal_attempted: bool,
}

impl JobGuard {
    pub fn acquire(
        status: Arc<dyn StatusStore>,
        task_id: impl Into<String>,
        subject_key: Option<String>,
    ) -> Self {
        Self {
            status,
            task_id: task_id.into(),
            subject_key,
            current: None,
            terminal_attempted: false,
        }
    }

    /// Records that the worker has started on the job
    pub fn mark_processing(&mut self) -> StorageResult<()> {
        let entry = match self.subject_key.as_deref() {
            Some(subject_key) => StatusEntry::processing(subject_key),
            None => StatusEntry {
                status: JobStatus::Processing,
                result: None,
                subject_key: None,
            },
        };
        self.write(entry)
    }

    /// Records the extracted record as the job's outcome
    pub fn complete(mut self, record: &ExtractedRecord) -> StorageResult<()> {
        self.terminal_attempted = true;
        self.write(StatusEntry {
            status: JobStatus::Completed,
            result: Some(record.to_value()),
            subject_key: self.subject_key.clone(),
        })
    }

    /// Records a failure as the job's outcome
    pub fn fail(mut self, error: &str) -> StorageResult<()> {
        self.terminal_attempted = true;
        let entry = StatusEntry::failed(self.subject_key.as_deref(), error);
        self.write(entry)
    }

    fn write(&mut self, entry: StatusEntry) -> StorageResult<()> {
        if let Some(from) = self.current {
            if !from.can_transition_to(entry.status) {
                return Err(StorageError::InvalidTransition {
                    from,
                    to: entry.status,
                });
            }
        }

        self.status.set(&self.task_id, &entry)?;
        self.current = Some(entry.status);
        Ok(())
    }
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        if self.terminal_attempted {
            return;
        }

        tracing::error!(task_id = %self.task_id, "Job ended without an outcome, marking failed");
        let entry = StatusEntry::failed(self.subject_key.as_deref(), ABORTED_MESSAGE);
        if let Err(e) = self.status.set(&self.task_id, &entry) {
            tracing::error!(task_id = %self.task_id, error = %e, "Failed to record aborted job");
        }
    }
}

/// Processes one message body end to end
///
/// # Returns
///
/// * `Ok(JobOutcome)` - A terminal status was recorded (or nothing could be recorded
///   because the message had no task id); the delivery can be acknowledged
/// * `Err(StorageError)` - The processing or terminal status write failed; the
///   delivery must not be acknowledged
pub async fn process_delivery(ctx: JobContext, body: String) -> StorageResult<JobOutcome> {
    let message = match TaskMessage::decode(&body) {
        Ok(message) => message,
        Err(e) => return record_malformed(&ctx, &body, &e.to_string()),
    };

    let mut guard = JobGuard::acquire(
        ctx.status.clone(),
        message.task_id.as_str(),
        Some(message.subject_key.clone()),
    );
    guard.mark_processing()?;
    tracing::info!(task_id = %message.task_id, subject_key = %message.subject_key, "Task processing");

    let record = match run_lookup(&ctx, &message.subject_key).await {
        Ok(record) => record,
        Err(error) => {
            tracing::error!(task_id = %message.task_id, error = %error, "Task failed");
            guard.fail(&error)?;
            return Ok(JobOutcome::Failed {
                task_id: message.task_id,
                error,
            });
        }
    };

    guard.complete(&record)?;
    let has_data = !record.is_empty();
    tracing::info!(
        task_id = %message.task_id,
        fields = record.len(),
        has_data,
        "Task completed"
    );

    if let Some(sink) = ctx.sink.as_ref().filter(|_| has_data) {
        persist(sink.as_ref(), &message.subject_key, &record);
    }

    Ok(JobOutcome::Completed {
        task_id: message.task_id,
        has_data,
    })
}

/// Validates, fetches and extracts; any failure becomes the job's error text
async fn run_lookup(ctx: &JobContext, subject_key: &str) -> Result<ExtractedRecord, String> {
    let subject = SubjectKey::parse(subject_key).map_err(|e| format!("Invalid identifier: {}", e))?;
    let page = ctx
        .fetcher
        .fetch_page(&subject)
        .await
        .map_err(|e| e.to_string())?;

    tokio::task::spawn_blocking(move || extract_record(&page))
        .await
        .map_err(|e| format!("extraction aborted: {}", e))
}

fn record_malformed(ctx: &JobContext, body: &str, error: &str) -> StorageResult<JobOutcome> {
    let (task_id, subject_key) = TaskMessage::salvage(body);
    let Some(task_id) = task_id else {
        tracing::warn!(error, "Discarding unreadable task message");
        return Ok(JobOutcome::Discarded);
    };

    let error = format!("malformed task message: {}", error);
    tracing::error!(task_id = %task_id, error = %error, "Task failed");
    JobGuard::acquire(ctx.status.clone(), task_id.as_str(), subject_key).fail(&error)?;

    Ok(JobOutcome::Failed { task_id, error })
}

/// Upserts into the sink; a failure here never changes the job's outcome
fn persist(sink: &dyn RecordSink, subject_key: &str, record: &ExtractedRecord) {
    match sink.upsert(subject_key, record) {
        Ok(()) => tracing::debug!(subject_key, "Record persisted"),
        Err(e) => tracing::error!(subject_key, error = %e, "Failed to persist record"),
    }
}
