//! Job submission
//!
//! A submission validates the identifier, records the job as queued, then
//! publishes the task message. The queued entry is written before publishing
//! so a worker can never finish a job whose status does not exist yet.

use crate::identifier::SubjectKey;
use crate::retry::RetryPolicy;
use crate::state::{JobStatus, StatusEntry, TaskMessage};
use crate::storage::{StatusStore, StorageError, TaskQueue};
use crate::{PipelineError, Result};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Handle returned for an accepted job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Submission {
    pub task_id: String,
    pub status: JobStatus,
}

/// One line of a batch submission response
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchItem {
    /// Normalized identifier
    pub identifier: String,
    pub task_id: String,
    pub status: JobStatus,
}

/// Publishes lookup jobs
pub struct Producer {
    status: Arc<dyn StatusStore>,
    queue: Arc<dyn TaskQueue>,
    policy: RetryPolicy,
}

impl Producer {
    pub fn new(status: Arc<dyn StatusStore>, queue: Arc<dyn TaskQueue>) -> Self {
        Self {
            status,
            queue,
            policy: RetryPolicy::standard(),
        }
    }

    /// Replaces the publish retry policy
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Submits a single identifier
    ///
    /// # Returns
    ///
    /// * `Ok(Submission)` - The job is queued
    /// * `Err(PipelineError::InvalidIdentifier)` - Nothing was written
    /// * `Err(PipelineError::Publish)` - The job exists and is marked failed
    pub async fn submit(&self, raw: &str) -> Result<Submission> {
        let subject = SubjectKey::parse(raw)?;
        let task_id = Uuid::new_v4().to_string();
        self.enqueue(&task_id, &subject).await?;
        Ok(Submission {
            task_id,
            status: JobStatus::Queued,
        })
    }

    /// Submits several identifiers
    ///
    /// Every identifier is validated before anything is published; a single
    /// invalid one rejects the whole batch. After that each item is enqueued
    /// on its own: any failure only marks that item failed, and the batch
    /// still reports every task id it handed out.
    pub async fn submit_batch(&self, raws: &[String]) -> Result<Vec<BatchItem>> {
        if raws.is_empty() {
            return Err(PipelineError::BadRequest(
                "provide at least one identifier".to_string(),
            ));
        }

        let subjects = raws
            .iter()
            .map(|raw| SubjectKey::parse(raw))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut items = Vec::with_capacity(subjects.len());
        for subject in subjects {
            let task_id = Uuid::new_v4().to_string();
            let status = match self.enqueue(&task_id, &subject).await {
                Ok(()) => JobStatus::Queued,
                // The publish path already recorded the failure
                Err(PipelineError::Publish { .. }) => JobStatus::Failed,
                Err(e) => {
                    tracing::error!(task_id = %task_id, subject_key = %subject, error = %e, "Batch item failed");
                    let failure = StatusEntry::failed(Some(subject.as_str()), &e.to_string());
                    if let Err(e) = self.status.set(&task_id, &failure) {
                        tracing::warn!(task_id = %task_id, error = %e, "Failed to record batch item failure");
                    }
                    JobStatus::Failed
                }
            };
            items.push(BatchItem {
                identifier: subject.to_string(),
                task_id,
                status,
            });
        }

        tracing::info!(
            total = items.len(),
            failed = items.iter().filter(|i| i.status == JobStatus::Failed).count(),
            "Batch submitted"
        );
        Ok(items)
    }

    /// Records the queued entry for `task_id` and publishes the task message
    async fn enqueue(&self, task_id: &str, subject: &SubjectKey) -> Result<()> {
        self.status.set(task_id, &StatusEntry::queued(subject))?;

        let body = TaskMessage::new(task_id, subject)
            .encode()
            .map_err(StorageError::from)?;

        let published = self
            .policy
            .run(
                "publish task",
                |_| {
                    let (queue, body) = (&self.queue, &body);
                    async move { queue.publish(body) }
                },
                |_: &StorageError| true,
            )
            .await;

        match published {
            Ok(()) => {
                tracing::info!(task_id = %task_id, subject_key = %subject, "Task queued");
                Ok(())
            }
            Err(source) => {
                tracing::error!(task_id = %task_id, subject_key = %subject, error = %source, "Task publish failed");
                let failure = StatusEntry::failed(Some(subject.as_str()), &source.to_string());
                if let Err(e) = self.status.set(task_id, &failure) {
                    tracing::error!(task_id = %task_id, error = %e, "Failed to record publish failure");
                }
                Err(PipelineError::Publish {
                    task_id: task_id.to_string(),
                    source,
                })
            }
        }
    }
}
