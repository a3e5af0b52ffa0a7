//! Request-facing service
//!
//! `Service` is what a caller talks to: submitting lookups, polling job
//! outcomes, reading persisted registrants and checking health. Every call
//! is timed into the injected `RequestMetrics`.

mod metrics;
mod producer;
mod views;

pub use metrics::{MetricSummary, RequestMetrics, TOTAL_KEY};
pub use producer::{BatchItem, Producer, Submission};
pub use views::{BatchResults, HealthReport, RegistrantLookup, TaskSummary, TaskView};

use crate::config::Config;
use crate::identifier::SubjectKey;
use crate::retry::RetryPolicy;
use crate::storage::{self, RecordSink, StatusStore, StorageError, TaskQueue};
use crate::{PipelineError, Result};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;

/// Submission, query and lookup operations over shared store handles
pub struct Service {
    producer: Producer,
    status: Arc<dyn StatusStore>,
    queue: Arc<dyn TaskQueue>,
    sink: Option<Arc<dyn RecordSink>>,
    metrics: Arc<RequestMetrics>,
}

impl Service {
    /// Builds a service over existing handles
    ///
    /// The metrics are zeroed so counters always describe this service's lifetime.
    /// Pass `sink: None` when persistence is disabled.
    pub fn new(
        status: Arc<dyn StatusStore>,
        queue: Arc<dyn TaskQueue>,
        sink: Option<Arc<dyn RecordSink>>,
        metrics: Arc<RequestMetrics>,
    ) -> Self {
        metrics.reset();
        Self {
            producer: Producer::new(status.clone(), queue.clone()),
            status,
            queue,
            sink,
            metrics,
        }
    }

    /// Opens the stores named in the configuration
    ///
    /// The record sink is only opened when persistence is enabled; its schema
    /// setup is retried because the database may still be starting.
    pub async fn from_config(config: &Config, metrics: Arc<RequestMetrics>) -> Result<Self> {
        let status: Arc<dyn StatusStore> = Arc::new(storage::open_status_store(&config.status)?);
        let queue: Arc<dyn TaskQueue> = Arc::new(storage::open_task_queue(&config.broker)?);

        let sink = if config.persistence.enabled {
            let sink = RetryPolicy::schema_init()
                .run(
                    "open record sink",
                    |_| async move { storage::open_record_sink(&config.persistence) },
                    StorageError::is_transient,
                )
                .await?;
            Some(Arc::new(sink) as Arc<dyn RecordSink>)
        } else {
            None
        };

        Ok(Self::new(status, queue, sink, metrics))
    }

    /// Replaces the retry policy used when publishing
    pub fn with_publish_policy(mut self, policy: RetryPolicy) -> Self {
        self.producer = Producer::new(self.status.clone(), self.queue.clone()).with_policy(policy);
        self
    }

    pub fn metrics(&self) -> &RequestMetrics {
        &self.metrics
    }

    /// Submits one identifier for lookup
    pub async fn submit(&self, raw: &str) -> Result<Submission> {
        let started = Instant::now();
        let result = self.producer.submit(raw).await;
        self.observe("submit", started);
        result
    }

    /// Submits several identifiers; see [`Producer::submit_batch`]
    pub async fn submit_batch(&self, raws: &[String]) -> Result<Vec<BatchItem>> {
        let started = Instant::now();
        let result = self.producer.submit_batch(raws).await;
        self.observe("submit_batch", started);
        result
    }

    /// Returns the current state of one job
    ///
    /// An unknown or expired task id is `NotFound`.
    pub fn get_result(&self, task_id: &str) -> Result<TaskView> {
        self.timed("get_result", || -> Result<TaskView> {
            let task_id = task_id.trim();
            if task_id.is_empty() {
                return Err(PipelineError::BadRequest("task id cannot be empty".to_string()));
            }

            match self.status.get(task_id)? {
                Some(entry) => Ok(TaskView::from_entry(task_id, entry)),
                None => Err(PipelineError::NotFound("task not found".to_string())),
            }
        })
    }

    /// Returns the state of several jobs, bucketed by whether they produced data
    ///
    /// Ids may also be given comma-separated. Unknown ids are reported with
    /// status `unknown` instead of failing the query.
    pub fn get_results(&self, task_ids: &[String]) -> Result<BatchResults> {
        self.timed("get_results", || -> Result<BatchResults> {
            let ids = split_list(task_ids);
            if ids.is_empty() {
                return Err(PipelineError::BadRequest(
                    "provide at least one task id".to_string(),
                ));
            }

            let entries = self.status.get_many(&ids)?;
            let views = ids
                .iter()
                .zip(entries)
                .map(|(id, entry)| match entry {
                    Some(entry) => TaskView::from_entry(id, entry),
                    None => TaskView::unknown(id),
                })
                .collect();

            Ok(BatchResults::from_views(views))
        })
    }

    /// Reads persisted registrant records
    ///
    /// One identifier yields the record or `NotFound`; several yield the found
    /// records and the normalized identifiers that were not found, each
    /// identifier counted once.
    pub fn lookup_registrants(&self, raws: &[String]) -> Result<RegistrantLookup> {
        self.timed("lookup_registrants", || -> Result<RegistrantLookup> {
            let sink = self.sink.as_ref().ok_or(PipelineError::PersistenceDisabled)?;

            let values = split_list(raws);
            if values.is_empty() {
                return Err(PipelineError::BadRequest(
                    "provide at least one identifier".to_string(),
                ));
            }

            let mut keys: Vec<String> = Vec::with_capacity(values.len());
            for raw in &values {
                let key = SubjectKey::parse(raw)?.to_string();
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }

            let mut stored = sink.find_many(&keys)?;

            if values.len() == 1 {
                return match stored.pop() {
                    Some(registrant) => {
                        tracing::info!(subject_key = %registrant.subject_key, "Registrant found");
                        Ok(RegistrantLookup::Single(registrant))
                    }
                    None => {
                        tracing::info!(subject_key = %keys[0], "Registrant not found");
                        Err(PipelineError::NotFound("registrant not found".to_string()))
                    }
                };
            }

            let mut found = Vec::new();
            let mut not_found = Vec::new();
            for key in keys {
                match stored.iter().position(|r| r.subject_key == key) {
                    Some(index) => found.push(stored.swap_remove(index)),
                    None => not_found.push(key),
                }
            }

            tracing::info!(
                found = found.len(),
                not_found = not_found.len(),
                "Registrant lookup"
            );
            Ok(RegistrantLookup::Batch { found, not_found })
        })
    }

    /// Reports whether the status store answers
    pub fn health(&self) -> HealthReport {
        self.timed("health", || {
            let status_store = match self.status.ping() {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(error = %e, "Status store ping failed");
                    false
                }
            };

            HealthReport {
                status: "ok",
                status_store,
                pending_tasks: self.queue.pending_count().ok(),
            }
        })
    }

    fn timed<T>(&self, operation: &str, f: impl FnOnce() -> T) -> T {
        let started = Instant::now();
        let out = f();
        self.observe(operation, started);
        out
    }

    fn observe(&self, operation: &str, started: Instant) {
        let elapsed = started.elapsed();
        tracing::debug!(
            operation,
            duration_ms = elapsed.as_secs_f64() * 1000.0,
            "Request handled"
        );
        self.metrics.observe(operation, elapsed);
    }
}

/// Splits comma-separated entries and drops blanks
pub fn split_list(raw: &[String]) -> Vec<String> {
    raw.iter()
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect()
}

/// Renders an error as the user-facing JSON body
///
/// Internal failures are reported with a generic message; the details only
/// go to the log.
pub fn error_body(err: &PipelineError) -> Value {
    let message = if err.code() == "INTERNAL_ERROR" {
        tracing::error!(error = %err, "Unhandled internal error");
        "unexpected internal error".to_string()
    } else {
        err.to_string()
    };

    json!({ "error": { "code": err.code(), "message": message } })
}
