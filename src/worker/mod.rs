//! Task consumer
//!
//! The worker claims one message at a time, runs the job in a spawned task
//! and settles the delivery once the job has recorded its outcome:
//!
//! | Job result | Delivery |
//! |------------|----------|
//! | outcome recorded (completed, failed, discarded) | acknowledged |
//! | processing or terminal status write failed | abandoned, redelivered after lease expiry |
//! | job panicked (guard recorded failed) | acknowledged |
//!
//! On shutdown the worker stops claiming, lets the in-flight job finish and
//! settles it before returning.

mod job;

pub use job::{process_delivery, JobContext, JobGuard, JobOutcome, ABORTED_MESSAGE};

use crate::config::Config;
use crate::retry::RetryPolicy;
use crate::scrape::RegistryFetcher;
use crate::storage::{self, Delivery, RecordSink, StatusStore, StorageError, StorageResult, TaskQueue};
use crate::Result;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinError;

/// Idle wait between claims on an empty queue
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Counters for one worker run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkerStats {
    pub completed: u64,
    pub failed: u64,
    pub discarded: u64,
    /// Deliveries left for redelivery because their outcome could not be recorded
    pub abandoned: u64,
}

impl WorkerStats {
    pub fn processed(&self) -> u64 {
        self.completed + self.failed + self.discarded + self.abandoned
    }
}

/// Single-prefetch queue consumer
pub struct Worker {
    queue: Arc<dyn TaskQueue>,
    ctx: JobContext,
    poll_interval: Duration,
}

impl Worker {
    pub fn new(queue: Arc<dyn TaskQueue>, ctx: JobContext) -> Self {
        Self {
            queue,
            ctx,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Connects everything the worker needs
    ///
    /// Opening the broker and the status store is retried without limit at a
    /// fixed delay, so workers can start before their databases are reachable.
    /// Expired status entries are purged once connected.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let delay = Duration::from_millis(config.broker.connect_retry_delay_ms);

        let queue = connect_with_retry("task queue", delay, || {
            storage::open_task_queue(&config.broker)
        })
        .await;
        tracing::info!(
            queue = %config.broker.queue_name,
            consumer = %queue.consumer_tag(),
            "Connected to task queue"
        );

        let status = connect_with_retry("status store", delay, || {
            storage::open_status_store(&config.status)
        })
        .await;

        match status.purge_expired() {
            Ok(0) => {}
            Ok(removed) => tracing::info!(removed, "Purged expired status entries"),
            Err(e) => tracing::warn!(error = %e, "Failed to purge expired status entries"),
        }

        let fetcher = RegistryFetcher::new(&config.fetcher)?;

        let sink = if config.persistence.enabled {
            let sink = RetryPolicy::schema_init()
                .run(
                    "open record sink",
                    |_| async move { storage::open_record_sink(&config.persistence) },
                    StorageError::is_transient,
                )
                .await?;
            tracing::info!(path = %config.persistence.database_path, "Persistence enabled");
            Some(Arc::new(sink) as Arc<dyn RecordSink>)
        } else {
            None
        };

        let ctx = JobContext {
            status: Arc::new(status) as Arc<dyn StatusStore>,
            fetcher,
            sink,
        };
        Ok(Self::new(Arc::new(queue), ctx))
    }

    /// Consumes messages until `shutdown` resolves
    pub async fn run<F>(&self, shutdown: F) -> Result<WorkerStats>
    where
        F: Future<Output = ()>,
    {
        tracing::info!("Worker started");
        tokio::pin!(shutdown);

        let mut stats = WorkerStats::default();
        let mut stopping = false;

        while !stopping {
            let delivery = tokio::select! {
                _ = &mut shutdown => break,
                next = self.next_delivery() => next?,
            };

            let mut job = tokio::spawn(process_delivery(self.ctx.clone(), delivery.body.clone()));
            let joined = loop {
                tokio::select! {
                    joined = &mut job => break joined,
                    _ = &mut shutdown, if !stopping => {
                        tracing::info!("Shutdown requested, finishing in-flight job");
                        stopping = true;
                    }
                }
            };

            self.settle(&delivery, joined, &mut stats);
        }

        tracing::info!(
            completed = stats.completed,
            failed = stats.failed,
            discarded = stats.discarded,
            abandoned = stats.abandoned,
            "Worker stopped"
        );
        Ok(stats)
    }

    /// Processes at most one available message without waiting
    ///
    /// Returns `None` when the queue has nothing to deliver.
    pub async fn run_once(&self) -> Result<Option<WorkerStats>> {
        let Some(delivery) = self.queue.claim()? else {
            return Ok(None);
        };

        let joined = tokio::spawn(process_delivery(self.ctx.clone(), delivery.body.clone())).await;
        let mut stats = WorkerStats::default();
        self.settle(&delivery, joined, &mut stats);
        Ok(Some(stats))
    }

    /// Waits for the next claimable message
    async fn next_delivery(&self) -> StorageResult<Delivery> {
        loop {
            match self.queue.claim() {
                Ok(Some(delivery)) => return Ok(delivery),
                Ok(None) => {}
                Err(e) if e.is_transient() => {
                    tracing::warn!(error = %e, "Claim failed, will retry");
                }
                Err(e) => return Err(e),
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    fn settle(
        &self,
        delivery: &Delivery,
        joined: std::result::Result<StorageResult<JobOutcome>, JoinError>,
        stats: &mut WorkerStats,
    ) {
        let tag = delivery.delivery_tag;

        match joined {
            Ok(Ok(outcome)) => {
                match outcome {
                    JobOutcome::Completed { .. } => stats.completed += 1,
                    JobOutcome::Failed { .. } => stats.failed += 1,
                    JobOutcome::Discarded => stats.discarded += 1,
                }
                if let Err(e) = self.queue.ack(tag) {
                    tracing::error!(delivery_tag = tag, error = %e, "Failed to acknowledge delivery");
                }
            }
            Ok(Err(e)) => {
                stats.abandoned += 1;
                tracing::error!(
                    delivery_tag = tag,
                    error = %e,
                    "Could not record job outcome, leaving message for redelivery"
                );
                if let Err(e) = self.queue.abandon(tag) {
                    tracing::error!(delivery_tag = tag, error = %e, "Failed to abandon delivery");
                }
            }
            Err(e) => {
                // The job guard recorded the failure while unwinding
                stats.failed += 1;
                tracing::error!(delivery_tag = tag, error = %e, "Job panicked");
                if let Err(e) = self.queue.ack(tag) {
                    tracing::error!(delivery_tag = tag, error = %e, "Failed to acknowledge delivery");
                }
            }
        }
    }
}

/// Opens a backend, retrying forever at a fixed delay
async fn connect_with_retry<T, F>(what: &str, delay: Duration, mut open: F) -> T
where
    F: FnMut() -> StorageResult<T>,
{
    let mut attempt: u64 = 1;
    loop {
        match open() {
            Ok(value) => return value,
            Err(e) => {
                tracing::warn!(
                    backend = what,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Connection failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
