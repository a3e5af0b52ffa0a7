//! Submission and query behaviour over on-disk stores

use crate::common::test_config;
use sintegra_queue::identifier::{mask, normalize};
use sintegra_queue::retry::RetryPolicy;
use sintegra_queue::service::{RequestMetrics, Service};
use sintegra_queue::state::{JobStatus, StatusEntry, TaskMessage};
use sintegra_queue::storage::{
    Delivery, SqliteStatusStore, SqliteTaskQueue, StatusStore, StorageError, StorageResult,
    TaskQueue,
};
use sintegra_queue::{IdentifierError, PipelineError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const VALID: &[&str] = &[
    "00006486000175",
    "00012377000160",
    "00022244000175",
    "11222333000181",
    "33000167000101",
];

/// Queue that can be switched into failing every publish
struct SwitchableQueue {
    inner: SqliteTaskQueue,
    broken: AtomicBool,
}

impl TaskQueue for SwitchableQueue {
    fn publish(&self, body: &str) -> StorageResult<()> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("connection refused".to_string()));
        }
        self.inner.publish(body)
    }

    fn claim(&self) -> StorageResult<Option<Delivery>> {
        self.inner.claim()
    }

    fn ack(&self, delivery_tag: i64) -> StorageResult<()> {
        self.inner.ack(delivery_tag)
    }

    fn abandon(&self, delivery_tag: i64) -> StorageResult<()> {
        self.inner.abandon(delivery_tag)
    }

    fn pending_count(&self) -> StorageResult<u64> {
        self.inner.pending_count()
    }
}

struct Harness {
    _dir: TempDir,
    service: Service,
    status: Arc<SqliteStatusStore>,
    queue: Arc<SwitchableQueue>,
}

fn harness() -> Harness {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pipeline.db");

    let status = Arc::new(SqliteStatusStore::open(&path, Duration::from_secs(3600)).unwrap());
    let queue = Arc::new(SwitchableQueue {
        inner: SqliteTaskQueue::open(&path, "scrape_tasks", Duration::from_secs(300)).unwrap(),
        broken: AtomicBool::new(false),
    });

    let service = Service::new(
        status.clone(),
        queue.clone(),
        None,
        Arc::new(RequestMetrics::new()),
    )
    .with_publish_policy(RetryPolicy::new(
        3,
        Duration::from_millis(1),
        Duration::from_millis(5),
    ));

    Harness {
        _dir: dir,
        service,
        status,
        queue,
    }
}

#[test]
fn test_validator_accepts_known_identifiers() {
    for id in VALID {
        assert_eq!(normalize(id).unwrap(), *id);
        assert_eq!(normalize(&mask(id)).unwrap(), *id);
    }
}

#[test]
fn test_validator_rejects_repeated_digits_and_bad_checksums() {
    for digit in 0..=9 {
        let repeated = digit.to_string().repeat(14);
        assert_eq!(normalize(&repeated), Err(IdentifierError::RepeatedDigits));
    }
    assert!(matches!(
        normalize("11222333000182"),
        Err(IdentifierError::ChecksumMismatch { .. })
    ));
    assert_eq!(normalize("123"), Err(IdentifierError::WrongLength(3)));
}

#[tokio::test]
async fn test_submit_then_poll_is_queued() {
    let h = harness();
    let submission = h.service.submit("00.006.486/0001-75").await.unwrap();

    let view = h.service.get_result(&submission.task_id).unwrap();
    assert_eq!(view.status, Some(JobStatus::Queued));
    assert_eq!(view.subject_key.as_deref(), Some("00006486000175"));

    let delivery = h.queue.claim().unwrap().unwrap();
    let message = TaskMessage::decode(&delivery.body).unwrap();
    assert_eq!(message.task_id, submission.task_id);
}

#[tokio::test]
async fn test_forced_publish_failure_leaves_one_failed_entry() {
    let h = harness();
    h.queue.broken.store(true, Ordering::SeqCst);

    let err = h.service.submit("00006486000175").await.unwrap_err();
    assert_eq!(err.code(), "QUEUE_PUBLISH_FAILED");
    assert_eq!(err.status_code(), 503);

    let PipelineError::Publish { task_id, .. } = err else {
        panic!("expected a publish error");
    };
    let entry = h.status.get(&task_id).unwrap().unwrap();
    assert_eq!(entry.status, JobStatus::Failed);
    assert_eq!(entry.error(), Some("Backend unavailable: connection refused"));
    assert_eq!(h.queue.pending_count().unwrap(), 0);
}

#[tokio::test]
async fn test_batch_with_invalid_item_enqueues_nothing() {
    let h = harness();
    let raws = vec!["00006486000175".to_string(), "123".to_string()];

    let err = h.service.submit_batch(&raws).await.unwrap_err();
    assert_eq!(err.status_code(), 400);
    assert_eq!(h.queue.pending_count().unwrap(), 0);
}

#[tokio::test]
async fn test_batch_query_present_and_missing() {
    let h = harness();
    let submission = h.service.submit("00006486000175").await.unwrap();

    let mut record = sintegra_queue::ExtractedRecord::new();
    record.insert("razao_social", "ACME LTDA");
    h.status
        .set(
            &submission.task_id,
            &StatusEntry::completed("00006486000175", &record),
        )
        .unwrap();

    let ids = vec![submission.task_id.clone(), "does-not-exist".to_string()];
    let batch = h.service.get_results(&ids).unwrap();

    assert_eq!(batch.with_data.len(), 1);
    assert_eq!(batch.with_data[0].task_id, submission.task_id);
    assert_eq!(batch.without_data.len(), 1);
    assert_eq!(batch.without_data[0].task_id, "does-not-exist");
    assert_eq!(batch.without_data[0].subject_key, None);

    let json = serde_json::to_value(&batch).unwrap();
    assert_eq!(json["results"][1]["status"], "unknown");
}

#[tokio::test]
async fn test_service_from_config_shares_files() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir, "http://127.0.0.1:9/");

    let producer = Service::from_config(&config, Arc::new(RequestMetrics::new()))
        .await
        .unwrap();
    let reader = Service::from_config(&config, Arc::new(RequestMetrics::new()))
        .await
        .unwrap();

    let submission = producer.submit("11222333000181").await.unwrap();
    let view = reader.get_result(&submission.task_id).unwrap();
    assert_eq!(view.status, Some(JobStatus::Queued));
    assert_eq!(reader.health().pending_tasks, Some(1));
}

#[tokio::test]
async fn test_expired_status_reads_as_not_found() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pipeline.db");
    let status = Arc::new(SqliteStatusStore::open(&path, Duration::ZERO).unwrap());
    let queue = Arc::new(SqliteTaskQueue::open(&path, "scrape_tasks", Duration::from_secs(60)).unwrap());
    let service = Service::new(status, queue, None, Arc::new(RequestMetrics::new()));

    let submission = service.submit("00006486000175").await.unwrap();
    let err = service.get_result(&submission.task_id).unwrap_err();
    assert!(matches!(err, PipelineError::NotFound(_)));
}
