//! Worker end-to-end tests against a mocked registry

use crate::common::{test_config, RESULT_PAGE};
use sintegra_queue::config::Config;
use sintegra_queue::retry::RetryPolicy;
use sintegra_queue::scrape::RegistryFetcher;
use sintegra_queue::service::{RegistrantLookup, RequestMetrics, Service};
use sintegra_queue::state::{JobStatus, TaskMessage};
use sintegra_queue::storage::{
    RecordSink, SqliteRecordSink, SqliteStatusStore, SqliteTaskQueue, StatusStore, TaskQueue,
};
use sintegra_queue::worker::{JobContext, Worker};
use sintegra_queue::SubjectKey;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn registry_serving(page: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sintegra/consulta/consultar.asp"))
        .and(body_string_contains("tCNPJ=00.006.486%2F0001-75"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page))
        .mount(&server)
        .await;
    server
}

fn base_url(server: &MockServer) -> String {
    format!("{}/sintegra/consulta/", server.uri())
}

async fn service(config: &Config) -> Service {
    Service::from_config(config, Arc::new(RequestMetrics::new()))
        .await
        .unwrap()
}

/// Worker over the configured files with a fast, single-attempt fetcher
fn fast_worker(config: &Config, sink: bool) -> Worker {
    let db = Path::new(&config.broker.database_path);
    let queue = SqliteTaskQueue::open(db, &config.broker.queue_name, Duration::from_secs(300)).unwrap();
    let status = SqliteStatusStore::open(db, Duration::from_secs(3600)).unwrap();
    let fetcher = RegistryFetcher::new(&config.fetcher)
        .unwrap()
        .with_policy(RetryPolicy::new(2, Duration::from_millis(1), Duration::from_millis(2)));
    let sink = sink.then(|| {
        let sink = SqliteRecordSink::open(Path::new(&config.persistence.database_path)).unwrap();
        Arc::new(sink) as Arc<dyn RecordSink>
    });

    Worker::new(
        Arc::new(queue),
        JobContext {
            status: Arc::new(status),
            fetcher,
            sink,
        },
    )
}

#[tokio::test]
async fn test_submitted_job_completes_with_data() {
    let server = registry_serving(RESULT_PAGE).await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir, &base_url(&server));

    let service = service(&config).await;
    let submission = service.submit("00006486000175").await.unwrap();

    let worker = Worker::from_config(&config).await.unwrap();
    let stats = worker.run_once().await.unwrap().unwrap();
    assert_eq!(stats.completed, 1);

    let view = service.get_result(&submission.task_id).unwrap();
    assert_eq!(view.status, Some(JobStatus::Completed));
    assert_eq!(view.has_data, Some(true));

    let result = view.result.unwrap();
    assert_eq!(result["cnpj"], "00.006.486/0001-75");
    assert_eq!(result["razao_social"], "ACME COMERCIO LTDA");
    assert_eq!(result["situacao_cadastral"], "ATIVO - HABILITADO");
    assert!(result.get("nome_fantasia").is_none());

    assert_eq!(service.health().pending_tasks, Some(0));
}

#[tokio::test]
async fn test_completed_record_is_persisted() {
    let server = registry_serving(RESULT_PAGE).await;
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir, &base_url(&server));
    config.persistence.enabled = true;

    let service = service(&config).await;
    service.submit("00006486000175").await.unwrap();

    let worker = Worker::from_config(&config).await.unwrap();
    worker.run_once().await.unwrap().unwrap();

    let lookup = service
        .lookup_registrants(&["00.006.486/0001-75".to_string()])
        .unwrap();
    let RegistrantLookup::Single(registrant) = lookup else {
        panic!("expected a single registrant");
    };
    assert_eq!(registrant.subject_key, "00006486000175");
    assert_eq!(registrant.fields.get("inscricao_estadual"), Some("10.123.456-7"));
}

#[tokio::test]
async fn test_registry_failure_marks_job_failed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = test_config(&dir, &base_url(&server));
    let service = service(&config).await;
    let submission = service.submit("00006486000175").await.unwrap();

    let worker = fast_worker(&config, false);
    let stats = worker.run_once().await.unwrap().unwrap();
    assert_eq!(stats.failed, 1);

    let view = service.get_result(&submission.task_id).unwrap();
    assert_eq!(view.status, Some(JobStatus::Failed));
    assert_eq!(view.has_data, Some(false));
    assert!(view.result.unwrap()["error"].as_str().unwrap().contains("500"));

    // Failed jobs are acknowledged too
    assert_eq!(service.health().pending_tasks, Some(0));
}

#[tokio::test]
async fn test_page_without_fields_completes_without_data() {
    let server = registry_serving("<html><body><p>Nenhum registro</p></body></html>").await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir, &base_url(&server));
    let service = service(&config).await;
    let submission = service.submit("00006486000175").await.unwrap();

    fast_worker(&config, true).run_once().await.unwrap().unwrap();

    let ids = vec![submission.task_id.clone()];
    let batch = service.get_results(&ids).unwrap();
    assert_eq!(batch.results[0].status, Some(JobStatus::Completed));
    assert!(batch.with_data.is_empty());
    assert_eq!(batch.without_data[0].subject_key.as_deref(), Some("00006486000175"));
}

#[tokio::test]
async fn test_malformed_message_is_failed_and_acked() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir, &base_url(&server));

    let db = Path::new(&config.broker.database_path);
    let queue = SqliteTaskQueue::open(db, &config.broker.queue_name, Duration::from_secs(60)).unwrap();
    queue.publish(r#"{"task_id":"broken-1","subject":"x"}"#).unwrap();
    queue.publish("not json at all").unwrap();

    let worker = fast_worker(&config, false);
    let first = worker.run_once().await.unwrap().unwrap();
    assert_eq!(first.failed, 1);
    let second = worker.run_once().await.unwrap().unwrap();
    assert_eq!(second.discarded, 1);

    let status = SqliteStatusStore::open(db, Duration::from_secs(60)).unwrap();
    let entry = status.get("broken-1").unwrap().unwrap();
    assert_eq!(entry.status, JobStatus::Failed);
    assert!(entry.error().unwrap().starts_with("malformed task message"));
    assert_eq!(queue.pending_count().unwrap(), 0);
}

#[tokio::test]
async fn test_message_from_crashed_consumer_is_redelivered() {
    let server = registry_serving(RESULT_PAGE).await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir, &base_url(&server));
    let service = service(&config).await;
    let submission = service.submit("00006486000175").await.unwrap();

    // A consumer with an instantly expiring lease claims the job and dies
    {
        let db = Path::new(&config.broker.database_path);
        let crashed = SqliteTaskQueue::open(db, &config.broker.queue_name, Duration::ZERO).unwrap();
        let delivery = crashed.claim().unwrap().unwrap();
        let message = TaskMessage::decode(&delivery.body).unwrap();
        assert_eq!(message.task_id, submission.task_id);
    }

    let stats = fast_worker(&config, false).run_once().await.unwrap().unwrap();
    assert_eq!(stats.completed, 1);

    let view = service.get_result(&submission.task_id).unwrap();
    assert_eq!(view.status, Some(JobStatus::Completed));
    assert_eq!(service.health().pending_tasks, Some(0));
}

#[tokio::test]
async fn test_reprocessing_is_idempotent() {
    let server = registry_serving(RESULT_PAGE).await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir, &base_url(&server));

    let db = Path::new(&config.broker.database_path);
    let queue = SqliteTaskQueue::open(db, &config.broker.queue_name, Duration::from_secs(60)).unwrap();
    let subject = SubjectKey::parse("00006486000175").unwrap();
    let body = TaskMessage::new("same-task", &subject).encode().unwrap();
    queue.publish(&body).unwrap();
    queue.publish(&body).unwrap();

    let worker = fast_worker(&config, true);
    worker.run_once().await.unwrap().unwrap();
    let first = SqliteStatusStore::open(db, Duration::from_secs(60))
        .unwrap()
        .get("same-task")
        .unwrap()
        .unwrap();
    worker.run_once().await.unwrap().unwrap();
    let second = SqliteStatusStore::open(db, Duration::from_secs(60))
        .unwrap()
        .get("same-task")
        .unwrap()
        .unwrap();

    assert_eq!(first.status, JobStatus::Completed);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_worker_run_drains_queue_until_shutdown() {
    let server = registry_serving(RESULT_PAGE).await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir, &base_url(&server));
    let service = service(&config).await;

    let raws = vec!["00006486000175".to_string(), "00.006.486/0001-75".to_string()];
    let items = service.submit_batch(&raws).await.unwrap();

    let worker = fast_worker(&config, false).with_poll_interval(Duration::from_millis(5));
    let stats = worker
        .run(tokio::time::sleep(Duration::from_millis(500)))
        .await
        .unwrap();
    assert_eq!(stats.completed, 2);

    for item in items {
        let view = service.get_result(&item.task_id).unwrap();
        assert_eq!(view.status, Some(JobStatus::Completed));
    }
}
