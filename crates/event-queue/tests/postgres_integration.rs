//! PostgreSQL broker integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p event-queue --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;
use std::time::Duration;

use event_queue::{
    Backoff, Broker, EventQueue, FailureOutcome, JobOptions, JobState, LEASE_EXPIRED, NewJob,
    PostgresBroker, QueueConfig, QueueError,
};
use mediator::Message;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;
use uuid::Uuid;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    config: QueueConfig,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let config = QueueConfig {
                host: host.to_string(),
                port,
                ..QueueConfig::default()
            };

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);
            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_queue_jobs_table.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();

            temp_pool.close().await;

            Arc::new(ContainerInfo { container, config })
        })
        .await
        .clone()
}

/// Get a broker on a queue of its own, so tests never see each other's jobs
async fn get_test_broker() -> PostgresBroker {
    let info = get_container_info().await;
    let config = QueueConfig {
        queue_name: format!("test-{}", Uuid::new_v4()),
        ..info.config.clone()
    };
    PostgresBroker::connect(&config).await.unwrap()
}

fn options(attempts: u32) -> JobOptions {
    JobOptions {
        attempts,
        backoff: Backoff::Fixed { delay: 0 },
        delay: 0,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct StockLow {
    product_id: String,
    stock: u32,
}

impl Message for StockLow {
    const NAME: &'static str = "ProductStockLow";
}

#[tokio::test]
async fn add_and_claim_job() {
    let broker = get_test_broker().await;
    let data = serde_json::json!({ "product_id": "p-1", "stock": 2 });

    let id = broker
        .add(NewJob::new("ProductStockLow", data.clone(), options(3)))
        .await
        .unwrap();

    let job = broker.fetch_next().await.unwrap().unwrap();
    assert_eq!(job.id, id);
    assert_eq!(job.name, "ProductStockLow");
    assert_eq!(job.data, data);
    assert_eq!(job.options, options(3));
    assert_eq!(job.state, JobState::Active);

    assert!(broker.fetch_next().await.unwrap().is_none());

    broker.complete(id).await.unwrap();
    assert_eq!(broker.count_in_state(JobState::Completed).await.unwrap(), 1);
}

#[tokio::test]
async fn bulk_jobs_are_claimed_in_order() {
    let broker = get_test_broker().await;
    let jobs = (0..3)
        .map(|i| NewJob::new(format!("Job{i}"), serde_json::json!({ "i": i }), options(1)))
        .collect();

    let ids = broker.add_bulk(jobs).await.unwrap();
    assert_eq!(ids.len(), 3);

    for (i, expected) in ids.iter().enumerate() {
        let job = broker.fetch_next().await.unwrap().unwrap();
        assert_eq!(&job.id, expected);
        assert_eq!(job.name, format!("Job{i}"));
    }
}

#[tokio::test]
async fn concurrent_claims_never_share_a_job() {
    let broker = get_test_broker().await;
    let jobs = (0..10)
        .map(|i| NewJob::new("Job", serde_json::json!({ "i": i }), options(1)))
        .collect();
    broker.add_bulk(jobs).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..10 {
        let broker = broker.clone();
        handles.push(tokio::spawn(async move { broker.fetch_next().await }));
    }

    let mut claimed = Vec::new();
    for handle in handles {
        if let Some(job) = handle.await.unwrap().unwrap() {
            claimed.push(job.id);
        }
    }

    let before = claimed.len();
    claimed.sort_by_key(|id| *id.as_uuid());
    claimed.dedup();
    assert_eq!(claimed.len(), before);
    assert_eq!(before, 10);
}

#[tokio::test]
async fn failed_job_retries_then_parks() {
    let broker = get_test_broker().await;
    let id = broker
        .add(NewJob::new("Job", serde_json::json!({}), options(2)))
        .await
        .unwrap();

    broker.fetch_next().await.unwrap().unwrap();
    let outcome = broker.fail(id, "handler failed").await.unwrap();
    assert!(matches!(outcome, FailureOutcome::Retrying { attempt: 1, .. }));

    let retried = broker.fetch_next().await.unwrap().unwrap();
    assert_eq!(retried.attempts_made, 1);
    assert_eq!(retried.last_error.as_deref(), Some("handler failed"));

    let outcome = broker.fail(id, "handler failed again").await.unwrap();
    assert_eq!(outcome, FailureOutcome::Exhausted { attempts: 2 });
    assert!(broker.fetch_next().await.unwrap().is_none());
    assert_eq!(broker.count_in_state(JobState::Failed).await.unwrap(), 1);
}

#[tokio::test]
async fn unsettled_job_is_reclaimed_after_lease() {
    let broker = get_test_broker()
        .await
        .with_visibility_timeout(Duration::ZERO);
    let id = broker
        .add(NewJob::new("Job", serde_json::json!({}), options(3)))
        .await
        .unwrap();

    let claimed = broker.fetch_next().await.unwrap().unwrap();
    assert_eq!(claimed.id, id);
    assert!(claimed.locked_until.is_some());

    // the consumer never settles the job
    let reclaimed = broker.fetch_next().await.unwrap().unwrap();
    assert_eq!(reclaimed.id, id);
    assert_eq!(reclaimed.state, JobState::Active);
    assert_eq!(reclaimed.attempts_made, 1);
    assert_eq!(reclaimed.last_error.as_deref(), Some(LEASE_EXPIRED));
}

#[tokio::test]
async fn live_lease_keeps_job_hidden() {
    let broker = get_test_broker().await;
    broker
        .add(NewJob::new("Job", serde_json::json!({}), options(3)))
        .await
        .unwrap();

    broker.fetch_next().await.unwrap().unwrap();
    assert!(broker.fetch_next().await.unwrap().is_none());
    assert_eq!(broker.count_in_state(JobState::Active).await.unwrap(), 1);
}

#[tokio::test]
async fn expired_lease_on_last_attempt_parks_job() {
    let broker = get_test_broker()
        .await
        .with_visibility_timeout(Duration::ZERO);
    broker
        .add(NewJob::new("Job", serde_json::json!({}), options(1)))
        .await
        .unwrap();

    broker.fetch_next().await.unwrap().unwrap();
    assert!(broker.fetch_next().await.unwrap().is_none());
    assert_eq!(broker.count_in_state(JobState::Failed).await.unwrap(), 1);
}

#[tokio::test]
async fn delayed_job_is_not_claimed_early() {
    let broker = get_test_broker().await;
    let delayed = JobOptions {
        delay: 60_000,
        ..options(1)
    };
    broker
        .add(NewJob::new("Job", serde_json::json!({}), delayed))
        .await
        .unwrap();

    assert!(broker.fetch_next().await.unwrap().is_none());
    assert_eq!(broker.count_in_state(JobState::Waiting).await.unwrap(), 1);
}

#[tokio::test]
async fn event_queue_over_postgres() {
    let broker = get_test_broker().await;
    let queue = EventQueue::new(broker.clone(), &QueueConfig::default());

    let event = StockLow {
        product_id: "p-9".into(),
        stock: 1,
    };
    queue.enqueue(&event).await.unwrap();

    let job = broker.fetch_next().await.unwrap().unwrap();
    assert_eq!(job.name, StockLow::NAME);
    assert_eq!(serde_json::from_value::<StockLow>(job.data).unwrap(), event);

    queue.close_connection().await.unwrap();
    assert!(matches!(
        queue.close_connection().await,
        Err(QueueError::AlreadyClosed)
    ));
}

#[tokio::test]
async fn closed_pool_surfaces_broker_message() {
    let broker = get_test_broker().await;
    broker.close().await.unwrap();

    let err = broker
        .add(NewJob::new("Job", serde_json::json!({}), options(1)))
        .await
        .unwrap_err();
    assert!(!err.message().is_empty());
}
