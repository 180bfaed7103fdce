//! Job loop feeding queued events to the mediator.

use std::future::Future;
use std::time::{Duration, Instant};

use event_queue::{Broker, FailureOutcome, Job};
use mediator::Mediator;

use crate::{Result, WorkerError};

/// Consumes jobs from a broker one at a time and dispatches each one by name.
///
/// The worker supports:
/// - Single job delivery: [`EventWorker::process`]
/// - One claim/settle cycle: [`EventWorker::run_once`]
/// - A polling loop until shutdown: [`EventWorker::run`]
pub struct EventWorker<B: Broker> {
    broker: B,
    mediator: Mediator,
    poll_interval: Duration,
}

impl<B: Broker> EventWorker<B> {
    pub fn new(broker: B, mediator: Mediator, poll_interval: Duration) -> Self {
        Self {
            broker,
            mediator,
            poll_interval,
        }
    }

    pub fn broker(&self) -> &B {
        &self.broker
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Delivers a job's payload to every handler registered under its name.
    pub async fn process(&self, job: &Job) -> Result<()> {
        self.mediator
            .dispatch(&job.name, &job.data)
            .await
            .map_err(|source| WorkerError::Dispatch {
                name: job.name.clone(),
                source,
            })
    }

    /// Claims one job, processes it and settles it with the broker.
    ///
    /// Returns `false` when no job was available. A failed handler is not an
    /// error here: the job is handed back through `fail` and counts as handled.
    #[tracing::instrument(skip(self))]
    pub async fn run_once(&self) -> Result<bool> {
        let Some(job) = self.broker.fetch_next().await? else {
            return Ok(false);
        };

        let started = Instant::now();
        let outcome = self.process(&job).await;
        metrics::histogram!("worker_job_duration_seconds", "job" => job.name.clone())
            .record(started.elapsed().as_secs_f64());

        match outcome {
            Ok(()) => {
                self.broker.complete(job.id).await?;
                metrics::counter!("worker_jobs_processed_total", "job" => job.name.clone())
                    .increment(1);
                tracing::debug!(job_id = %job.id, job = %job.name, "job completed");
            }
            Err(e) => {
                let reason = e.to_string();
                metrics::counter!("worker_jobs_failed_total", "job" => job.name.clone())
                    .increment(1);

                match self.broker.fail(job.id, &reason).await? {
                    FailureOutcome::Retrying { attempt, retry_at } => {
                        tracing::warn!(
                            job_id = %job.id,
                            job = %job.name,
                            attempt,
                            %retry_at,
                            error = %reason,
                            "job failed, retry scheduled"
                        );
                    }
                    FailureOutcome::Exhausted { attempts } => {
                        tracing::error!(
                            job_id = %job.id,
                            job = %job.name,
                            attempts,
                            error = %reason,
                            "job failed, no attempts left"
                        );
                    }
                }
            }
        }

        Ok(true)
    }

    /// Processes jobs until `shutdown` resolves.
    ///
    /// A job in flight is always settled before the loop checks for shutdown.
    /// Broker errors are logged and the loop backs off for one poll interval.
    pub async fn run(&self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);
        tracing::info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "worker started"
        );

        loop {
            let handled = match self.run_once().await {
                Ok(handled) => handled,
                Err(e) => {
                    tracing::error!(error = %e, "failed to consume queue");
                    false
                }
            };

            if handled {
                tokio::select! {
                    biased;
                    () = &mut shutdown => break,
                    () = std::future::ready(()) => continue,
                }
            }

            tokio::select! {
                () = &mut shutdown => break,
                () = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        tracing::info!("worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use event_queue::{Backoff, Broker, InMemoryBroker, JobId, JobOptions, JobState, NewJob};
    use mediator::{Event, EventHandler, EventHandlerError, Message};
    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Ping {
        n: u32,
    }

    impl Message for Ping {
        const NAME: &'static str = "Ping";
    }

    impl Event for Ping {}

    /// Fails the first `failures` deliveries, then succeeds.
    struct Flaky {
        failures: usize,
        seen: AtomicUsize,
    }

    #[async_trait]
    impl EventHandler<Ping> for Flaky {
        async fn handle(&self, event: &Ping) -> std::result::Result<(), EventHandlerError> {
            assert_eq!(event.n, 1);
            let call = self.seen.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(EventHandlerError::infrastructure("flaky"));
            }
            Ok(())
        }
    }

    fn options(attempts: u32) -> JobOptions {
        JobOptions {
            attempts,
            backoff: Backoff::Fixed { delay: 0 },
            delay: 0,
        }
    }

    fn worker(failures: usize) -> (EventWorker<InMemoryBroker>, Arc<Flaky>) {
        let handler = Arc::new(Flaky {
            failures,
            seen: AtomicUsize::new(0),
        });
        let mut builder = Mediator::builder();
        builder
            .register_event_handler::<Ping, _>(handler.clone())
            .unwrap();
        let worker = EventWorker::new(
            InMemoryBroker::new(),
            builder.build(),
            Duration::from_millis(10),
        );
        (worker, handler)
    }

    async fn enqueue(broker: &InMemoryBroker, name: &str, attempts: u32) -> JobId {
        broker
            .add(NewJob::new(name, serde_json::json!({ "n": 1 }), options(attempts)))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_run_once_on_empty_queue() {
        let (worker, handler) = worker(0);
        assert!(!worker.run_once().await.unwrap());
        assert_eq!(handler.seen.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_run_once_completes_job() {
        let (worker, handler) = worker(0);
        let id = enqueue(worker.broker(), "Ping", 3).await;

        assert!(worker.run_once().await.unwrap());

        let job = worker.broker().job(id).await.unwrap();
        assert_eq!(job.state, JobState::Completed);
        assert_eq!(handler.seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_job_is_retried_by_broker() {
        let (worker, handler) = worker(1);
        let id = enqueue(worker.broker(), "Ping", 3).await;

        assert!(worker.run_once().await.unwrap());
        let job = worker.broker().job(id).await.unwrap();
        assert_eq!(job.state, JobState::Waiting);
        assert_eq!(job.attempts_made, 1);
        assert!(job.last_error.unwrap().contains("flaky"));

        assert!(worker.run_once().await.unwrap());
        let job = worker.broker().job(id).await.unwrap();
        assert_eq!(job.state, JobState::Completed);
        assert_eq!(handler.seen.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_job_parked_after_last_attempt() {
        let (worker, _) = worker(usize::MAX);
        let id = enqueue(worker.broker(), "Ping", 2).await;

        assert!(worker.run_once().await.unwrap());
        assert!(worker.run_once().await.unwrap());
        assert!(!worker.run_once().await.unwrap());

        let job = worker.broker().job(id).await.unwrap();
        assert_eq!(job.state, JobState::Failed);
        assert_eq!(job.attempts_made, 2);
    }

    #[tokio::test]
    async fn test_unknown_job_name_fails_job() {
        let (worker, handler) = worker(0);
        let id = enqueue(worker.broker(), "Pong", 1).await;

        let job = worker.broker().fetch_next().await.unwrap().unwrap();
        let err = worker.process(&job).await.unwrap_err();
        assert!(matches!(err, WorkerError::Dispatch { ref name, .. } if name == "Pong"));
        worker.broker().fail(id, &err.to_string()).await.unwrap();

        assert_eq!(
            worker.broker().job(id).await.unwrap().state,
            JobState::Failed
        );
        assert_eq!(handler.seen.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_run_drains_queue_then_stops_on_shutdown() {
        let (worker, handler) = worker(0);
        for _ in 0..3 {
            enqueue(worker.broker(), "Ping", 1).await;
        }

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let run = worker.run(async {
            let _ = rx.await;
        });
        let stop = async {
            while handler.seen.load(Ordering::SeqCst) < 3 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            let _ = tx.send(());
        };
        tokio::time::timeout(Duration::from_secs(5), async { tokio::join!(run, stop) })
            .await
            .unwrap();

        for job in worker.broker().jobs().await {
            assert_eq!(job.state, JobState::Completed);
        }
    }

    #[tokio::test]
    async fn test_run_survives_broker_errors() {
        let (worker, _) = worker(0);
        worker.broker().close().await.unwrap();

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            worker.run(tokio::time::sleep(Duration::from_millis(50))),
        )
        .await;
        assert!(result.is_ok());
    }
}
