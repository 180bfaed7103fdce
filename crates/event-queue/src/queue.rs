use std::sync::atomic::{AtomicBool, Ordering};

use mediator::Message;

use crate::broker::Broker;
use crate::config::QueueConfig;
use crate::error::{QueueError, Result};
use crate::job::{JobId, JobOptions, NewJob};

/// Producer-side handle to a durable queue.
///
/// Owns the broker connection. Jobs are named after the message's
/// [`Message::NAME`] and carry the serialized message as data.
pub struct EventQueue<B: Broker> {
    broker: B,
    options: JobOptions,
    closed: AtomicBool,
}

impl<B: Broker> EventQueue<B> {
    pub fn new(broker: B, config: &QueueConfig) -> Self {
        Self::with_options(broker, JobOptions::from_config(config))
    }

    pub fn with_options(broker: B, options: JobOptions) -> Self {
        Self {
            broker,
            options,
            closed: AtomicBool::new(false),
        }
    }

    pub fn broker(&self) -> &B {
        &self.broker
    }

    pub fn options(&self) -> JobOptions {
        self.options
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(QueueError::AlreadyClosed);
        }
        Ok(())
    }

    fn job_for<E: Message>(&self, event: &E) -> Result<NewJob> {
        Ok(NewJob::new(
            event.name(),
            serde_json::to_value(event)?,
            self.options,
        ))
    }

    /// Submits one event as a job.
    #[tracing::instrument(skip(self, event), fields(job = E::NAME))]
    pub async fn enqueue<E: Message>(&self, event: &E) -> Result<JobId> {
        self.ensure_open()?;
        let job = self.job_for(event)?;

        match self.broker.add(job).await {
            Ok(id) => {
                metrics::counter!("queue_jobs_enqueued_total", "job" => E::NAME).increment(1);
                tracing::debug!(job_id = %id, "Job enqueued");
                Ok(id)
            }
            Err(e) => {
                metrics::counter!("queue_enqueue_failures_total", "job" => E::NAME).increment(1);
                tracing::error!(error = %e, "Failed to enqueue job");
                Err(e.into())
            }
        }
    }

    /// Submits an already serialized message under `name`.
    ///
    /// Used to replay messages that were stored while the broker was down.
    #[tracing::instrument(skip(self, data), fields(job = name))]
    pub async fn enqueue_raw(&self, name: &str, data: serde_json::Value) -> Result<JobId> {
        self.ensure_open()?;

        match self.broker.add(NewJob::new(name, data, self.options)).await {
            Ok(id) => {
                metrics::counter!("queue_jobs_enqueued_total", "job" => name.to_string())
                    .increment(1);
                tracing::debug!(job_id = %id, "Job enqueued");
                Ok(id)
            }
            Err(e) => {
                metrics::counter!("queue_enqueue_failures_total", "job" => name.to_string())
                    .increment(1);
                tracing::error!(error = %e, "Failed to enqueue job");
                Err(e.into())
            }
        }
    }

    /// Submits all events in one broker call, preserving their order.
    ///
    /// An empty slice is a no-op and never reaches the broker.
    #[tracing::instrument(skip(self, events), fields(job = E::NAME, count = events.len()))]
    pub async fn enqueue_in_batch<E: Message>(&self, events: &[E]) -> Result<Vec<JobId>> {
        self.ensure_open()?;
        if events.is_empty() {
            return Ok(Vec::new());
        }

        let jobs = events
            .iter()
            .map(|event| self.job_for(event))
            .collect::<Result<Vec<_>>>()?;

        match self.broker.add_bulk(jobs).await {
            Ok(ids) => {
                metrics::counter!("queue_jobs_enqueued_total", "job" => E::NAME)
                    .increment(ids.len() as u64);
                tracing::debug!(count = ids.len(), "Batch enqueued");
                Ok(ids)
            }
            Err(e) => {
                metrics::counter!("queue_enqueue_failures_total", "job" => E::NAME).increment(1);
                tracing::error!(error = %e, "Failed to enqueue batch");
                Err(e.into())
            }
        }
    }

    /// Releases the broker connection.
    ///
    /// Only the first successful call closes; later calls fail with
    /// [`QueueError::AlreadyClosed`]. A broker failure leaves the queue open.
    pub async fn close_connection(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(QueueError::AlreadyClosed);
        }

        if let Err(e) = self.broker.close().await {
            self.closed.store(false, Ordering::Release);
            tracing::error!(error = %e, "Failed to close queue connection");
            return Err(e.into());
        }

        tracing::info!("Queue connection closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryBroker;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct StockLow {
        product_id: String,
        stock: u32,
    }

    impl Message for StockLow {
        const NAME: &'static str = "ProductStockLow";
    }

    fn stock_low(id: &str, stock: u32) -> StockLow {
        StockLow {
            product_id: id.to_string(),
            stock,
        }
    }

    fn queue() -> (EventQueue<InMemoryBroker>, InMemoryBroker) {
        let broker = InMemoryBroker::new();
        (
            EventQueue::new(broker.clone(), &QueueConfig::default()),
            broker,
        )
    }

    #[tokio::test]
    async fn test_enqueue_names_job_after_message() {
        let (queue, broker) = queue();
        let id = queue.enqueue(&stock_low("p-1", 2)).await.unwrap();

        let job = broker.job(id).await.unwrap();
        assert_eq!(job.name, "ProductStockLow");
        assert_eq!(job.data, json!({ "product_id": "p-1", "stock": 2 }));
        assert_eq!(job.options, JobOptions::from_config(&QueueConfig::default()));
    }

    #[tokio::test]
    async fn test_enqueue_in_batch_is_one_call_in_input_order() {
        let (queue, broker) = queue();
        let events = vec![stock_low("a", 1), stock_low("b", 2), stock_low("c", 3)];

        let ids = queue.enqueue_in_batch(&events).await.unwrap();

        assert_eq!(broker.batches().await, vec![ids]);
        let shapes: Vec<_> = broker
            .jobs()
            .await
            .into_iter()
            .map(|j| (j.name, j.data))
            .collect();
        assert_eq!(
            shapes,
            vec![
                ("ProductStockLow".to_string(), json!({ "product_id": "a", "stock": 1 })),
                ("ProductStockLow".to_string(), json!({ "product_id": "b", "stock": 2 })),
                ("ProductStockLow".to_string(), json!({ "product_id": "c", "stock": 3 })),
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_batch_skips_broker() {
        let (queue, broker) = queue();
        let ids = queue.enqueue_in_batch::<StockLow>(&[]).await.unwrap();
        assert!(ids.is_empty());
        assert!(broker.batches().await.is_empty());
    }

    #[tokio::test]
    async fn test_broker_message_is_preserved() {
        let (queue, broker) = queue();
        broker.set_fail_on_add(Some("connection refused")).await;

        let err = queue.enqueue(&stock_low("a", 1)).await.unwrap_err();
        assert!(matches!(&err, QueueError::Broker(msg) if msg == "connection refused"));
        assert_eq!(err.to_string(), "connection refused");

        let err = queue
            .enqueue_in_batch(&[stock_low("a", 1)])
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "connection refused");

        broker.set_fail_on_close(Some("quit timed out")).await;
        let err = queue.close_connection().await.unwrap_err();
        assert_eq!(err.to_string(), "quit timed out");
    }

    #[tokio::test]
    async fn test_close_is_once_only() {
        let (queue, broker) = queue();
        queue.close_connection().await.unwrap();
        assert!(broker.is_closed().await);

        assert!(matches!(
            queue.close_connection().await,
            Err(QueueError::AlreadyClosed)
        ));
        assert!(matches!(
            queue.enqueue(&stock_low("a", 1)).await,
            Err(QueueError::AlreadyClosed)
        ));
    }

    #[tokio::test]
    async fn test_failed_close_can_be_retried() {
        let (queue, broker) = queue();
        broker.set_fail_on_close(Some("busy")).await;

        assert!(queue.close_connection().await.is_err());
        assert!(!queue.is_closed());

        queue.close_connection().await.unwrap();
        assert!(queue.is_closed());
    }

    #[tokio::test]
    async fn test_enqueue_raw_keeps_name_and_data() {
        let (queue, broker) = queue();
        let data = json!({ "productId": "p-1", "stock": 2 });

        let id = queue.enqueue_raw("ProductStockLow", data.clone()).await.unwrap();

        let job = broker.job(id).await.unwrap();
        assert_eq!(job.name, "ProductStockLow");
        assert_eq!(job.data, data);
        assert_eq!(job.options, queue.options());

        queue.close_connection().await.unwrap();
        assert!(matches!(
            queue.enqueue_raw("ProductStockLow", json!({})).await,
            Err(QueueError::AlreadyClosed)
        ));
    }
}
