use async_trait::async_trait;
use thiserror::Error;

use crate::job::{FailureOutcome, Job, JobId, NewJob};

/// Failure reported by a broker backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct BrokerError {
    message: String,
}

impl BrokerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn into_message(self) -> String {
        self.message
    }
}

impl From<sqlx::Error> for BrokerError {
    fn from(err: sqlx::Error) -> Self {
        Self::new(err.to_string())
    }
}

impl From<serde_json::Error> for BrokerError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(err.to_string())
    }
}

/// Backend that stores jobs and hands them to consumers.
///
/// Producers call [`add`](Broker::add) and [`add_bulk`](Broker::add_bulk);
/// consumers claim with [`fetch_next`](Broker::fetch_next) and settle each
/// claimed job with [`complete`](Broker::complete) or [`fail`](Broker::fail).
#[async_trait]
pub trait Broker: Send + Sync {
    async fn add(&self, job: NewJob) -> Result<JobId, BrokerError>;

    /// Adds all jobs atomically, preserving order.
    async fn add_bulk(&self, jobs: Vec<NewJob>) -> Result<Vec<JobId>, BrokerError>;

    /// Claims the oldest job that is due, marking it active.
    async fn fetch_next(&self) -> Result<Option<Job>, BrokerError>;

    async fn complete(&self, id: JobId) -> Result<(), BrokerError>;

    /// Records a failed attempt; reschedules the job while attempts remain.
    async fn fail(&self, id: JobId, reason: &str) -> Result<FailureOutcome, BrokerError>;

    async fn close(&self) -> Result<(), BrokerError>;
}
