//! Worker error types.

use event_queue::BrokerError;
use mediator::MediatorError;
use thiserror::Error;

/// Errors that can occur while consuming the queue.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The mediator could not deliver a job's event.
    #[error("Job '{name}' failed: {source}")]
    Dispatch {
        name: String,
        #[source]
        source: MediatorError,
    },

    /// The broker failed to hand out or settle a job.
    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),
}

/// Convenience type alias for worker results.
pub type Result<T> = std::result::Result<T, WorkerError>;
