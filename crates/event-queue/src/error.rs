use thiserror::Error;

use crate::broker::BrokerError;

/// Errors returned by [`EventQueue`](crate::EventQueue) operations.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The broker rejected the operation. Carries the broker's message as-is.
    #[error("{0}")]
    Broker(String),

    /// The queue's connection was already closed.
    #[error("Queue connection is already closed")]
    AlreadyClosed,

    /// An event could not be serialized into a job payload.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<BrokerError> for QueueError {
    fn from(err: BrokerError) -> Self {
        QueueError::Broker(err.into_message())
    }
}

/// Result type for queue operations.
pub type Result<T> = std::result::Result<T, QueueError>;

/// An environment variable held a value that cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}
