//! Application service error types.

use domain::{DomainError, RepositoryError};
use event_queue::QueueError;
use mediator::MediatorError;
use thiserror::Error;
use validation::ValidationError;

/// Errors returned by application services.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Dispatch failed: {0}")]
    Mediator(#[from] MediatorError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}

impl From<ValidationError> for ServiceError {
    fn from(err: ValidationError) -> Self {
        ServiceError::Domain(err.into())
    }
}

impl From<RepositoryError> for ServiceError {
    fn from(err: RepositoryError) -> Self {
        ServiceError::Domain(err.into())
    }
}

/// Convenience type alias for service results.
pub type Result<T> = std::result::Result<T, ServiceError>;
