//! Handler traits and the business-level handler error.

use async_trait::async_trait;
use thiserror::Error;
use validation::ValidationError;

use crate::message::{Command, Event, Query};

/// Failure reported by a message handler.
///
/// Handlers translate repository and gateway failures into this type before
/// returning, so callers can tell a rejected request apart from broken
/// infrastructure with [`is_business`](Self::is_business).
#[derive(Debug, Error)]
pub enum EventHandlerError {
    /// A referenced item does not exist.
    #[error("{item} not found: {id}")]
    ItemNotFound { item: &'static str, id: String },

    /// A delete found nothing to remove.
    #[error("{item} not deleted: {id}")]
    ItemNotDeleted { item: &'static str, id: String },

    /// The request conflicts with the current state.
    #[error("Request rejected: {0}")]
    Rejected(String),

    /// Input failed validation.
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    /// A store, broker or gateway failed underneath the handler.
    #[error("Infrastructure failure: {0}")]
    Infrastructure(String),
}

impl EventHandlerError {
    pub fn not_found(item: &'static str, id: impl ToString) -> Self {
        EventHandlerError::ItemNotFound {
            item,
            id: id.to_string(),
        }
    }

    pub fn not_deleted(item: &'static str, id: impl ToString) -> Self {
        EventHandlerError::ItemNotDeleted {
            item,
            id: id.to_string(),
        }
    }

    /// Wraps any lower-level error, keeping only its message.
    pub fn infrastructure(err: impl std::fmt::Display) -> Self {
        EventHandlerError::Infrastructure(err.to_string())
    }

    /// Returns true when the caller's request was at fault rather than the system.
    pub fn is_business(&self) -> bool {
        !matches!(self, EventHandlerError::Infrastructure(_))
    }
}

/// Reacts to an event. Many handlers may share one event.
#[async_trait]
pub trait EventHandler<E: Event>: Send + Sync {
    async fn handle(&self, event: &E) -> Result<(), EventHandlerError>;
}

/// Executes a command and returns its output.
#[async_trait]
pub trait CommandHandler<C: Command>: Send + Sync {
    async fn handle(&self, command: C) -> Result<C::Output, EventHandlerError>;
}

/// Answers a query.
#[async_trait]
pub trait QueryHandler<Q: Query>: Send + Sync {
    async fn handle(&self, query: Q) -> Result<Q::Output, EventHandlerError>;
}
