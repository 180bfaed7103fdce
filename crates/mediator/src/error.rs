//! Mediator error types.

use std::time::Duration;

use thiserror::Error;

use crate::handler::EventHandlerError;

/// Errors raised while registering or dispatching messages.
#[derive(Debug, Error)]
pub enum MediatorError {
    /// Nothing is registered under the name.
    #[error("No handler registered for '{0}'")]
    NoHandler(String),

    /// A command or query name already has a different handler.
    #[error("A handler is already registered for '{0}'")]
    DuplicateHandler(String),

    /// The registered handler expects a different message type under this name.
    #[error("Handler registered for '{0}' expects a different message type")]
    TypeMismatch(String),

    /// A payload dispatched by name could not be decoded for a handler.
    #[error("Invalid payload for '{name}': {source}")]
    Payload {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    /// A handler did not settle within the configured timeout.
    #[error("Handler for '{name}' timed out after {timeout:?}")]
    HandlerTimeout { name: String, timeout: Duration },

    /// A handler failed.
    #[error("Handler for '{name}' failed: {source}")]
    Handler {
        name: String,
        #[source]
        source: EventHandlerError,
    },
}

impl MediatorError {
    /// Returns the handler's own error when a handler failed.
    pub fn handler_error(&self) -> Option<&EventHandlerError> {
        match self {
            MediatorError::Handler { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Result type for mediator operations.
pub type Result<T> = std::result::Result<T, MediatorError>;
