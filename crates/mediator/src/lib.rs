//! In-process mediation of domain events, commands and queries.
//!
//! This crate provides:
//! - [`Message`], [`Event`], [`Command`] and [`Query`] traits plus the
//!   [`Envelope`] that stamps a payload with its principal and timestamp
//! - Async handler traits for each message kind
//! - [`Mediator`], a registration table frozen by [`MediatorBuilder`]
//!
//! Events fan out to every registered handler. Commands and queries have
//! exactly one handler whose result is returned to the caller.

pub mod error;
pub mod handler;
pub mod mediator;
pub mod message;

pub use error::{MediatorError, Result};
pub use handler::{CommandHandler, EventHandler, EventHandlerError, QueryHandler};
pub use mediator::{Mediator, MediatorBuilder};
pub use message::{Command, Envelope, Event, Message, Query};
