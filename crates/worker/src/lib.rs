//! Queue consumer for durable domain events.
//!
//! This crate provides:
//! - [`EventWorker`]: claims queued jobs and delivers them to a [`mediator::Mediator`]
//! - [`WorkerConfig`]: environment-driven settings for the `worker` binary
//! - [`WorkerError`]: failures while consuming the queue
//!
//! Retries belong to the broker: a job whose handler fails is reported back
//! with `fail`, and the broker decides whether it runs again. A job left
//! unsettled (the process died mid-handler) is handed out again once its
//! claim lease runs out, so `QUEUE_VISIBILITY_TIMEOUT` must stay above
//! `WORKER_HANDLER_TIMEOUT_MS`.

pub mod config;
pub mod error;
pub mod worker;

pub use config::WorkerConfig;
pub use error::{Result, WorkerError};
pub use worker::EventWorker;
