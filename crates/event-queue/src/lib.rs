//! Durable, at-least-once delivery of domain events to worker processes.
//!
//! [`EventQueue`] serializes events into named jobs and submits them to a
//! [`Broker`]. Brokers own retry bookkeeping: a failed job is rescheduled
//! after its backoff until its attempts run out. A claimed job is leased to
//! its consumer; when the lease runs out unsettled the broker counts a failed
//! attempt and the job becomes claimable again.

pub mod broker;
pub mod config;
pub mod error;
pub mod job;
pub mod memory;
pub mod postgres;
pub mod queue;

pub use broker::{Broker, BrokerError};
pub use config::QueueConfig;
pub use error::{ConfigError, QueueError, Result};
pub use job::{
    Backoff, FailureOutcome, Job, JobId, JobOptions, JobState, LEASE_EXPIRED, NewJob,
};
pub use memory::InMemoryBroker;
pub use postgres::PostgresBroker;
pub use queue::EventQueue;
