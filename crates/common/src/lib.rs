//! Shared types used across the e-commerce crates.

pub mod types;

pub use types::{AggregateId, ParseIdError};
