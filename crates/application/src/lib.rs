//! Application layer for the e-commerce core.
//!
//! This crate provides:
//! - Use-case services (categories, products, purchase orders)
//! - Mediator handlers for domain events, commands and queries
//! - External capabilities (mailer, payment gateway) with in-memory doubles
//! - An [`Outbox`] that keeps events while the broker is unavailable
//! - [`bootstrap`] to wire it all into a [`mediator::Mediator`]

pub mod bootstrap;
pub mod capabilities;
pub mod config;
pub mod error;
pub mod handlers;
pub mod messages;
pub mod outbox;
pub mod services;

pub use bootstrap::{AppDeps, Application, Repositories, build_application, build_mediator};
pub use capabilities::{
    Email, InMemoryMailer, InMemoryPaymentGateway, LogMailer, Mailer, NotificationError,
    PaymentGateway, PaymentGatewayError,
};
pub use config::NotificationConfig;
pub use error::{Result, ServiceError};
pub use messages::{GetCategory, PaymentReceipt, ProcessPayment};
pub use outbox::{Delivery, Outbox, OutboxMessage};
pub use services::{CategoryService, OrderLine, ProductService, PurchaseOrderService};
