//! Domain layer for the e-commerce core.
//!
//! This crate provides:
//! - Entities validated at construction (Category, Product, User,
//!   PurchaseOrder, Payment)
//! - Value objects (Money, Dimensions)
//! - Domain events routed by the mediator and the durable queue
//! - The repository contract and an in-memory implementation

pub mod category;
pub mod entity;
pub mod error;
pub mod events;
pub mod payment;
pub mod product;
pub mod purchase_order;
pub mod repository;
pub mod user;
pub mod value_objects;

pub use category::Category;
pub use common::AggregateId;
pub use entity::Entity;
pub use error::{DomainError, Result};
pub use events::{PaymentApproved, ProductStockLow, PurchaseOrderPlaced};
pub use payment::{Payment, PaymentMethod, PaymentStatus};
pub use product::{NewProduct, Product};
pub use purchase_order::{PurchaseOrder, PurchaseOrderItem, PurchaseOrderStatus};
pub use repository::{InMemoryRepository, Repository, RepositoryError};
pub use user::{User, cpf_rule, is_valid_cpf};
pub use value_objects::{Dimensions, Money};
