//! Domain error types.

use common::AggregateId;
use thiserror::Error;
use validation::ValidationError;

use crate::repository::RepositoryError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Category not found: {0}")]
    CategoryNotFound(AggregateId),

    #[error("Product not found: {0}")]
    ProductNotFound(AggregateId),

    #[error("User not found: {0}")]
    UserNotFound(AggregateId),

    #[error("Purchase order not found: {0}")]
    PurchaseOrderNotFound(AggregateId),

    #[error("Payment not found: {0}")]
    PaymentNotFound(AggregateId),

    /// Stock cannot cover the requested quantity.
    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: AggregateId,
        requested: u32,
        available: u32,
    },

    /// A status change not allowed from the current status.
    #[error("Cannot {action} {entity} in status {status}")]
    InvalidTransition {
        entity: &'static str,
        status: &'static str,
        action: &'static str,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl DomainError {
    /// Returns the kind and id of the missing item for not-found errors.
    pub fn missing_item(&self) -> Option<(&'static str, AggregateId)> {
        match self {
            DomainError::CategoryNotFound(id) => Some(("Category", *id)),
            DomainError::ProductNotFound(id) => Some(("Product", *id)),
            DomainError::UserNotFound(id) => Some(("User", *id)),
            DomainError::PurchaseOrderNotFound(id) => Some(("PurchaseOrder", *id)),
            DomainError::PaymentNotFound(id) => Some(("Payment", *id)),
            _ => None,
        }
    }
}

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, DomainError>;
