//! Mediator handlers for application messages.
//!
//! Domain and infrastructure failures are translated into
//! [`EventHandlerError`] here, at the handler boundary.

pub mod get_category;
pub mod mark_order_paid;
pub mod notify_low_stock;
pub mod process_payment;
pub mod reserve_stock;

pub use get_category::GetCategoryHandler;
pub use mark_order_paid::MarkOrderPaid;
pub use notify_low_stock::NotifyLowStock;
pub use process_payment::ProcessPaymentHandler;
pub use reserve_stock::ReserveStock;

use domain::DomainError;
use mediator::EventHandlerError;

use crate::error::ServiceError;

pub(crate) fn domain_failure(err: DomainError) -> EventHandlerError {
    if let Some((item, id)) = err.missing_item() {
        return EventHandlerError::not_found(item, id);
    }
    match err {
        DomainError::Validation(e) => EventHandlerError::Invalid(e),
        DomainError::Repository(e) => EventHandlerError::infrastructure(e),
        other => EventHandlerError::Rejected(other.to_string()),
    }
}

pub(crate) fn service_failure(err: ServiceError) -> EventHandlerError {
    match err {
        ServiceError::Domain(e) => domain_failure(e),
        other => EventHandlerError::infrastructure(other),
    }
}
