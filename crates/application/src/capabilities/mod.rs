//! External capabilities the core consumes, with in-memory implementations.

pub mod mailer;
pub mod payment_gateway;

pub use mailer::{Email, InMemoryMailer, LogMailer, Mailer, NotificationError};
pub use payment_gateway::{
    InMemoryPaymentGateway, PaymentConfirmation, PaymentGateway, PaymentGatewayError,
    PaymentRequest,
};
