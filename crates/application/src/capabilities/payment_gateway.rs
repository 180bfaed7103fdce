//! Payment gateway capability and in-memory implementation.

use std::sync::Arc;

use async_trait::async_trait;
use common::AggregateId;
use domain::{Money, PaymentMethod};
use thiserror::Error;
use tokio::sync::RwLock;

/// A charge request for one purchase order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    pub order_id: AggregateId,
    pub amount: Money,
    pub method: PaymentMethod,
}

/// Result of a successful charge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentConfirmation {
    /// The transaction id assigned by the gateway.
    pub transaction_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentGatewayError {
    /// The gateway refused the charge.
    #[error("Payment declined: {0}")]
    Declined(String),

    /// The gateway could not be reached.
    #[error("Payment gateway unavailable: {0}")]
    Unavailable(String),
}

/// Trait for charging customers.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn make_payment(
        &self,
        request: &PaymentRequest,
    ) -> Result<PaymentConfirmation, PaymentGatewayError>;
}

#[derive(Debug, Default)]
struct InMemoryGatewayState {
    charges: Vec<(String, PaymentRequest)>,
    next_id: u32,
    decline: Option<String>,
    unavailable: Option<String>,
}

/// In-memory payment gateway for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentGateway {
    state: Arc<RwLock<InMemoryGatewayState>>,
}

impl InMemoryPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declines every charge with `reason`. `None` clears it.
    pub async fn set_fail_on_charge(&self, reason: Option<&str>) {
        self.state.write().await.decline = reason.map(str::to_string);
    }

    /// Reports the gateway as unreachable. `None` clears it.
    pub async fn set_unavailable(&self, message: Option<&str>) {
        self.state.write().await.unavailable = message.map(str::to_string);
    }

    /// Returns the number of accepted charges.
    pub async fn charge_count(&self) -> usize {
        self.state.read().await.charges.len()
    }

    pub async fn charges(&self) -> Vec<(String, PaymentRequest)> {
        self.state.read().await.charges.clone()
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn make_payment(
        &self,
        request: &PaymentRequest,
    ) -> Result<PaymentConfirmation, PaymentGatewayError> {
        let mut state = self.state.write().await;

        if let Some(message) = &state.unavailable {
            return Err(PaymentGatewayError::Unavailable(message.clone()));
        }
        if let Some(reason) = &state.decline {
            return Err(PaymentGatewayError::Declined(reason.clone()));
        }

        state.next_id += 1;
        let transaction_id = format!("TX-{:04}", state.next_id);
        state
            .charges
            .push((transaction_id.clone(), request.clone()));

        Ok(PaymentConfirmation { transaction_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> PaymentRequest {
        PaymentRequest {
            order_id: AggregateId::new(),
            amount: Money::from_cents(5000),
            method: PaymentMethod::CreditCard,
        }
    }

    #[tokio::test]
    async fn test_sequential_transaction_ids() {
        let gateway = InMemoryPaymentGateway::new();
        let r1 = gateway.make_payment(&request()).await.unwrap();
        let r2 = gateway.make_payment(&request()).await.unwrap();

        assert_eq!(r1.transaction_id, "TX-0001");
        assert_eq!(r2.transaction_id, "TX-0002");
        assert_eq!(gateway.charge_count().await, 2);
    }

    #[tokio::test]
    async fn test_declined_charge_is_not_recorded() {
        let gateway = InMemoryPaymentGateway::new();
        gateway.set_fail_on_charge(Some("insufficient funds")).await;

        let err = gateway.make_payment(&request()).await.unwrap_err();
        assert_eq!(
            err,
            PaymentGatewayError::Declined("insufficient funds".into())
        );
        assert_eq!(gateway.charge_count().await, 0);
    }

    #[tokio::test]
    async fn test_unavailable_wins_over_decline() {
        let gateway = InMemoryPaymentGateway::new();
        gateway.set_fail_on_charge(Some("nope")).await;
        gateway.set_unavailable(Some("timeout")).await;

        assert!(matches!(
            gateway.make_payment(&request()).await,
            Err(PaymentGatewayError::Unavailable(_))
        ));
    }
}
