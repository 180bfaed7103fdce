use common::AggregateId;
use serde::{Deserialize, Serialize};
use validation::{Rule, ValidationError};

use crate::entity::{Entity, check};
use crate::error::{DomainError, Result};
use crate::value_objects::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CreditCard,
    DebitCard,
    Pix,
    BankSlip,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PaymentStatus {
    #[default]
    Pending,
    Approved {
        transaction_id: String,
    },
    Rejected {
        reason: String,
    },
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Approved { .. } => "Approved",
            PaymentStatus::Rejected { .. } => "Rejected",
        }
    }
}

/// A payment attempt for a purchase order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    id: AggregateId,
    order_id: AggregateId,
    amount: Money,
    method: PaymentMethod,
    status: PaymentStatus,
}

impl Payment {
    pub fn new(
        order_id: AggregateId,
        amount: Money,
        method: PaymentMethod,
    ) -> std::result::Result<Self, ValidationError> {
        let payment = Self {
            id: AggregateId::new(),
            order_id,
            amount,
            method,
            status: PaymentStatus::Pending,
        };
        payment.validate()?;
        Ok(payment)
    }

    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        check(self, |v| {
            v.set_rule("order_id", [Rule::Required, Rule::Uuid])
                .set_rule("amount.cents", [Rule::Required, Rule::Integer, Rule::Min(1.0)])
                .set_rule("method", [Rule::Required, Rule::String])
        })
    }

    pub fn order_id(&self) -> AggregateId {
        self.order_id
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn method(&self) -> PaymentMethod {
        self.method
    }

    pub fn status(&self) -> &PaymentStatus {
        &self.status
    }

    pub fn transaction_id(&self) -> Option<&str> {
        match &self.status {
            PaymentStatus::Approved { transaction_id } => Some(transaction_id),
            _ => None,
        }
    }

    pub fn approve(&mut self, transaction_id: impl Into<String>) -> Result<()> {
        self.ensure_pending("approve")?;
        self.status = PaymentStatus::Approved {
            transaction_id: transaction_id.into(),
        };
        Ok(())
    }

    pub fn reject(&mut self, reason: impl Into<String>) -> Result<()> {
        self.ensure_pending("reject")?;
        self.status = PaymentStatus::Rejected {
            reason: reason.into(),
        };
        Ok(())
    }

    fn ensure_pending(&self, action: &'static str) -> Result<()> {
        if self.status != PaymentStatus::Pending {
            return Err(DomainError::InvalidTransition {
                entity: Self::KIND,
                status: self.status.as_str(),
                action,
            });
        }
        Ok(())
    }
}

impl Entity for Payment {
    const KIND: &'static str = "Payment";

    fn id(&self) -> AggregateId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payment() -> Payment {
        Payment::new(AggregateId::new(), Money::from_cents(1500), PaymentMethod::Pix).unwrap()
    }

    #[test]
    fn test_amount_must_be_positive() {
        let err = Payment::new(AggregateId::new(), Money::zero(), PaymentMethod::Pix).unwrap_err();
        assert!(err.field("amount.cents").is_some());
    }

    #[test]
    fn test_approve_records_transaction() {
        let mut p = payment();
        p.approve("tx-1").unwrap();
        assert_eq!(p.transaction_id(), Some("tx-1"));
        assert!(p.reject("late").is_err());
    }

    #[test]
    fn test_reject_keeps_reason() {
        let mut p = payment();
        p.reject("card declined").unwrap();
        assert_eq!(
            p.status(),
            &PaymentStatus::Rejected {
                reason: "card declined".into()
            }
        );
        assert!(p.transaction_id().is_none());
        assert!(p.approve("tx").is_err());
    }

    #[test]
    fn test_method_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(PaymentMethod::CreditCard).unwrap(),
            serde_json::json!("credit_card")
        );
    }
}
