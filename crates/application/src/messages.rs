//! Commands and queries handled in-process.

use common::AggregateId;
use domain::{Money, PaymentMethod};
use mediator::{Command, Message, Query};
use serde::{Deserialize, Serialize};

/// Charges a pending purchase order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessPayment {
    pub order_id: AggregateId,
    pub method: PaymentMethod,
}

impl Message for ProcessPayment {
    const NAME: &'static str = "ProcessPayment";
}

impl Command for ProcessPayment {
    type Output = PaymentReceipt;
}

/// Proof of an approved payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceipt {
    pub payment_id: AggregateId,
    pub order_id: AggregateId,
    pub amount: Money,
    pub transaction_id: String,
}

/// Looks up one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetCategory {
    pub id: AggregateId,
}

impl Message for GetCategory {
    const NAME: &'static str = "GetCategory";
}

impl Query for GetCategory {
    type Output = domain::Category;
}
