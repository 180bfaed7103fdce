//! Domain events raised by entities and services.
//!
//! Each event's [`Message::NAME`] is its routing key in the mediator and
//! its job name on the durable queue.

use common::AggregateId;
use mediator::{Event, Message};
use serde::{Deserialize, Serialize};

use crate::purchase_order::PurchaseOrderItem;
use crate::value_objects::Money;

/// A product's stock fell to or below its minimum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductStockLow {
    pub product_id: AggregateId,
    pub product_name: String,
    pub stock: u32,
    pub min_stock: u32,
}

impl Message for ProductStockLow {
    const NAME: &'static str = "ProductStockLow";
}

impl Event for ProductStockLow {}

/// The payment gateway approved a payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentApproved {
    pub payment_id: AggregateId,
    pub order_id: AggregateId,
    pub amount: Money,
    pub transaction_id: String,
}

impl Message for PaymentApproved {
    const NAME: &'static str = "PaymentApproved";
}

impl Event for PaymentApproved {}

/// A customer placed a purchase order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseOrderPlaced {
    pub order_id: AggregateId,
    pub customer_id: AggregateId,
    pub total: Money,
    pub items: Vec<PurchaseOrderItem>,
}

impl Message for PurchaseOrderPlaced {
    const NAME: &'static str = "PurchaseOrderPlaced";
}

impl Event for PurchaseOrderPlaced {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stock_low_wire_shape() {
        let id = AggregateId::new();
        let event = ProductStockLow {
            product_id: id,
            product_name: "Lamp".into(),
            stock: 2,
            min_stock: 5,
        };

        assert_eq!(event.name(), "ProductStockLow");
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "productId": id.to_string(),
                "productName": "Lamp",
                "stock": 2,
                "minStock": 5,
            })
        );
    }

    #[test]
    fn test_event_names_are_distinct() {
        let names = [
            ProductStockLow::NAME,
            PaymentApproved::NAME,
            PurchaseOrderPlaced::NAME,
        ];
        assert_eq!(names, ["ProductStockLow", "PaymentApproved", "PurchaseOrderPlaced"]);
    }
}
