use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};
use validation::{Rule, ValidationError};

use crate::entity::{Entity, check};
use crate::error::{DomainError, Result};
use crate::value_objects::Money;

/// Status of a purchase order.
///
/// ```text
/// Pending ──┬──► Paid
///           └──► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PurchaseOrderStatus {
    #[default]
    Pending,
    Paid,
    Cancelled,
}

impl PurchaseOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseOrderStatus::Pending => "Pending",
            PurchaseOrderStatus::Paid => "Paid",
            PurchaseOrderStatus::Cancelled => "Cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PurchaseOrderStatus::Pending)
    }
}

impl std::fmt::Display for PurchaseOrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A line of a purchase order, priced when the order was placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderItem {
    pub product_id: AggregateId,
    pub quantity: u32,
    pub unit_price: Money,
}

impl PurchaseOrderItem {
    pub fn new(product_id: AggregateId, quantity: u32, unit_price: Money) -> Self {
        Self {
            product_id,
            quantity,
            unit_price,
        }
    }

    /// Returns quantity * unit_price.
    pub fn total_price(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// A customer's order for one or more products.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseOrder {
    id: AggregateId,
    customer_id: AggregateId,
    items: Vec<PurchaseOrderItem>,
    status: PurchaseOrderStatus,
    created_at: DateTime<Utc>,
    #[serde(default)]
    payment_id: Option<AggregateId>,
}

impl PurchaseOrder {
    /// Creates a pending order. Needs at least one item.
    pub fn new(
        customer_id: AggregateId,
        items: Vec<PurchaseOrderItem>,
    ) -> std::result::Result<Self, ValidationError> {
        let order = Self {
            id: AggregateId::new(),
            customer_id,
            items,
            status: PurchaseOrderStatus::Pending,
            created_at: Utc::now(),
            payment_id: None,
        };
        order.validate()?;
        Ok(order)
    }

    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        check(self, |v| {
            v.set_rule("customer_id", [Rule::Required, Rule::Uuid])
                .set_rule("items", [Rule::Required])
        })?;

        // Item rules are per line, so report them under indexed names.
        let mut errors = Vec::new();
        for (i, item) in self.items.iter().enumerate() {
            let field = format!("items.{i}");
            let result = check(item, |v| {
                v.set_rule("quantity", [Rule::Required, Rule::Integer, Rule::Min(1.0)])
                    .set_rule(
                        "unit_price.cents",
                        [Rule::Required, Rule::Integer, Rule::Min(0.0)],
                    )
            });
            if let Err(e) = result {
                errors.extend(e.into_errors().into_iter().map(|mut fe| {
                    fe.field = format!("{field}.{}", fe.field);
                    fe
                }));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(errors))
        }
    }

    pub fn customer_id(&self) -> AggregateId {
        self.customer_id
    }

    pub fn items(&self) -> &[PurchaseOrderItem] {
        &self.items
    }

    pub fn status(&self) -> PurchaseOrderStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// The payment currently attached to this order, if any.
    pub fn payment_id(&self) -> Option<AggregateId> {
        self.payment_id
    }

    pub fn total(&self) -> Money {
        self.items.iter().map(PurchaseOrderItem::total_price).sum()
    }

    /// Adds a line while the order is still pending.
    pub fn add_item(&mut self, item: PurchaseOrderItem) -> Result<()> {
        self.ensure_pending("add items to")?;
        self.items.push(item);
        if let Err(e) = self.validate() {
            self.items.pop();
            return Err(e.into());
        }
        Ok(())
    }

    /// Reserves the order for one payment attempt.
    pub fn attach_payment(&mut self, payment_id: AggregateId) -> Result<()> {
        self.ensure_pending("attach a payment to")?;
        self.payment_id = Some(payment_id);
        Ok(())
    }

    /// Releases the order after a payment attempt that did not go through.
    pub fn detach_payment(&mut self) {
        self.payment_id = None;
    }

    pub fn mark_paid(&mut self) -> Result<()> {
        self.ensure_pending("pay")?;
        self.status = PurchaseOrderStatus::Paid;
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<()> {
        self.ensure_pending("cancel")?;
        self.status = PurchaseOrderStatus::Cancelled;
        Ok(())
    }

    fn ensure_pending(&self, action: &'static str) -> Result<()> {
        if self.status != PurchaseOrderStatus::Pending {
            return Err(DomainError::InvalidTransition {
                entity: Self::KIND,
                status: self.status.as_str(),
                action,
            });
        }
        Ok(())
    }
}

impl Entity for PurchaseOrder {
    const KIND: &'static str = "PurchaseOrder";

    fn id(&self) -> AggregateId {
        self.id
    }
}
