use std::collections::HashMap;
use std::sync::Arc;

use common::AggregateId;
use domain::{
    DomainError, Entity, PaymentMethod, Product, PurchaseOrder, PurchaseOrderItem,
    PurchaseOrderPlaced, Repository, User,
};
use mediator::{Envelope, Mediator};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::messages::{PaymentReceipt, ProcessPayment};

/// A requested product and quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: AggregateId,
    pub quantity: u32,
}

/// Places, pays and cancels purchase orders.
///
/// Placing an order publishes `PurchaseOrderPlaced` in-process; paying
/// sends the `ProcessPayment` command.
#[derive(Clone)]
pub struct PurchaseOrderService {
    orders: Arc<dyn Repository<PurchaseOrder>>,
    users: Arc<dyn Repository<User>>,
    products: Arc<dyn Repository<Product>>,
    mediator: Mediator,
}

impl PurchaseOrderService {
    pub fn new(
        orders: Arc<dyn Repository<PurchaseOrder>>,
        users: Arc<dyn Repository<User>>,
        products: Arc<dyn Repository<Product>>,
        mediator: Mediator,
    ) -> Self {
        Self {
            orders,
            users,
            products,
            mediator,
        }
    }

    /// Prices each line at the product's current price and stores the order.
    ///
    /// Current stock must cover the total quantity requested per product,
    /// summed over every line naming it. When publishing
    /// `PurchaseOrderPlaced` fails the stored order is removed again.
    #[tracing::instrument(skip(self, lines), fields(lines = lines.len()))]
    pub async fn place_order(
        &self,
        customer_id: AggregateId,
        lines: &[OrderLine],
    ) -> Result<PurchaseOrder> {
        if self.users.get_by_id(customer_id).await?.is_none() {
            return Err(DomainError::UserNotFound(customer_id).into());
        }

        let mut requested: HashMap<AggregateId, u32> = HashMap::new();
        for line in lines {
            let total = requested.entry(line.product_id).or_default();
            *total = total.saturating_add(line.quantity);
        }

        let mut prices = HashMap::with_capacity(requested.len());
        for (&product_id, &wanted) in &requested {
            let product = self
                .products
                .get_by_id(product_id)
                .await?
                .ok_or(DomainError::ProductNotFound(product_id))?;
            if product.stock() < wanted {
                return Err(DomainError::InsufficientStock {
                    product_id,
                    requested: wanted,
                    available: product.stock(),
                }
                .into());
            }
            prices.insert(product_id, product.price());
        }

        let items = lines
            .iter()
            .filter_map(|line| {
                let price = prices.get(&line.product_id)?;
                Some(PurchaseOrderItem::new(line.product_id, line.quantity, *price))
            })
            .collect();

        let order = PurchaseOrder::new(customer_id, items)?;
        let order = self.orders.add(order).await?;

        let event = PurchaseOrderPlaced {
            order_id: order.id(),
            customer_id,
            total: order.total(),
            items: order.items().to_vec(),
        };
        if let Err(e) = self
            .mediator
            .publish(&Envelope::new(customer_id.to_string(), event))
            .await
        {
            if let Err(remove) = self.orders.delete(order.id()).await {
                tracing::error!(
                    order_id = %order.id(),
                    error = %remove,
                    "Failed to remove order after publish failure"
                );
            }
            return Err(e.into());
        }

        metrics::counter!("purchase_orders_placed_total").increment(1);
        tracing::info!(order_id = %order.id(), total = %order.total(), "Purchase order placed");
        Ok(order)
    }

    pub async fn get(&self, id: AggregateId) -> Result<PurchaseOrder> {
        self.orders
            .get_by_id(id)
            .await?
            .ok_or_else(|| DomainError::PurchaseOrderNotFound(id).into())
    }

    /// Charges the order through the `ProcessPayment` command.
    #[tracing::instrument(skip(self))]
    pub async fn pay(
        &self,
        order_id: AggregateId,
        method: PaymentMethod,
    ) -> Result<PaymentReceipt> {
        let receipt = self
            .mediator
            .send(ProcessPayment { order_id, method })
            .await?;
        tracing::info!(transaction_id = %receipt.transaction_id, "Purchase order charged");
        Ok(receipt)
    }

    #[tracing::instrument(skip(self))]
    pub async fn cancel(&self, id: AggregateId) -> Result<PurchaseOrder> {
        let mut order = self.get(id).await?;
        order.cancel()?;
        let order = self.orders.update(order).await?;
        tracing::info!("Purchase order cancelled");
        Ok(order)
    }
}
