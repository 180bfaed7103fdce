use std::sync::Arc;

use async_trait::async_trait;
use domain::{PurchaseOrderItem, PurchaseOrderPlaced};
use event_queue::Broker;
use mediator::{Envelope, EventHandler, EventHandlerError};

use crate::handlers::service_failure;
use crate::services::ProductService;

/// Takes ordered quantities out of stock when an order is placed.
///
/// All lines are reserved or none: when one line fails, the lines already
/// taken are put back before the error is returned.
pub struct ReserveStock<B: Broker> {
    products: Arc<ProductService<B>>,
}

impl<B: Broker> ReserveStock<B> {
    pub fn new(products: Arc<ProductService<B>>) -> Self {
        Self { products }
    }
}

#[async_trait]
impl<B: Broker + 'static> EventHandler<Envelope<PurchaseOrderPlaced>> for ReserveStock<B> {
    #[tracing::instrument(skip_all, fields(order_id = %event.payload().order_id))]
    async fn handle(
        &self,
        event: &Envelope<PurchaseOrderPlaced>,
    ) -> Result<(), EventHandlerError> {
        let mut reserved = Vec::new();
        for item in &event.payload().items {
            if let Err(e) = self
                .products
                .decrease_stock(item.product_id, item.quantity)
                .await
            {
                self.release(&reserved).await;
                return Err(service_failure(e));
            }
            reserved.push(item);
        }
        Ok(())
    }
}

impl<B: Broker> ReserveStock<B> {
    async fn release(&self, reserved: &[&PurchaseOrderItem]) {
        for item in reserved.iter().rev() {
            if let Err(e) = self
                .products
                .increase_stock(item.product_id, item.quantity)
                .await
            {
                tracing::error!(
                    product_id = %item.product_id,
                    quantity = item.quantity,
                    error = %e,
                    "Failed to release reserved stock"
                );
            }
        }
    }
}
