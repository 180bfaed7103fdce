use std::sync::Arc;

use async_trait::async_trait;
use domain::{DomainError, PaymentApproved, PurchaseOrder, Repository};
use mediator::{Envelope, EventHandler, EventHandlerError};

use crate::handlers::domain_failure;

/// Moves the order to `Paid` once its payment is approved.
pub struct MarkOrderPaid {
    orders: Arc<dyn Repository<PurchaseOrder>>,
}

impl MarkOrderPaid {
    pub fn new(orders: Arc<dyn Repository<PurchaseOrder>>) -> Self {
        Self { orders }
    }
}

#[async_trait]
impl EventHandler<Envelope<PaymentApproved>> for MarkOrderPaid {
    #[tracing::instrument(skip_all, fields(order_id = %event.payload().order_id))]
    async fn handle(&self, event: &Envelope<PaymentApproved>) -> Result<(), EventHandlerError> {
        let order_id = event.payload().order_id;
        let mut order = self
            .orders
            .get_by_id(order_id)
            .await
            .map_err(EventHandlerError::infrastructure)?
            .ok_or_else(|| domain_failure(DomainError::PurchaseOrderNotFound(order_id)))?;

        order.mark_paid().map_err(domain_failure)?;
        self.orders
            .update(order)
            .await
            .map_err(EventHandlerError::infrastructure)?;

        tracing::info!("Purchase order marked paid");
        Ok(())
    }
}
