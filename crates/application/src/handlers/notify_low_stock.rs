use std::sync::Arc;

use async_trait::async_trait;
use domain::ProductStockLow;
use mediator::{Envelope, EventHandler, EventHandlerError};

use crate::capabilities::{Email, Mailer};
use crate::config::NotificationConfig;

/// Emails the stock team when a product runs low.
///
/// Delivery is best-effort: a mailer failure is logged and the event still
/// counts as handled, so the job is not retried for a notification.
pub struct NotifyLowStock {
    mailer: Arc<dyn Mailer>,
    config: NotificationConfig,
}

impl NotifyLowStock {
    pub fn new(mailer: Arc<dyn Mailer>, config: NotificationConfig) -> Self {
        Self { mailer, config }
    }

    fn compose(&self, event: &ProductStockLow) -> Email {
        let text = format!(
            "Product {} ({}) has {} units left; the minimum is {}.",
            event.product_name, event.product_id, event.stock, event.min_stock
        );
        Email {
            from: self.config.from.clone(),
            to: self.config.stock_alert_to.clone(),
            subject: format!("Low stock: {}", event.product_name),
            html: Some(format!("<p>{text}</p>")),
            text,
        }
    }
}

#[async_trait]
impl EventHandler<Envelope<ProductStockLow>> for NotifyLowStock {
    #[tracing::instrument(skip_all, fields(product_id = %event.payload().product_id))]
    async fn handle(&self, event: &Envelope<ProductStockLow>) -> Result<(), EventHandlerError> {
        let email = self.compose(event.payload());
        match self.mailer.send(email).await {
            Ok(()) => {
                metrics::counter!("low_stock_notifications_total", "outcome" => "sent")
                    .increment(1);
                tracing::info!("Low stock notification sent");
            }
            Err(e) => {
                metrics::counter!("low_stock_notifications_total", "outcome" => "failed")
                    .increment(1);
                tracing::error!(error = %e, "Failed to send low stock notification");
            }
        }
        Ok(())
    }
}
