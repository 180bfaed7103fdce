use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use common::AggregateId;
use domain::{
    DomainError, Entity, Payment, PaymentApproved, PaymentStatus, PurchaseOrder,
    PurchaseOrderStatus, Repository,
};
use event_queue::Broker;
use mediator::{CommandHandler, Envelope, EventHandlerError};

use crate::capabilities::{PaymentGateway, PaymentGatewayError, PaymentRequest};
use crate::handlers::domain_failure;
use crate::messages::{PaymentReceipt, ProcessPayment};
use crate::outbox::{Delivery, Outbox};

/// Charges a pending order through the payment gateway.
///
/// Every attempt is stored as a [`Payment`] and attached to the order before
/// the gateway is called, so an order is charged at most once: a second
/// command is rejected while the attached payment is pending or approved.
/// Declines and gateway outages detach the payment again.
///
/// An approval is published as `PaymentApproved` through the [`Outbox`],
/// stamped with the order id. Once the gateway has taken the money the
/// receipt is always returned.
pub struct ProcessPaymentHandler<B: Broker> {
    orders: Arc<dyn Repository<PurchaseOrder>>,
    payments: Arc<dyn Repository<Payment>>,
    gateway: Arc<dyn PaymentGateway>,
    outbox: Arc<Outbox<B>>,
    in_flight: InFlight,
}

impl<B: Broker> ProcessPaymentHandler<B> {
    pub fn new(
        orders: Arc<dyn Repository<PurchaseOrder>>,
        payments: Arc<dyn Repository<Payment>>,
        gateway: Arc<dyn PaymentGateway>,
        outbox: Arc<Outbox<B>>,
    ) -> Self {
        Self {
            orders,
            payments,
            gateway,
            outbox,
            in_flight: InFlight::default(),
        }
    }

    /// Refuses orders that already carry a live payment.
    async fn ensure_unpaid(&self, order: &PurchaseOrder) -> Result<(), EventHandlerError> {
        let Some(payment_id) = order.payment_id() else {
            return Ok(());
        };
        let existing = self
            .payments
            .get_by_id(payment_id)
            .await
            .map_err(EventHandlerError::infrastructure)?;

        match existing.as_ref().map(Payment::status) {
            Some(PaymentStatus::Pending) => Err(EventHandlerError::Rejected(format!(
                "Payment {payment_id} for purchase order {} is already in progress",
                order.id()
            ))),
            Some(PaymentStatus::Approved { .. }) => Err(EventHandlerError::Rejected(format!(
                "Purchase order {} is already paid by payment {payment_id}",
                order.id()
            ))),
            _ => Ok(()),
        }
    }

    /// Marks the attempt rejected and frees the order for another one.
    async fn release(
        &self,
        mut order: PurchaseOrder,
        mut payment: Payment,
        reason: &str,
    ) -> Result<(), EventHandlerError> {
        payment.reject(reason).map_err(domain_failure)?;
        self.payments
            .update(payment)
            .await
            .map_err(EventHandlerError::infrastructure)?;
        order.detach_payment();
        self.orders
            .update(order)
            .await
            .map_err(EventHandlerError::infrastructure)?;
        Ok(())
    }

    /// Records an approval whose money is already captured. Failures are
    /// logged, never returned.
    async fn settle(&self, payment: &Payment, approved: PaymentApproved) {
        if let Err(e) = self.payments.update(payment.clone()).await {
            tracing::error!(
                payment_id = %payment.id(),
                error = %e,
                "Failed to store approved payment"
            );
        }

        let envelope = Envelope::new(approved.order_id.to_string(), approved);
        match self.outbox.publish(&envelope).await {
            Ok(Delivery::Queued) => {}
            Ok(Delivery::Deferred) => {
                tracing::warn!(payment_id = %payment.id(), "Payment approval kept in the outbox");
            }
            Err(e) => {
                tracing::error!(
                    payment_id = %payment.id(),
                    error = %e,
                    "Failed to record payment approval"
                );
            }
        }
    }
}

#[async_trait]
impl<B: Broker + 'static> CommandHandler<ProcessPayment> for ProcessPaymentHandler<B> {
    #[tracing::instrument(skip_all, fields(order_id = %command.order_id))]
    async fn handle(&self, command: ProcessPayment) -> Result<PaymentReceipt, EventHandlerError> {
        let _claim = self.in_flight.claim(command.order_id).ok_or_else(|| {
            EventHandlerError::Rejected(format!(
                "A payment for purchase order {} is already in progress",
                command.order_id
            ))
        })?;

        let mut order = self
            .orders
            .get_by_id(command.order_id)
            .await
            .map_err(EventHandlerError::infrastructure)?
            .ok_or_else(|| domain_failure(DomainError::PurchaseOrderNotFound(command.order_id)))?;

        if order.status() != PurchaseOrderStatus::Pending {
            return Err(EventHandlerError::Rejected(format!(
                "Purchase order {} is {}",
                order.id(),
                order.status()
            )));
        }
        self.ensure_unpaid(&order).await?;

        let payment = Payment::new(order.id(), order.total(), command.method)
            .map_err(EventHandlerError::Invalid)?;
        let mut payment = self
            .payments
            .add(payment)
            .await
            .map_err(EventHandlerError::infrastructure)?;
        order.attach_payment(payment.id()).map_err(domain_failure)?;
        let order = self
            .orders
            .update(order)
            .await
            .map_err(EventHandlerError::infrastructure)?;

        let request = PaymentRequest {
            order_id: order.id(),
            amount: order.total(),
            method: command.method,
        };
        let confirmation = match self.gateway.make_payment(&request).await {
            Ok(confirmation) => confirmation,
            Err(PaymentGatewayError::Declined(reason)) => {
                self.release(order, payment, &reason).await?;
                metrics::counter!("payments_processed_total", "outcome" => "declined")
                    .increment(1);
                tracing::warn!(reason = %reason, "Payment declined");
                return Err(EventHandlerError::Rejected(format!("Payment declined: {reason}")));
            }
            Err(e) => {
                metrics::counter!("payments_processed_total", "outcome" => "error").increment(1);
                self.release(order, payment, &e.to_string()).await?;
                return Err(EventHandlerError::infrastructure(e));
            }
        };

        payment
            .approve(confirmation.transaction_id.clone())
            .map_err(domain_failure)?;
        let approved = PaymentApproved {
            payment_id: payment.id(),
            order_id: order.id(),
            amount: payment.amount(),
            transaction_id: confirmation.transaction_id.clone(),
        };
        self.settle(&payment, approved).await;

        metrics::counter!("payments_processed_total", "outcome" => "approved").increment(1);
        tracing::info!(transaction_id = %confirmation.transaction_id, "Payment approved");

        Ok(PaymentReceipt {
            payment_id: payment.id(),
            order_id: order.id(),
            amount: payment.amount(),
            transaction_id: confirmation.transaction_id,
        })
    }
}

/// Orders with a charge running in this process.
#[derive(Default)]
struct InFlight(Mutex<HashSet<AggregateId>>);

impl InFlight {
    fn claim(&self, order_id: AggregateId) -> Option<Claim<'_>> {
        let mut orders = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        orders.insert(order_id).then_some(Claim {
            orders: &self.0,
            order_id,
        })
    }
}

/// Releases the order when the handler returns.
struct Claim<'a> {
    orders: &'a Mutex<HashSet<AggregateId>>,
    order_id: AggregateId,
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        self.orders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.order_id);
    }
}
