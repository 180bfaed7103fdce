//! Store-and-forward delivery of queued events.
//!
//! Work that has already happened (a captured payment, a stock change) must
//! not be reported as failed just because the broker is unreachable. The
//! [`Outbox`] keeps such events in a repository and [`Outbox::relay`] hands
//! them to the queue once it accepts jobs again.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::{Entity, Repository};
use event_queue::{Broker, EventQueue, QueueError};
use mediator::Message;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// An event the broker refused, kept until it can be relayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxMessage {
    id: AggregateId,
    name: String,
    data: Value,
    stored_at: DateTime<Utc>,
}

impl OutboxMessage {
    pub fn new(name: impl Into<String>, data: Value) -> Self {
        Self {
            id: AggregateId::new(),
            name: name.into(),
            data,
            stored_at: Utc::now(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn stored_at(&self) -> DateTime<Utc> {
        self.stored_at
    }
}

impl Entity for OutboxMessage {
    const KIND: &'static str = "OutboxMessage";

    fn id(&self) -> AggregateId {
        self.id
    }
}

/// Where a published event ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Accepted by the broker.
    Queued,
    /// Stored in the outbox for a later [`Outbox::relay`].
    Deferred,
}

/// Queue front that falls back to a repository when the broker fails.
pub struct Outbox<B: Broker> {
    messages: Arc<dyn Repository<OutboxMessage>>,
    queue: Arc<EventQueue<B>>,
}

impl<B: Broker> Outbox<B> {
    pub fn new(messages: Arc<dyn Repository<OutboxMessage>>, queue: Arc<EventQueue<B>>) -> Self {
        Self { messages, queue }
    }

    pub fn queue(&self) -> &Arc<EventQueue<B>> {
        &self.queue
    }

    /// Enqueues `event`, or stores it when the broker is unavailable.
    ///
    /// Fails only when the event cannot be serialized or the outbox
    /// repository rejects the write.
    pub async fn publish<E: Message>(&self, event: &E) -> Result<Delivery> {
        self.publish_all(std::slice::from_ref(event)).await
    }

    /// Enqueues `events` in one batch, or stores each of them.
    #[tracing::instrument(skip(self, events), fields(job = E::NAME, count = events.len()))]
    pub async fn publish_all<E: Message>(&self, events: &[E]) -> Result<Delivery> {
        let error = match self.queue.enqueue_in_batch(events).await {
            Ok(_) => return Ok(Delivery::Queued),
            Err(QueueError::Serialization(e)) => return Err(QueueError::Serialization(e).into()),
            Err(e) => e,
        };

        for event in events {
            let data = serde_json::to_value(event).map_err(QueueError::from)?;
            self.messages.add(OutboxMessage::new(E::NAME, data)).await?;
        }

        metrics::counter!("outbox_messages_deferred_total", "job" => E::NAME)
            .increment(events.len() as u64);
        tracing::warn!(error = %error, "Broker unavailable, events kept in the outbox");
        Ok(Delivery::Deferred)
    }

    /// Moves stored messages to the queue, oldest first.
    ///
    /// Stops at the first broker failure; whatever is left stays stored for
    /// the next call. Returns how many messages were relayed.
    #[tracing::instrument(skip(self))]
    pub async fn relay(&self) -> Result<usize> {
        let mut pending = self.messages.list().await?;
        pending.sort_by_key(OutboxMessage::stored_at);

        let mut relayed = 0;
        for message in pending {
            self.queue
                .enqueue_raw(message.name(), message.data().clone())
                .await?;
            self.messages.delete(message.id()).await?;
            relayed += 1;
        }

        if relayed > 0 {
            metrics::counter!("outbox_messages_relayed_total").increment(relayed as u64);
            tracing::info!(relayed, "Outbox relayed");
        }
        Ok(relayed)
    }

    /// Number of messages waiting for the broker.
    pub async fn pending(&self) -> Result<usize> {
        Ok(self.messages.list().await?.len())
    }
}
