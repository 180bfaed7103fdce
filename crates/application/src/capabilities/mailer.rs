//! Outbound email capability.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

/// A message to deliver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotificationError {
    #[error("Email delivery failed: {0}")]
    Delivery(String),
}

/// Sends email through whatever transport the deployment provides.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: Email) -> Result<(), NotificationError>;
}

#[derive(Debug, Default)]
struct InMemoryMailerState {
    sent: Vec<Email>,
    fail_on_send: Option<String>,
}

/// In-memory mailer for testing. Records every delivered email.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMailer {
    state: Arc<RwLock<InMemoryMailerState>>,
}

impl InMemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every send fail with `message`. `None` clears it.
    pub async fn set_fail_on_send(&self, message: Option<&str>) {
        self.state.write().await.fail_on_send = message.map(str::to_string);
    }

    pub async fn sent(&self) -> Vec<Email> {
        self.state.read().await.sent.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.state.read().await.sent.len()
    }
}

#[async_trait]
impl Mailer for InMemoryMailer {
    async fn send(&self, email: Email) -> Result<(), NotificationError> {
        let mut state = self.state.write().await;
        if let Some(message) = &state.fail_on_send {
            return Err(NotificationError::Delivery(message.clone()));
        }
        state.sent.push(email);
        Ok(())
    }
}

/// Mailer that writes each email to the log instead of delivering it.
///
/// Used by the worker binary when no mail transport is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: Email) -> Result<(), NotificationError> {
        tracing::info!(
            from = %email.from,
            to = %email.to,
            subject = %email.subject,
            "Email queued for delivery"
        );
        Ok(())
    }
}
