//! Notification settings loaded from environment variables.

/// Addresses used for operational emails.
///
/// Reads from environment variables:
/// - `NOTIFY_FROM` — sender address (default: `"no-reply@shop.local"`)
/// - `NOTIFY_STOCK_TO` — low-stock alert recipient (default: `"stock@shop.local"`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationConfig {
    pub from: String,
    pub stock_alert_to: String,
}

impl NotificationConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            from: std::env::var("NOTIFY_FROM").unwrap_or(defaults.from),
            stock_alert_to: std::env::var("NOTIFY_STOCK_TO").unwrap_or(defaults.stock_alert_to),
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            from: "no-reply@shop.local".to_string(),
            stock_alert_to: "stock@shop.local".to_string(),
        }
    }
}
