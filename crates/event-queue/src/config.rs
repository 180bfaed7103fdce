//! Queue configuration loaded from environment variables.

use std::time::Duration;

use crate::error::ConfigError;

/// Queue and broker settings.
///
/// Reads from environment variables:
/// - `QUEUE_NAME` — queue name (default: `"events"`)
/// - `QUEUE_ATTEMPTS` — delivery attempts per job, positive (default: `3`)
/// - `QUEUE_DELAY` — fixed backoff between attempts in ms (default: `1000`)
/// - `QUEUE_VISIBILITY_TIMEOUT` — claim lease in ms, positive (default: `60000`)
/// - `QUEUE_HOST` / `QUEUE_PORT` — broker address (default: `localhost:5432`)
/// - `QUEUE_USER` / `QUEUE_PASSWORD` / `QUEUE_DATABASE` (default: `postgres`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    pub queue_name: String,
    pub attempts: u32,
    pub delay_ms: u64,
    /// How long a claimed job stays hidden before another consumer may take it.
    pub visibility_timeout_ms: u64,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl QueueConfig {
    /// Loads configuration from the process environment.
    ///
    /// Unset variables fall back to defaults; set but malformed ones fail.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, which maps a key to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let text = |key: &str, default: String| lookup(key).unwrap_or(default);

        let attempts = match lookup("QUEUE_ATTEMPTS") {
            Some(value) => match value.trim().parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "QUEUE_ATTEMPTS",
                        value,
                        reason: "expected a positive integer",
                    });
                }
            },
            None => defaults.attempts,
        };

        let delay_ms = match lookup("QUEUE_DELAY") {
            Some(value) => value
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::Invalid {
                    key: "QUEUE_DELAY",
                    value,
                    reason: "expected milliseconds",
                })?,
            None => defaults.delay_ms,
        };

        let visibility_timeout_ms = match lookup("QUEUE_VISIBILITY_TIMEOUT") {
            Some(value) => match value.trim().parse::<u64>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "QUEUE_VISIBILITY_TIMEOUT",
                        value,
                        reason: "expected positive milliseconds",
                    });
                }
            },
            None => defaults.visibility_timeout_ms,
        };

        let port = match lookup("QUEUE_PORT") {
            Some(value) => value
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::Invalid {
                    key: "QUEUE_PORT",
                    value,
                    reason: "expected a port number",
                })?,
            None => defaults.port,
        };

        Ok(Self {
            queue_name: text("QUEUE_NAME", defaults.queue_name),
            attempts,
            delay_ms,
            visibility_timeout_ms,
            host: text("QUEUE_HOST", defaults.host),
            port,
            user: text("QUEUE_USER", defaults.user),
            password: text("QUEUE_PASSWORD", defaults.password),
            database: text("QUEUE_DATABASE", defaults.database),
        })
    }

    /// Fixed delay between delivery attempts.
    pub fn backoff_delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Lease granted to a consumer when it claims a job.
    pub fn visibility_timeout(&self) -> Duration {
        Duration::from_millis(self.visibility_timeout_ms)
    }

    /// Returns the `"host:port"` broker address.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            queue_name: "events".to_string(),
            attempts: 3,
            delay_ms: 1000,
            visibility_timeout_ms: 60_000,
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: "postgres".to_string(),
            database: "postgres".to_string(),
        }
    }
}
