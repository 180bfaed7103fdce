//! Worker configuration loaded from environment variables.

use std::net::SocketAddr;
use std::time::Duration;

use event_queue::ConfigError;

/// Worker settings with sensible defaults.
///
/// Reads from environment variables:
/// - `WORKER_POLL_INTERVAL_MS` — idle wait between polls (default: `500`)
/// - `WORKER_HANDLER_TIMEOUT_MS` — per-handler timeout, `0` disables (default: `30000`)
/// - `WORKER_RELAY_INTERVAL_MS` — wait between outbox relays (default: `1000`)
/// - `METRICS_ADDR` — Prometheus listener address (default: `"0.0.0.0:9000"`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    pub poll_interval: Duration,
    pub handler_timeout: Option<Duration>,
    pub relay_interval: Duration,
    pub metrics_addr: SocketAddr,
    pub log_level: String,
}

impl WorkerConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, which maps a key to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let millis = |key: &'static str| -> Result<Option<u64>, ConfigError> {
            lookup(key)
                .map(|value| {
                    value.trim().parse::<u64>().map_err(|_| ConfigError::Invalid {
                        key,
                        value,
                        reason: "expected milliseconds",
                    })
                })
                .transpose()
        };

        let poll_interval = millis("WORKER_POLL_INTERVAL_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.poll_interval);

        let handler_timeout = match millis("WORKER_HANDLER_TIMEOUT_MS")? {
            Some(0) => None,
            Some(ms) => Some(Duration::from_millis(ms)),
            None => defaults.handler_timeout,
        };

        let relay_interval = millis("WORKER_RELAY_INTERVAL_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.relay_interval);

        let metrics_addr = match lookup("METRICS_ADDR") {
            Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
                key: "METRICS_ADDR",
                value,
                reason: "expected host:port",
            })?,
            None => defaults.metrics_addr,
        };

        Ok(Self {
            poll_interval,
            handler_timeout,
            relay_interval,
            metrics_addr,
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
        })
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            handler_timeout: Some(Duration::from_secs(30)),
            relay_interval: Duration::from_secs(1),
            metrics_addr: SocketAddr::from(([0, 0, 0, 0], 9000)),
            log_level: "info".to_string(),
        }
    }
}
