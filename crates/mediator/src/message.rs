//! Message kinds and the envelope they travel in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

/// Anything the mediator can route.
///
/// `NAME` is the routing key. It is also the job name used by the durable
/// queue, so it must stay stable across releases.
pub trait Message: Serialize + DeserializeOwned + Send + Sync + 'static {
    const NAME: &'static str;

    fn name(&self) -> &'static str {
        Self::NAME
    }
}

/// A fact that already happened. Delivered to every registered handler.
pub trait Event: Message {}

/// A request to change state, handled by exactly one handler.
pub trait Command: Message {
    type Output: Send + 'static;
}

/// A request for data, handled by exactly one handler.
pub trait Query: Message {
    type Output: Send + 'static;
}

/// Stamps a payload with the subject's identifier and its creation time.
///
/// Serializes flat: `{ "principalId": ..., "timestamp": ..., ...payload }`.
/// Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    principal_id: String,
    timestamp: DateTime<Utc>,
    #[serde(flatten)]
    payload: T,
}

impl<T> Envelope<T> {
    /// Wraps `payload`, timestamped now.
    pub fn new(principal_id: impl Into<String>, payload: T) -> Self {
        Self::at(principal_id, Utc::now(), payload)
    }

    /// Wraps `payload` with an explicit timestamp.
    pub fn at(principal_id: impl Into<String>, timestamp: DateTime<Utc>, payload: T) -> Self {
        Self {
            principal_id: principal_id.into(),
            timestamp,
            payload,
        }
    }

    pub fn principal_id(&self) -> &str {
        &self.principal_id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn payload(&self) -> &T {
        &self.payload
    }

    pub fn into_payload(self) -> T {
        self.payload
    }
}

impl<T: Message> Message for Envelope<T> {
    const NAME: &'static str = T::NAME;
}

impl<T: Event> Event for Envelope<T> {}

impl<T: Command> Command for Envelope<T> {
    type Output = T::Output;
}

impl<T: Query> Query for Envelope<T> {
    type Output = T::Output;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct StockLow {
        stock: u32,
    }

    impl Message for StockLow {
        const NAME: &'static str = "StockLow";
    }

    impl Event for StockLow {}

    #[test]
    fn test_envelope_takes_the_payload_name() {
        let envelope = Envelope::new("p-1", StockLow { stock: 2 });
        assert_eq!(envelope.name(), "StockLow");
        assert_eq!(<Envelope<StockLow> as Message>::NAME, "StockLow");
    }

    #[test]
    fn test_envelope_serializes_flat_with_camel_case_header() {
        let timestamp = "2024-05-01T12:00:00Z".parse().unwrap();
        let envelope = Envelope::at("p-1", timestamp, StockLow { stock: 2 });

        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(
            value,
            json!({
                "principalId": "p-1",
                "timestamp": "2024-05-01T12:00:00Z",
                "stock": 2,
            })
        );

        let back: Envelope<StockLow> = serde_json::from_value(value).unwrap();
        assert_eq!(back, envelope);
    }
}
