use common::AggregateId;
use serde::Serialize;
use validation::{ValidationError, Validator};

/// An identifiable record that repositories store.
pub trait Entity: Clone + Send + Sync + 'static {
    /// Human-readable kind used in errors and logs, e.g. `"Category"`.
    const KIND: &'static str;

    fn id(&self) -> AggregateId;
}

/// Runs `rules` against the serialized form of `value`.
pub(crate) fn check<T: Serialize>(
    value: &T,
    rules: impl FnOnce(Validator) -> Validator,
) -> Result<(), ValidationError> {
    // Entities are plain data; an unserializable value validates as null.
    let data = serde_json::to_value(value).unwrap_or_default();
    rules(Validator::set_data(data)).validate()
}
