//! Validation error types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All failing messages for one field, in rule-evaluation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub messages: Vec<String>,
}

/// Input data violates one or more declared field rules.
///
/// Carries every violation found in a validation run, one entry per field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("Validation failed:{}", render(.errors))]
pub struct ValidationError {
    errors: Vec<FieldError>,
}

impl ValidationError {
    pub fn new(errors: Vec<FieldError>) -> Self {
        Self { errors }
    }

    /// Builds an error for a single field and message.
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            errors: vec![FieldError {
                field: field.into(),
                messages: vec![message.into()],
            }],
        }
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<FieldError> {
        self.errors
    }

    /// Returns the entry for `field`, if that field failed.
    pub fn field(&self, field: &str) -> Option<&FieldError> {
        self.errors.iter().find(|e| e.field == field)
    }
}

/// Every message of every field, each preceded by a space.
fn render(errors: &[FieldError]) -> String {
    errors
        .iter()
        .flat_map(|e| &e.messages)
        .map(|message| format!(" {message}"))
        .collect()
}

/// A rule token could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleParseError {
    #[error("Unknown validation rule: {0}")]
    UnknownRule(String),

    #[error("Rule '{rule}' requires a numeric parameter")]
    MissingParameter { rule: String },

    #[error("Rule '{rule}' has an invalid parameter: {param}")]
    InvalidParameter { rule: String, param: String },

    #[error("Rule '{rule}' does not take a parameter")]
    UnexpectedParameter { rule: String },
}
