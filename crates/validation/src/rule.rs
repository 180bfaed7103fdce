//! Validation rules and their evaluation.

use std::str::FromStr;
use std::sync::Arc;

use serde_json::Value;

use crate::error::RuleParseError;
use crate::format;

type Predicate = dyn Fn(&Value) -> bool + Send + Sync;

/// A pluggable rule backed by a validity predicate.
///
/// The predicate returns `true` when the value is valid. Missing fields are
/// passed as `Value::Null`.
#[derive(Clone)]
pub struct CustomRule {
    name: String,
    predicate: Arc<Predicate>,
    message: Option<String>,
}

impl CustomRule {
    pub fn new<F>(name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            predicate: Arc::new(predicate),
            message: None,
        }
    }

    /// Sets the failure message. `{field}` is replaced with the field name.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for CustomRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomRule")
            .field("name", &self.name)
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

/// A single validation rule.
///
/// Parses from the token forms `name` and `name:param`, e.g. `"required"` or
/// `"min:5"`.
#[derive(Debug, Clone)]
pub enum Rule {
    Required,
    String,
    Number,
    Integer,
    /// Rejects whole numbers. Non-numeric values pass.
    Float,
    Boolean,
    /// Minimum string length or numeric value.
    Min(f64),
    /// Maximum string length or numeric value.
    Max(f64),
    Url,
    Uuid,
    Email,
    Date,
    Custom(CustomRule),
}

static NULL: Value = Value::Null;

impl Rule {
    /// Shorthand for [`Rule::Custom`].
    pub fn custom<F>(name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Rule::Custom(CustomRule::new(name, predicate))
    }

    /// Returns true when `value` satisfies the rule. `None` means the field is
    /// absent from the data bag.
    pub fn passes(&self, value: Option<&Value>) -> bool {
        match self {
            Rule::Required => !is_empty(value),
            Rule::String => matches!(value, Some(Value::String(_))),
            Rule::Number => matches!(value, Some(Value::Number(_))),
            Rule::Boolean => matches!(value, Some(Value::Bool(_))),
            Rule::Integer => match value.and_then(Value::as_f64) {
                Some(n) => n.fract() == 0.0,
                None => true,
            },
            Rule::Float => match value.and_then(Value::as_f64) {
                Some(n) => n.fract() != 0.0,
                None => true,
            },
            Rule::Min(min) => match value {
                Some(Value::String(s)) => s.chars().count() as f64 >= *min,
                Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n >= *min),
                _ => true,
            },
            Rule::Max(max) => match value {
                Some(Value::String(s)) => s.chars().count() as f64 <= *max,
                Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n <= *max),
                _ => true,
            },
            Rule::Url => value.and_then(Value::as_str).is_some_and(format::is_url),
            Rule::Uuid => value.and_then(Value::as_str).is_some_and(format::is_uuid),
            Rule::Email => value.and_then(Value::as_str).is_some_and(format::is_email),
            Rule::Date => value.and_then(Value::as_str).is_some_and(format::is_date),
            Rule::Custom(custom) => (custom.predicate)(value.unwrap_or(&NULL)),
        }
    }

    /// Message reported when the rule fails for `field`.
    pub fn message(&self, field: &str, value: Option<&Value>) -> String {
        match self {
            Rule::Required => format!("The field {field} is required."),
            Rule::String => format!("The field {field} must be a string."),
            Rule::Number => format!("The field {field} must be a number."),
            Rule::Integer => format!("The field {field} must be an integer."),
            Rule::Float => format!("The field {field} must be a float."),
            Rule::Boolean => format!("The field {field} must be a boolean."),
            Rule::Min(min) => match value {
                Some(Value::String(_)) => format!(
                    "The field {field} must have at least {} characters.",
                    format::number(*min)
                ),
                _ => format!("The field {field} must be at least {}.", format::number(*min)),
            },
            Rule::Max(max) => match value {
                Some(Value::String(_)) => format!(
                    "The field {field} must have at most {} characters.",
                    format::number(*max)
                ),
                _ => format!("The field {field} must be at most {}.", format::number(*max)),
            },
            Rule::Url => format!("The field {field} must be a valid URL."),
            Rule::Uuid => format!("The field {field} must be a valid UUID."),
            Rule::Email => format!("The field {field} must be a valid email."),
            Rule::Date => format!("The field {field} must be a valid date."),
            Rule::Custom(custom) => match &custom.message {
                Some(template) => template.replace("{field}", field),
                None => format!("The field {field} is invalid."),
            },
        }
    }

    /// Parses a list of rule tokens, stopping at the first bad token.
    pub fn parse_all<'a>(
        tokens: impl IntoIterator<Item = &'a str>,
    ) -> Result<Vec<Rule>, RuleParseError> {
        tokens.into_iter().map(str::parse).collect()
    }
}

fn is_empty(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Object(map)) => map.is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::Number(_)) | Some(Value::Bool(_)) => false,
    }
}

impl FromStr for Rule {
    type Err = RuleParseError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let (name, param) = match token.split_once(':') {
            Some((name, param)) => (name.trim(), Some(param.trim())),
            None => (token.trim(), None),
        };

        let bounded = |build: fn(f64) -> Rule| -> Result<Rule, RuleParseError> {
            let param = param.ok_or_else(|| RuleParseError::MissingParameter {
                rule: name.to_string(),
            })?;
            param
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(build)
                .ok_or_else(|| RuleParseError::InvalidParameter {
                    rule: name.to_string(),
                    param: param.to_string(),
                })
        };

        let rule = match name {
            "min" => return bounded(Rule::Min),
            "max" => return bounded(Rule::Max),
            "required" => Rule::Required,
            "string" => Rule::String,
            "number" => Rule::Number,
            "integer" => Rule::Integer,
            "float" => Rule::Float,
            "boolean" => Rule::Boolean,
            "url" => Rule::Url,
            "uuid" => Rule::Uuid,
            "email" => Rule::Email,
            "date" => Rule::Date,
            other => return Err(RuleParseError::UnknownRule(other.to_string())),
        };

        if param.is_some() {
            return Err(RuleParseError::UnexpectedParameter {
                rule: name.to_string(),
            });
        }
        Ok(rule)
    }
}
