//! Validation session over a JSON data bag.

use serde::Serialize;
use serde_json::Value;

use crate::error::{FieldError, RuleParseError, ValidationError};
use crate::rule::Rule;

/// A validation session bound to one data bag.
///
/// Fields are evaluated in the order they were first declared. Declaring a
/// field again replaces its rules in place.
#[derive(Debug, Clone)]
pub struct Validator {
    data: Value,
    fields: Vec<(String, Vec<Rule>)>,
}

impl Validator {
    /// Starts a session over `data`, normally a JSON object.
    pub fn set_data(data: Value) -> Self {
        Self {
            data,
            fields: Vec::new(),
        }
    }

    /// Starts a session over any serializable value.
    pub fn from_serializable<T: Serialize>(data: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::set_data(serde_json::to_value(data)?))
    }

    /// Declares the ordered rules for `field`, overwriting earlier rules.
    ///
    /// Dotted names (`dimensions.width`) address nested objects.
    pub fn set_rule(
        mut self,
        field: impl Into<String>,
        rules: impl IntoIterator<Item = Rule>,
    ) -> Self {
        let field = field.into();
        let rules: Vec<Rule> = rules.into_iter().collect();
        match self.fields.iter_mut().find(|(name, _)| *name == field) {
            Some((_, existing)) => *existing = rules,
            None => self.fields.push((field, rules)),
        }
        self
    }

    /// Like [`set_rule`](Self::set_rule) but with string tokens such as `"min:5"`.
    pub fn set_rule_tokens<'a>(
        self,
        field: impl Into<String>,
        tokens: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, RuleParseError> {
        let rules = Rule::parse_all(tokens)?;
        Ok(self.set_rule(field, rules))
    }

    /// Returns every violation without failing.
    pub fn errors(&self) -> Vec<FieldError> {
        self.fields
            .iter()
            .filter_map(|(field, rules)| {
                let value = self.lookup(field);
                let messages: Vec<String> = rules
                    .iter()
                    .filter(|rule| !rule.passes(value))
                    .map(|rule| rule.message(field, value))
                    .collect();
                (!messages.is_empty()).then(|| FieldError {
                    field: field.clone(),
                    messages,
                })
            })
            .collect()
    }

    /// Fails with every violation when any declared rule fails.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let errors = self.errors();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(errors))
        }
    }

    fn lookup(&self, field: &str) -> Option<&Value> {
        if field.contains('.') {
            let pointer: String = field.split('.').flat_map(|part| ["/", part]).collect();
            self.data.pointer(&pointer)
        } else {
            self.data.get(field)
        }
    }
}
