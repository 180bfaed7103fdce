use common::AggregateId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validation::{CustomRule, Rule, ValidationError};

use crate::entity::{Entity, check};

/// A registered customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    id: AggregateId,
    name: String,
    email: String,
    /// Brazilian taxpayer number (CPF), with or without punctuation.
    document: String,
}

impl User {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        document: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let user = Self {
            id: AggregateId::new(),
            name: name.into(),
            email: email.into(),
            document: document.into(),
        };
        user.validate()?;
        Ok(user)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        check(self, |v| {
            v.set_rule("name", [Rule::Required, Rule::String, Rule::Min(1.0)])
                .set_rule("email", [Rule::Required, Rule::Email])
                .set_rule("document", [Rule::Required, Rule::String, cpf_rule()])
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn document(&self) -> &str {
        &self.document
    }
}

impl Entity for User {
    const KIND: &'static str = "User";

    fn id(&self) -> AggregateId {
        self.id
    }
}

/// Rule accepting strings that hold a valid CPF.
pub fn cpf_rule() -> Rule {
    Rule::Custom(
        CustomRule::new("cpf", |value: &Value| value.as_str().is_some_and(is_valid_cpf))
            .with_message("The field {field} must be a valid CPF."),
    )
}

/// Checks the two mod-11 verifier digits of a CPF.
///
/// Accepts `"529.982.247-25"` and `"52998224725"`. Eleven repeated digits
/// are rejected even though their checksum matches.
pub fn is_valid_cpf(cpf: &str) -> bool {
    let digits: Vec<u32> = cpf
        .chars()
        .filter(|c| !matches!(c, '.' | '-'))
        .map(|c| c.to_digit(10))
        .collect::<Option<_>>()
        .unwrap_or_default();

    if digits.len() != 11 || digits.iter().all(|d| *d == digits[0]) {
        return false;
    }

    let verifier = |len: usize| {
        let sum: u32 = digits[..len]
            .iter()
            .enumerate()
            .map(|(i, d)| d * (len as u32 + 1 - i as u32))
            .sum();
        match sum % 11 {
            0 | 1 => 0,
            r => 11 - r,
        }
    };

    verifier(9) == digits[9] && verifier(10) == digits[10]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_cpf_formats() {
        assert!(is_valid_cpf("529.982.247-25"));
        assert!(is_valid_cpf("52998224725"));
        assert!(is_valid_cpf("111.444.777-35"));
    }

    #[test]
    fn test_invalid_cpfs() {
        assert!(!is_valid_cpf("529.982.247-26"));
        assert!(!is_valid_cpf("111.111.111-11"));
        assert!(!is_valid_cpf("1234567890"));
        assert!(!is_valid_cpf("5299822472a"));
        assert!(!is_valid_cpf(""));
    }

    #[test]
    fn test_valid_user() {
        let user = User::new("Ana", "ana@example.com", "529.982.247-25").unwrap();
        assert_eq!(user.email(), "ana@example.com");
    }

    #[test]
    fn test_cpf_rule_fails_when_predicate_rejects() {
        let err = User::new("Ana", "ana@example.com", "123.456.789-00").unwrap_err();
        assert_eq!(
            err.field("document").unwrap().messages,
            vec!["The field document must be a valid CPF."]
        );
        assert_eq!(err.errors().len(), 1);
    }

    #[test]
    fn test_bad_email_and_missing_document() {
        let err = User::new("Ana", "not-an-email", "").unwrap_err();
        assert_eq!(
            err.field("email").unwrap().messages,
            vec!["The field email must be a valid email."]
        );
        assert_eq!(
            err.field("document").unwrap().messages,
            vec![
                "The field document is required.",
                "The field document must be a valid CPF.",
            ]
        );
    }
}
