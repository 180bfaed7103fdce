use common::AggregateId;
use serde::{Deserialize, Serialize};
use validation::{Rule, ValidationError};

use crate::entity::{Entity, check};

/// A product category, e.g. `"Books - 3"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    id: AggregateId,
    name: String,
    code: i64,
}

impl Category {
    /// Creates a category with a fresh id.
    pub fn new(name: impl Into<String>, code: i64) -> Result<Self, ValidationError> {
        Self::with_id(AggregateId::new(), name, code)
    }

    pub fn with_id(
        id: AggregateId,
        name: impl Into<String>,
        code: i64,
    ) -> Result<Self, ValidationError> {
        let category = Self {
            id,
            name: name.into(),
            code,
        };
        category.validate()?;
        Ok(category)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        check(self, |v| {
            v.set_rule("name", [Rule::Required, Rule::String, Rule::Min(1.0)])
                .set_rule("code", [Rule::Required, Rule::Integer, Rule::Min(1.0)])
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn code(&self) -> i64 {
        self.code
    }
}

impl Entity for Category {
    const KIND: &'static str = "Category";

    fn id(&self) -> AggregateId {
        self.id
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {}", self.name, self.code)
    }
}
