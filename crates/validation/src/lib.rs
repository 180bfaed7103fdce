//! Rule-based validation for entity invariants.
//!
//! A [`Validator`] is bound to a JSON data bag, fields get an ordered list of
//! [`Rule`]s, and validation reports every failing rule of every field at once:
//!
//! ```
//! use serde_json::json;
//! use validation::{Rule, Validator};
//!
//! let errors = Validator::set_data(json!({ "name": "" }))
//!     .set_rule("name", [Rule::Required, Rule::String])
//!     .set_rule("code", [Rule::Required, Rule::Integer, Rule::Min(1.0)])
//!     .errors();
//!
//! assert_eq!(errors.len(), 2);
//! assert_eq!(errors[0].messages, vec!["The field name is required."]);
//! ```

pub mod error;
mod format;
pub mod rule;
pub mod validator;

pub use error::{FieldError, RuleParseError, ValidationError};
pub use rule::{CustomRule, Rule};
pub use validator::Validator;
