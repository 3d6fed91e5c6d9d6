//! Validation rules
//!
//! A validation tag like `required,min=3,max=20,email` is compiled once per
//! field, when its type's schema is first built, into a list of
//! [`ValidationRule`]s. Rule names resolve through a [`RuleRegistry`]; the
//! built-in rules live in [`builtin`] and custom rules register the same way.
//!
//! ```rust
//! use bindery::rules::{RuleRegistry, UnknownRulePolicy, Validator, Violation};
//! use bindery::FieldValue;
//!
//! struct Even;
//!
//! impl Validator for Even {
//!     fn validate(&self, _field: &str, value: &FieldValue) -> Result<(), Violation> {
//!         match value {
//!             FieldValue::Int(i) if i % 2 != 0 => Err(Violation::new("must be even")),
//!             _ => Ok(()),
//!         }
//!     }
//! }
//!
//! let mut registry = RuleRegistry::with_builtins();
//! registry.register("even", |_| Ok(Box::new(Even)));
//! let rules = registry.compile("required,even", UnknownRulePolicy::Strict).unwrap();
//! assert_eq!(rules.len(), 2);
//! ```

pub mod builtin;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::schema::{FieldValue, Record};

/// Rule that skips the rest of a field's rules when its value is zero
pub const OMIT_EMPTY: &str = "omitempty";

/// Parameter written after `=` in a tag token
#[derive(Debug, Clone, PartialEq)]
pub enum RuleParam {
    /// Parsed as a finite number; `raw` keeps the token as written
    Number {
        /// Parsed value
        value: f64,
        /// Token text
        raw: String,
    },
    /// Anything else, kept verbatim
    Text(String),
}

impl RuleParam {
    /// Parse a parameter: a number when it reads as one, else raw text
    pub fn parse(raw: &str) -> Self {
        match raw.parse::<f64>() {
            Ok(value) if value.is_finite() => RuleParam::Number {
                value,
                raw: raw.to_string(),
            },
            _ => RuleParam::Text(raw.to_string()),
        }
    }

    /// Numeric value, if any
    pub fn as_number(&self) -> Option<f64> {
        match *self {
            RuleParam::Number { value, .. } => Some(value),
            RuleParam::Text(_) => None,
        }
    }

    /// The parameter exactly as written in the tag
    pub fn raw(&self) -> &str {
        match self {
            RuleParam::Number { raw, .. } | RuleParam::Text(raw) => raw,
        }
    }
}

impl fmt::Display for RuleParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.raw())
    }
}

/// One `name` or `name=param` token of a validation tag
#[derive(Debug, Clone, PartialEq)]
pub struct RuleToken {
    /// Rule name
    pub name: String,
    /// Optional parameter
    pub param: Option<RuleParam>,
}

/// Split a validation tag into rule tokens.
///
/// Tokens are comma separated and trimmed; empty tokens are skipped. Each
/// token splits on its first `=`.
pub fn parse_tag(tag: &str) -> Vec<RuleToken> {
    tag.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| match token.split_once('=') {
            Some((name, param)) => RuleToken {
                name: name.trim().to_string(),
                param: Some(RuleParam::parse(param.trim())),
            },
            None => RuleToken {
                name: token.to_string(),
                param: None,
            },
        })
        .collect()
}

/// A failed rule check, before the engine attaches field and path
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    /// Human-readable description
    pub message: String,
    /// Rule-specific structured data
    pub details: Option<serde_json::Value>,
}

impl Violation {
    /// Violation with a message only
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            details: None,
        }
    }

    /// Attach structured details
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// A compiled rule bound to its parameter.
///
/// Cross-field rules override [`Validator::validate_in_record`], which the
/// engine calls with the fully coerced record of the field's siblings.
pub trait Validator: Send + Sync {
    /// Check one field value
    fn validate(&self, field: &str, value: &FieldValue) -> Result<(), Violation>;

    /// Check one field value with access to its sibling fields
    fn validate_in_record(
        &self,
        field: &str,
        value: &FieldValue,
        record: &Record,
    ) -> Result<(), Violation> {
        let _ = record;
        self.validate(field, value)
    }
}

/// A rule as stored in a field descriptor
pub struct ValidationRule {
    name: String,
    param: Option<RuleParam>,
    validator: Box<dyn Validator>,
}

impl ValidationRule {
    /// Rule name as written in the tag
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parameter, if one was written
    pub fn param(&self) -> Option<&RuleParam> {
        self.param.as_ref()
    }

    /// Bound validator
    pub fn validator(&self) -> &dyn Validator {
        self.validator.as_ref()
    }
}

impl fmt::Debug for ValidationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationRule")
            .field("name", &self.name)
            .field("param", &self.param)
            .finish_non_exhaustive()
    }
}

/// What to do with rule names the registry does not know
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownRulePolicy {
    /// Drop the rule and log a warning
    #[default]
    Lenient,
    /// Fail schema construction
    Strict,
}

/// Rule compilation failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuleError {
    /// No factory registered under this name
    #[error("unknown validation rule '{rule}'")]
    Unknown {
        /// Rule name as written
        rule: String,
    },

    /// The factory rejected the parameter
    #[error("invalid validation rule '{rule}': {message}")]
    Invalid {
        /// Rule name as written
        rule: String,
        /// Why the parameter was rejected
        message: String,
    },
}

/// Builds a validator from an optional parameter
pub type RuleFactory =
    Arc<dyn Fn(Option<&RuleParam>) -> Result<Box<dyn Validator>, String> + Send + Sync>;

/// Rule name to factory map
#[derive(Clone)]
pub struct RuleRegistry {
    factories: HashMap<String, RuleFactory>,
}

impl RuleRegistry {
    /// Registry with no rules at all
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry preloaded with the built-in rules
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        builtin::register_all(&mut registry);
        registry
    }

    /// Register (or replace) a rule
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(Option<&RuleParam>) -> Result<Box<dyn Validator>, String> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    /// Whether `name` is registered
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered rule names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Compile a validation tag into rules, in tag order
    pub fn compile(
        &self,
        tag: &str,
        policy: UnknownRulePolicy,
    ) -> Result<Vec<ValidationRule>, RuleError> {
        let mut rules = Vec::new();
        for token in parse_tag(tag) {
            let Some(factory) = self.factories.get(&token.name) else {
                match policy {
                    UnknownRulePolicy::Strict => {
                        return Err(RuleError::Unknown { rule: token.name });
                    }
                    UnknownRulePolicy::Lenient => {
                        tracing::warn!(rule = %token.name, tag, "dropping unknown validation rule");
                        continue;
                    }
                }
            };
            let validator =
                factory(token.param.as_ref()).map_err(|message| RuleError::Invalid {
                    rule: token.name.clone(),
                    message,
                })?;
            rules.push(ValidationRule {
                name: token.name,
                param: token.param,
                validator,
            });
        }
        Ok(rules)
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleRegistry")
            .field("rules", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_parse_tag() {
        let tokens = parse_tag(" required, min=3 ,,max=20,email,oneof=red green ");
        let names: Vec<&str> = tokens.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["required", "min", "max", "email", "oneof"]);
        assert_eq!(tokens[0].param, None);
        assert_eq!(tokens[1].param.as_ref().and_then(RuleParam::as_number), Some(3.0));
        assert_eq!(
            tokens[4].param,
            Some(RuleParam::Text("red green".to_string()))
        );
    }

    #[test]
    fn test_parse_tag_splits_on_first_equals() {
        let tokens = parse_tag("custom=a=b");
        assert_eq!(tokens[0].name, "custom");
        assert_eq!(tokens[0].param, Some(RuleParam::Text("a=b".to_string())));
    }

    #[rstest]
    #[case::integer("3", Some(3.0))]
    #[case::negative("-1.5", Some(-1.5))]
    #[case::trailing_zero("1.50", Some(1.5))]
    #[case::text("abc", None)]
    #[case::not_finite("inf", None)]
    fn test_rule_param_parse(#[case] raw: &str, #[case] expected: Option<f64>) {
        let param = RuleParam::parse(raw);
        assert_eq!(param.as_number(), expected);
        assert_eq!(param.raw(), raw);
        assert_eq!(param.to_string(), raw);
    }

    #[test]
    fn test_compile_empty_tag() {
        let registry = RuleRegistry::with_builtins();
        assert!(registry.compile("", UnknownRulePolicy::Strict).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_rule_lenient_drops_it() {
        let registry = RuleRegistry::with_builtins();
        let rules = registry
            .compile("required,frobnicate", UnknownRulePolicy::Lenient)
            .unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].name(), "required");
    }

    #[test]
    fn test_unknown_rule_strict_fails() {
        let registry = RuleRegistry::with_builtins();
        let err = registry
            .compile("required,frobnicate", UnknownRulePolicy::Strict)
            .unwrap_err();
        assert_eq!(
            err,
            RuleError::Unknown {
                rule: "frobnicate".to_string()
            }
        );
    }

    #[test]
    fn test_invalid_param_fails_in_either_mode() {
        let registry = RuleRegistry::with_builtins();
        for policy in [UnknownRulePolicy::Lenient, UnknownRulePolicy::Strict] {
            let err = registry.compile("min=abc", policy).unwrap_err();
            assert!(matches!(err, RuleError::Invalid { ref rule, .. } if rule == "min"));
        }
    }

    #[test]
    fn test_register_custom_rule() {
        struct NotBob;
        impl Validator for NotBob {
            fn validate(&self, _field: &str, value: &FieldValue) -> Result<(), Violation> {
                if value.as_str() == Some("bob") {
                    Err(Violation::new("must not be bob"))
                } else {
                    Ok(())
                }
            }
        }

        let mut registry = RuleRegistry::new();
        assert!(!registry.contains("notbob"));
        registry.register("notbob", |_| Ok(Box::new(NotBob)));
        assert!(registry.contains("notbob"));

        let rules = registry.compile("notbob", UnknownRulePolicy::Strict).unwrap();
        let bob = FieldValue::String("bob".into());
        let err = rules[0].validator().validate("name", &bob).unwrap_err();
        assert_eq!(err.message, "must not be bob");
    }

    #[test]
    fn test_policy_deserializes_lowercase() {
        let policy: UnknownRulePolicy = serde_json::from_str("\"strict\"").unwrap();
        assert_eq!(policy, UnknownRulePolicy::Strict);
    }
}
