//! Structured error reports
//!
//! [`ErrorList::to_report`] projects collected errors into a serializable
//! shape grouped by field path:
//!
//! ```json
//! {
//!   "errors": [
//!     {
//!       "field": "age",
//!       "field_path": "age",
//!       "value": 200,
//!       "validation_errors": [
//!         { "rule": "max", "message": "must be at most 120", "details": { "max": 120.0, "actual": 200.0 } }
//!       ]
//!     }
//!   ],
//!   "count": 1
//! }
//! ```
//!
//! Coercion failures appear under the rule `"type"`. Values of fields whose
//! name matches a configured sensitive pattern are replaced by
//! [`REDACTED`].

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::config::ParseConfig;
use crate::error::{ErrorList, FieldError};

/// Replacement for sensitive values
pub const REDACTED: &str = "[REDACTED]";

/// Rule name reported for coercion failures
pub const TYPE_RULE: &str = "type";

/// All errors of a rejected document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    /// One entry per distinct field path, in first-seen order
    pub errors: Vec<FieldReport>,
    /// Total number of individual errors
    pub count: usize,
}

/// Errors of one field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldReport {
    /// Field name
    pub field: String,
    /// Full dotted path
    pub field_path: String,
    /// Offending value, possibly redacted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    /// Failed rules
    pub validation_errors: Vec<RuleReport>,
}

/// One failed rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleReport {
    /// Rule name, or `"type"` for coercion failures
    pub rule: String,
    /// Human-readable description
    pub message: String,
    /// Rule-specific data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorReport {
    /// Report as pretty-printed JSON
    pub fn to_json_pretty(&self) -> String {
        // Infallible for these field types
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

impl ErrorList {
    /// Group errors by field path and redact sensitive values
    pub fn to_report(&self, config: &ParseConfig) -> ErrorReport {
        let mut fields: IndexMap<&str, FieldReport> = IndexMap::new();

        for error in self {
            let (value, rule) = match error {
                FieldError::Parse(e) => (
                    e.value.as_ref().and_then(|v| serde_json::to_value(v).ok()),
                    RuleReport {
                        rule: TYPE_RULE.to_string(),
                        message: e.message.clone(),
                        details: None,
                    },
                ),
                FieldError::Validation(e) => (
                    e.value.as_ref().and_then(|v| serde_json::to_value(v).ok()),
                    RuleReport {
                        rule: e.rule.clone(),
                        message: e.message.clone(),
                        details: e.details.clone(),
                    },
                ),
            };

            let entry = fields
                .entry(error.field_path())
                .or_insert_with(|| FieldReport {
                    field: error.field().to_string(),
                    field_path: error.field_path().to_string(),
                    value: None,
                    validation_errors: Vec::new(),
                });
            if entry.value.is_none() {
                entry.value = if config.is_sensitive(error.field()) {
                    value.map(|_| serde_json::Value::String(REDACTED.to_string()))
                } else {
                    value
                };
            }
            entry.validation_errors.push(rule);
        }

        ErrorReport {
            errors: fields.into_values().collect(),
            count: self.len(),
        }
    }
}
