//! Error types for bindery-core
//!
//! Field-level problems never abort a record: they are collected into an
//! [`ErrorList`] and surfaced together as [`Error::Invalid`]. The other
//! [`Error`] variants are the fatal short-circuits (undecodable input, a
//! root of the wrong shape, exceeded limits, broken schema metadata).

use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::schema::FieldValue;
use crate::value::Value;

/// Result type alias for bindery-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while parsing a document into a typed record
#[derive(Error, Debug)]
pub enum Error {
    /// Input rejected before decoding because it is too large
    #[error("input of {size} bytes exceeds the maximum of {limit} bytes")]
    InputTooLarge {
        /// Size of the rejected input
        size: usize,
        /// Configured ceiling
        limit: usize,
    },

    /// Nested records or collections go deeper than allowed
    #[error("maximum nesting depth of {limit} exceeded at '{path}'")]
    DepthExceeded {
        /// Configured ceiling
        limit: usize,
        /// Field path where the limit was crossed
        path: String,
    },

    /// Malformed JSON
    #[error("failed to decode JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed YAML
    #[error("failed to decode YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The document root does not have the shape the target expects
    #[error("expected {expected} at document root, found {found}")]
    RootMismatch {
        /// Shape required by the target
        expected: &'static str,
        /// Shape that was decoded
        found: &'static str,
    },

    /// A validation tag names a rule missing from the registry (strict mode)
    #[error("unknown validation rule '{rule}' on field '{field}' of {type_name}")]
    UnknownRule {
        /// Type whose schema was being built
        type_name: &'static str,
        /// Field carrying the tag
        field: &'static str,
        /// Rule name as written
        rule: String,
    },

    /// A rule factory rejected its parameter
    #[error("invalid validation rule '{rule}' on field '{field}' of {type_name}: {message}")]
    InvalidRule {
        /// Type whose schema was being built
        type_name: &'static str,
        /// Field carrying the tag
        field: &'static str,
        /// Rule name as written
        rule: String,
        /// Why the parameter was rejected
        message: String,
    },

    /// Configuration file could not be found
    #[error("configuration file not found: {path}")]
    ConfigNotFound {
        /// Path that was searched
        path: String,
    },

    /// Invalid configuration value
    #[error("invalid configuration: {message}")]
    ConfigInvalid {
        /// Description of what's invalid
        message: String,
    },

    /// I/O error while reading configuration
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// One or more fields failed coercion or validation
    #[error("{0}")]
    Invalid(ErrorList),
}

impl Error {
    /// The aggregated field errors, if this is [`Error::Invalid`]
    pub fn errors(&self) -> Option<&ErrorList> {
        match self {
            Error::Invalid(list) => Some(list),
            _ => None,
        }
    }
}

impl From<ErrorList> for Error {
    fn from(list: ErrorList) -> Self {
        Error::Invalid(list)
    }
}

/// A decoded value could not be converted into the field's type
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParseError {
    /// Field name (last path segment)
    pub field: String,
    /// Full dotted path, e.g. `profile.address.zip` or `tags[2]`
    pub field_path: String,
    /// The offending source value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Human-readable description
    pub message: String,
}

impl ParseError {
    /// Error on a top-level field; the path equals the field name
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        let field = field.into();
        Self {
            field_path: field.clone(),
            field,
            value: None,
            message: message.into(),
        }
    }

    /// Set the full field path
    pub fn at(mut self, field_path: impl Into<String>) -> Self {
        self.field_path = field_path.into();
        self
    }

    /// Attach the offending value
    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "field '{}': {}", self.field_path, self.message)
    }
}

impl std::error::Error for ParseError {}

/// A coerced value broke a validation rule
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationError {
    /// Field name (last path segment)
    pub field: String,
    /// Full dotted path
    pub field_path: String,
    /// The coerced value that failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<FieldValue>,
    /// Rule name, e.g. `min`
    pub rule: String,
    /// Human-readable description
    pub message: String,
    /// Rule-specific structured data (limits, actual sizes)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ValidationError {
    /// Error on a top-level field; the path equals the field name
    pub fn new(
        field: impl Into<String>,
        rule: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let field = field.into();
        Self {
            field_path: field.clone(),
            field,
            value: None,
            rule: rule.into(),
            message: message.into(),
            details: None,
        }
    }

    /// Set the full field path
    pub fn at(mut self, field_path: impl Into<String>) -> Self {
        self.field_path = field_path.into();
        self
    }

    /// Attach the offending value
    pub fn with_value(mut self, value: FieldValue) -> Self {
        self.value = Some(value);
        self
    }

    /// Attach rule details
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "field '{}' failed '{}': {}",
            self.field_path, self.rule, self.message
        )
    }
}

impl std::error::Error for ValidationError {}

/// One entry of an [`ErrorList`]
#[derive(Debug, Clone, PartialEq)]
pub enum FieldError {
    /// Coercion or structural failure
    Parse(ParseError),
    /// Rule violation
    Validation(ValidationError),
}

impl FieldError {
    /// Field name of the entry
    pub fn field(&self) -> &str {
        match self {
            FieldError::Parse(e) => &e.field,
            FieldError::Validation(e) => &e.field,
        }
    }

    /// Full dotted path of the entry
    pub fn field_path(&self) -> &str {
        match self {
            FieldError::Parse(e) => &e.field_path,
            FieldError::Validation(e) => &e.field_path,
        }
    }

    /// Message of the entry
    pub fn message(&self) -> &str {
        match self {
            FieldError::Parse(e) => &e.message,
            FieldError::Validation(e) => &e.message,
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldError::Parse(e) => e.fmt(f),
            FieldError::Validation(e) => e.fmt(f),
        }
    }
}

impl From<ParseError> for FieldError {
    fn from(e: ParseError) -> Self {
        FieldError::Parse(e)
    }
}

impl From<ValidationError> for FieldError {
    fn from(e: ValidationError) -> Self {
        FieldError::Validation(e)
    }
}

/// Flat, ordered collection of field errors.
///
/// Appending one list to another only ever extends the sequence; there is
/// no way to nest a list inside a list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorList {
    errors: Vec<FieldError>,
}

impl ErrorList {
    /// Create an empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one error
    pub fn push(&mut self, error: impl Into<FieldError>) {
        self.errors.push(error.into());
    }

    /// Append every entry of `other`, flattening it into this list
    pub fn append(&mut self, other: ErrorList) {
        self.errors.extend(other.errors);
    }

    /// True when nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Iterate over all entries in insertion order
    pub fn iter(&self) -> std::slice::Iter<'_, FieldError> {
        self.errors.iter()
    }

    /// Coercion and structural errors only
    pub fn parse_errors(&self) -> impl Iterator<Item = &ParseError> {
        self.errors.iter().filter_map(|e| match e {
            FieldError::Parse(p) => Some(p),
            FieldError::Validation(_) => None,
        })
    }

    /// Rule violations only
    pub fn validation_errors(&self) -> impl Iterator<Item = &ValidationError> {
        self.errors.iter().filter_map(|e| match e {
            FieldError::Validation(v) => Some(v),
            FieldError::Parse(_) => None,
        })
    }

    /// Bucket validation errors by full field path, in first-seen order
    pub fn group_by_field_path(&self) -> indexmap::IndexMap<&str, Vec<&ValidationError>> {
        let mut groups: indexmap::IndexMap<&str, Vec<&ValidationError>> =
            indexmap::IndexMap::new();
        for error in self.validation_errors() {
            groups.entry(error.field_path.as_str()).or_default().push(error);
        }
        groups
    }

    /// `Ok(())` when empty, otherwise `Err(self)`
    pub fn into_result(self) -> std::result::Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ErrorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for ErrorList {}

impl From<ParseError> for ErrorList {
    fn from(error: ParseError) -> Self {
        Self {
            errors: vec![FieldError::Parse(error)],
        }
    }
}

impl From<ValidationError> for ErrorList {
    fn from(error: ValidationError) -> Self {
        Self {
            errors: vec![FieldError::Validation(error)],
        }
    }
}

impl Extend<FieldError> for ErrorList {
    fn extend<I: IntoIterator<Item = FieldError>>(&mut self, iter: I) {
        self.errors.extend(iter);
    }
}

impl IntoIterator for ErrorList {
    type Item = FieldError;
    type IntoIter = std::vec::IntoIter<FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl<'a> IntoIterator for &'a ErrorList {
    type Item = &'a FieldError;
    type IntoIter = std::slice::Iter<'a, FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}
