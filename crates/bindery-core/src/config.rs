//! Parse configuration
//!
//! [`ParseConfig`] carries the resource limits and the redaction patterns
//! used by an [`Engine`](crate::Engine). It can be built in code, loaded from
//! a YAML (or JSON) file, or taken from the process-wide default.
//!
//! # Configuration file
//!
//! ```yaml
//! max_input_size: 1048576   # bytes, 0 disables the check
//! max_depth: 16             # nesting levels, 0 disables the check
//! sensitive_fields: [password, secret, token, api_key, ssn]
//! unknown_rules: strict     # or lenient
//! ```
//!
//! Every key is optional and falls back to its default.

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};
use crate::rules::UnknownRulePolicy;

static GLOBAL: Lazy<RwLock<ParseConfig>> = Lazy::new(|| RwLock::new(ParseConfig::default()));

/// Limits and redaction settings for parsing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseConfig {
    /// Largest accepted input in bytes; 0 disables the check
    #[serde(default = "default_max_input_size")]
    pub max_input_size: usize,

    /// Deepest accepted nesting of records and collections; 0 disables it
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Substrings marking a field name as sensitive (case-insensitive)
    #[serde(default = "default_sensitive_fields")]
    pub sensitive_fields: Vec<String>,

    /// Treatment of unregistered rule names in validation tags
    #[serde(default)]
    pub unknown_rules: UnknownRulePolicy,
}

fn default_max_input_size() -> usize {
    10 * 1024 * 1024
}

fn default_max_depth() -> usize {
    32
}

fn default_sensitive_fields() -> Vec<String> {
    ["password", "secret", "token", "api_key"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            max_input_size: default_max_input_size(),
            max_depth: default_max_depth(),
            sensitive_fields: default_sensitive_fields(),
            unknown_rules: UnknownRulePolicy::default(),
        }
    }
}

impl ParseConfig {
    /// Parse configuration from YAML (or JSON) text
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: ParseConfig = serde_yaml::from_str(text).map_err(|e| Error::ConfigInvalid {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let config = ParseConfig::load("bindery.yaml")?;
    /// let engine = Engine::with_config(config);
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::ConfigNotFound {
                path: path.display().to_string(),
            });
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Reject settings that can't work
    pub fn validate(&self) -> Result<()> {
        if self.sensitive_fields.iter().any(|p| p.trim().is_empty()) {
            return Err(Error::ConfigInvalid {
                message: "sensitive_fields must not contain empty patterns".to_string(),
            });
        }
        Ok(())
    }

    /// Whether values of `field` must be redacted in error output
    pub fn is_sensitive(&self, field: &str) -> bool {
        let field = field.to_lowercase();
        self.sensitive_fields
            .iter()
            .any(|pattern| field.contains(&pattern.to_lowercase()))
    }
}

/// Snapshot of the process-wide configuration
pub fn global() -> ParseConfig {
    GLOBAL.read().clone()
}

/// Replace the process-wide configuration
pub fn set_global(config: ParseConfig) {
    *GLOBAL.write() = config;
}

/// Modify the process-wide configuration in place
pub fn update<F: FnOnce(&mut ParseConfig)>(f: F) {
    f(&mut GLOBAL.write());
}
