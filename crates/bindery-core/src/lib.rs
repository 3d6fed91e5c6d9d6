//! Bindery Core Library
//!
//! Turns JSON or YAML bytes into strongly typed, validated Rust records:
//! - Format detection and decoding into a generic [`Value`] tree
//! - Cached schema introspection through `#[derive(Schema)]`
//! - Lenient type coercion (`"42"` into `u8`, `"yes"` into `bool`)
//! - Tag-driven validation, including cross-field rules
//! - Aggregated errors with a redacted, structured report
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌──────────────┐   ┌──────────────┐
//! │  detect  │──▶│  decode  │──▶│ pass 1:      │──▶│ pass 2:      │──▶ T
//! │ (format) │   │ (Value)  │   │ coerce all   │   │ validate all │   or ErrorList
//! └──────────┘   └──────────┘   └──────────────┘   └──────────────┘
//!                                      ▲
//!                               SchemaCache (per type, built once)
//! ```
//!
//! # Example
//!
//! ```rust
//! use bindery::{Error, Schema};
//!
//! #[derive(Debug, Schema)]
//! struct Signup {
//!     #[schema(validate = "required,email")]
//!     email: String,
//!     #[schema(validate = "min=8")]
//!     password: String,
//!     #[schema(json = "confirmPassword", validate = "eqfield=password")]
//!     confirm_password: String,
//! }
//!
//! let input = br#"{"email": "ann@example.com", "password": "hunter22", "confirmPassword": "hunter22"}"#;
//! let signup: Signup = bindery::parse(input, None).unwrap();
//! assert_eq!(signup.email, "ann@example.com");
//!
//! let err = bindery::parse::<Signup>(b"email: nope\npassword: short\n", None).unwrap_err();
//! let Error::Invalid(errors) = err else { panic!("expected field errors") };
//! assert_eq!(errors.len(), 3);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

// Lets generated `::bindery::` paths resolve inside this crate's own tests.
extern crate self as bindery;

pub mod cache;
pub mod coerce;
pub mod config;
pub mod engine;
pub mod error;
pub mod format;
pub mod report;
pub mod rules;
pub mod schema;
pub mod validate;
pub mod value;

pub use bindery_derive::Schema;
pub use config::ParseConfig;
pub use engine::Engine;
pub use error::{Error, ErrorList, FieldError, ParseError, Result, ValidationError};
pub use format::Format;
pub use report::ErrorReport;
pub use schema::{Coerce, FieldValue, Record, Schema, SchemaCache};
pub use value::Value;

/// Parse `input` into `T` with the process-wide configuration and schema
/// cache, detecting the format when `format` is `None`
pub fn parse<T: Schema>(input: &[u8], format: Option<Format>) -> Result<T> {
    Engine::new().parse(input, format)
}
