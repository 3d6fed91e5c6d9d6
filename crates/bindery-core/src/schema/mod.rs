//! Schema introspection
//!
//! Rust has no runtime reflection, so a target type describes its fields
//! once through [`Schema::fields`] (generated by `#[derive(Schema)]`). The
//! [`SchemaCache`] compiles that description into a [`SchemaDescriptor`] the
//! first time the type is parsed and shares it with every later parse.
//!
//! # Example
//!
//! ```rust
//! use bindery::Schema;
//!
//! #[derive(Debug, Schema)]
//! struct User {
//!     #[schema(json = "userName", validate = "required,min=3")]
//!     name: String,
//!     #[schema(validate = "min=0,max=120")]
//!     age: u8,
//! }
//!
//! let user: User = bindery::parse(br#"{"userName": "alice", "age": "30"}"#, None).unwrap();
//! assert_eq!(user.age, 30);
//! ```

mod cache;
mod field;
mod typed;

pub use cache::SchemaCache;
pub use field::{
    EXCLUDED_KEY, FieldDescriptor, FieldSpec, FieldType, RecordType, SchemaDescriptor,
};
pub use typed::{Coerce, FieldValue, Record};

use crate::error::ParseError;

/// A record type bindery can parse into.
///
/// Usually derived. A manual implementation lists the fields in declaration
/// order and rebuilds the struct from a fully coerced [`Record`].
pub trait Schema: Sized + 'static {
    /// Declared fields, in order
    fn fields() -> Vec<FieldSpec>;

    /// Build the value from a record whose fields all coerced and validated
    fn from_record(record: Record) -> Result<Self, ParseError>;
}
