//! Intermediate representation of a `#[derive(Schema)]` input
//!
//! The IR keeps only what the generator needs, already checked by the
//! parser, so generation itself cannot fail.

use syn::{Ident, Type};

/// A struct deriving `Schema`
#[derive(Debug, Clone)]
pub(crate) struct SchemaIR {
    /// Struct name
    pub ident: Ident,

    /// Fields in declaration order
    pub fields: Vec<FieldIR>,
}

/// One named field
#[derive(Debug, Clone)]
pub(crate) struct FieldIR {
    /// Field identifier, possibly raw (`r#type`)
    pub ident: Ident,

    /// Field name as seen at runtime (`type` for `r#type`)
    pub name: String,

    /// Declared type
    pub ty: Type,

    /// `#[schema(json = "...")]`
    pub json: Option<String>,

    /// `#[schema(yaml = "...")]`
    pub yaml: Option<String>,

    /// `#[schema(validate = "...")]`
    pub validate: Option<String>,
}
