//! Bindery Code Generation
//!
//! `#[derive(Schema)]` for bindery record types.
//!
//! # Pipeline Overview
//!
//! ```text
//! ┌─────────┐     ┌─────────┐     ┌─────────┐
//! │ struct  │────▶│   IR    │────▶│  impls  │
//! │ (syn)   │     │ (Parse) │     │ (Gen)   │
//! └─────────┘     └─────────┘     └─────────┘
//! ```
//!
//! # Field attributes
//!
//! - `#[schema(json = "key")]`: key read from JSON input (`"-"` excludes the field)
//! - `#[schema(yaml = "key")]`: key read from YAML input, defaults to the JSON key
//! - `#[schema(validate = "required,min=3")]`: validation rules
//!
//! # Example
//!
//! ```rust,ignore
//! use bindery::Schema;
//!
//! #[derive(Schema)]
//! struct Address {
//!     #[schema(validate = "len=5")]
//!     zip: String,
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod generator;
mod ir;
mod parser;

/// Derive `bindery::Schema` and `bindery::Coerce` for a struct with named
/// fields
#[proc_macro_derive(Schema, attributes(schema))]
pub fn derive_schema(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    parser::parse(&input)
        .map(|ir| generator::generate(&ir))
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
