//! IR to Rust code generator
//!
//! Emits two impls per struct: `bindery::Schema`, describing the fields and
//! rebuilding the struct from a coerced record, and `bindery::Coerce`, so
//! the struct can itself be the type of a field in another record.

use proc_macro2::TokenStream;
use quote::quote;

use crate::ir::{FieldIR, SchemaIR};

/// Generate the impls for one struct
pub(crate) fn generate(ir: &SchemaIR) -> TokenStream {
    let ident = &ir.ident;
    let specs = ir.fields.iter().map(field_spec);
    let inits = ir.fields.iter().map(|field| {
        let ident = &field.ident;
        let name = &field.name;
        quote! { #ident: record.take(#name)? }
    });
    let record = if ir.fields.is_empty() {
        quote! { _record }
    } else {
        quote! { mut record }
    };

    quote! {
        #[automatically_derived]
        impl ::bindery::Schema for #ident {
            fn fields() -> ::std::vec::Vec<::bindery::schema::FieldSpec> {
                ::std::vec![#(#specs),*]
            }

            fn from_record(
                #record: ::bindery::Record,
            ) -> ::std::result::Result<Self, ::bindery::ParseError> {
                ::std::result::Result::Ok(Self { #(#inits),* })
            }
        }

        #[automatically_derived]
        impl ::bindery::Coerce for #ident {
            fn field_type() -> ::bindery::schema::FieldType {
                ::bindery::schema::FieldType::record::<Self>()
            }

            fn from_field_value(
                value: ::bindery::FieldValue,
            ) -> ::std::result::Result<Self, ::std::string::String> {
                value.into_record::<Self>()
            }
        }
    }
}

fn field_spec(field: &FieldIR) -> TokenStream {
    let name = &field.name;
    let ty = &field.ty;
    let mut spec = quote! {
        ::bindery::schema::FieldSpec::new(#name, <#ty as ::bindery::Coerce>::field_type())
    };
    if let Some(json) = &field.json {
        spec = quote! { #spec.json(#json) };
    }
    if let Some(yaml) = &field.yaml {
        spec = quote! { #spec.yaml(#yaml) };
    }
    if let Some(validate) = &field.validate {
        spec = quote! { #spec.validate(#validate) };
    }
    spec
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use syn::{DeriveInput, parse_quote};

    fn expand(input: DeriveInput) -> String {
        generate(&parse(&input).unwrap()).to_string()
    }

    #[test]
    fn test_generates_both_impls() {
        let code = expand(parse_quote! {
            struct User {
                #[schema(json = "userName", validate = "required")]
                name: String,
                age: u8,
            }
        });
        assert!(code.contains("impl :: bindery :: Schema for User"));
        assert!(code.contains("impl :: bindery :: Coerce for User"));
        assert!(code.contains(". json (\"userName\") . validate (\"required\")"));
        assert!(!code.contains(". yaml ("));
        assert!(code.contains("name : record . take (\"name\") ?"));
        assert!(code.contains("age : record . take (\"age\") ?"));
    }

    #[test]
    fn test_raw_identifier_uses_plain_name() {
        let code = expand(parse_quote! {
            struct Token {
                r#type: String,
            }
        });
        assert!(code.contains("FieldSpec :: new (\"type\""));
        assert!(code.contains("r#type : record . take (\"type\") ?"));
    }

    #[test]
    fn test_empty_struct_has_no_mut_binding() {
        let code = expand(parse_quote! {
            struct Empty {}
        });
        assert!(code.contains("_record : :: bindery :: Record"));
        assert!(!code.contains("mut record"));
    }
}
