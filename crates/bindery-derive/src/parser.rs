//! Derive input to IR parser

use syn::ext::IdentExt;
use syn::spanned::Spanned;
use syn::{Data, DeriveInput, Error, Fields, LitStr, Result};

use crate::ir::{FieldIR, SchemaIR};

const ATTRIBUTE: &str = "schema";

/// Parse a derive input into IR, rejecting shapes bindery can't describe
pub(crate) fn parse(input: &DeriveInput) -> Result<SchemaIR> {
    if !input.generics.params.is_empty() {
        return Err(Error::new(
            input.generics.span(),
            "#[derive(Schema)] does not support generic types",
        ));
    }

    let Data::Struct(data) = &input.data else {
        return Err(Error::new(
            input.ident.span(),
            "#[derive(Schema)] only supports structs",
        ));
    };
    let Fields::Named(named) = &data.fields else {
        return Err(Error::new(
            data.fields.span(),
            "#[derive(Schema)] only supports structs with named fields",
        ));
    };

    let fields = named
        .named
        .iter()
        .map(|field| -> Result<FieldIR> {
            // Named fields always carry an ident
            let ident = field
                .ident
                .clone()
                .ok_or_else(|| Error::new(field.span(), "expected a named field"))?;
            let mut ir = FieldIR {
                name: ident.unraw().to_string(),
                ident,
                ty: field.ty.clone(),
                json: None,
                yaml: None,
                validate: None,
            };
            for attr in field.attrs.iter().filter(|a| a.path().is_ident(ATTRIBUTE)) {
                attr.parse_nested_meta(|meta| {
                    let slot = if meta.path.is_ident("json") {
                        &mut ir.json
                    } else if meta.path.is_ident("yaml") {
                        &mut ir.yaml
                    } else if meta.path.is_ident("validate") {
                        &mut ir.validate
                    } else {
                        return Err(meta.error(
                            "unknown schema attribute, expected `json`, `yaml` or `validate`",
                        ));
                    };
                    if slot.is_some() {
                        return Err(meta.error("duplicate schema attribute"));
                    }
                    let lit: LitStr = meta.value()?.parse()?;
                    let text = lit.value();
                    if text.trim().is_empty() && !meta.path.is_ident("validate") {
                        return Err(Error::new(lit.span(), "source key must not be empty"));
                    }
                    *slot = Some(text);
                    Ok(())
                })?;
            }
            Ok(ir)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(SchemaIR {
        ident: input.ident.clone(),
        fields,
    })
}
