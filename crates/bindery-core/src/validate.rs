//! Pass 2: rule checks over a fully coerced record

use crate::engine::join_path;
use crate::error::{ErrorList, ValidationError};
use crate::format::Format;
use crate::rules::OMIT_EMPTY;
use crate::schema::{Record, SchemaDescriptor};

/// Run every compiled rule of every included field, appending violations.
///
/// Fields that failed coercion hold their zero value here and are checked
/// like any other. Excluded fields are skipped.
pub fn validate_record(
    descriptor: &SchemaDescriptor,
    record: &Record,
    prefix: &str,
    format: Format,
    errors: &mut ErrorList,
) {
    for field in descriptor.fields() {
        if field.source_key(format).is_none() {
            continue;
        }
        let Some(value) = record.get(field.name()) else {
            continue;
        };

        for rule in field.rules() {
            if rule.name() == OMIT_EMPTY {
                if value.is_zero() {
                    break;
                }
                continue;
            }
            let result = rule
                .validator()
                .validate_in_record(field.name(), value, record);
            let Err(violation) = result else {
                continue;
            };
            let mut error = ValidationError::new(field.name(), rule.name(), violation.message)
                .at(join_path(prefix, field.name()))
                .with_value(value.clone());
            if let Some(details) = violation.details {
                error = error.with_details(details);
            }
            errors.push(error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{RuleRegistry, UnknownRulePolicy};
    use crate::schema::{FieldDescriptor, FieldSpec, FieldType, FieldValue};
    use std::any::TypeId;

    fn descriptor(specs: Vec<FieldSpec>) -> SchemaDescriptor {
        let registry = RuleRegistry::with_builtins();
        let fields = specs
            .into_iter()
            .map(|spec| {
                let rules = registry
                    .compile(spec.validate, UnknownRulePolicy::Strict)
                    .unwrap();
                FieldDescriptor::new(spec, rules)
            })
            .collect();
        SchemaDescriptor::new(TypeId::of::<()>(), "Test", fields)
    }

    #[test]
    fn test_collects_every_violation() {
        let descriptor = descriptor(vec![
            FieldSpec::new("name", FieldType::String).validate("required,min=3,alpha"),
            FieldSpec::new("age", FieldType::Int { bits: 32 }).validate("max=120"),
        ]);
        let mut record = Record::new();
        record.insert("name", FieldValue::String("J0".into()));
        record.insert("age", FieldValue::Int(200));

        let mut errors = ErrorList::new();
        validate_record(&descriptor, &record, "", Format::Json, &mut errors);

        let rules: Vec<&str> = errors.validation_errors().map(|e| e.rule.as_str()).collect();
        assert_eq!(rules, vec!["min", "alpha", "max"]);
        let max = errors.validation_errors().last().unwrap();
        assert_eq!(max.value, Some(FieldValue::Int(200)));
        assert!(max.details.is_some());
    }

    #[test]
    fn test_omitempty_skips_zero_values_only() {
        let descriptor = descriptor(vec![
            FieldSpec::new("nick", FieldType::String).validate("omitempty,min=3"),
        ]);

        let mut record = Record::new();
        record.insert("nick", FieldValue::String(String::new()));
        let mut errors = ErrorList::new();
        validate_record(&descriptor, &record, "", Format::Json, &mut errors);
        assert!(errors.is_empty());

        record.insert("nick", FieldValue::String("ab".into()));
        validate_record(&descriptor, &record, "", Format::Json, &mut errors);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_excluded_fields_are_not_validated() {
        let descriptor = descriptor(vec![
            FieldSpec::new("internal", FieldType::String)
                .json("-")
                .validate("required"),
        ]);
        let mut record = Record::new();
        record.insert("internal", FieldValue::String(String::new()));

        let mut errors = ErrorList::new();
        validate_record(&descriptor, &record, "", Format::Json, &mut errors);
        assert!(errors.is_empty());

        validate_record(&descriptor, &record, "", Format::Yaml, &mut errors);
        assert!(errors.is_empty(), "yaml key falls back to the json key");
    }

    #[test]
    fn test_paths_use_prefix() {
        let descriptor = descriptor(vec![
            FieldSpec::new("zip", FieldType::String).validate("len=5"),
        ]);
        let mut record = Record::new();
        record.insert("zip", FieldValue::String("123".into()));

        let mut errors = ErrorList::new();
        validate_record(&descriptor, &record, "profile.address", Format::Json, &mut errors);
        let error = errors.validation_errors().next().unwrap();
        assert_eq!(error.field, "zip");
        assert_eq!(error.field_path, "profile.address.zip");
    }
}
