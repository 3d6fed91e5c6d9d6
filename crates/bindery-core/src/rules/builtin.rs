//! Built-in validation rules
//!
//! | rule | parameter | checks |
//! |------|-----------|--------|
//! | `required` | | value is not the zero value of its kind (booleans always pass) |
//! | `min` / `max` | number | numeric bound, or length bound for text and collections |
//! | `length` / `len` | number | exact length of text or collections |
//! | `email` | | address syntax |
//! | `alpha` / `alphanum` | | ASCII letters / letters and digits only |
//! | `oneof` | space separated options | value rendered as text is an option |
//! | `omitempty` | | skip the field's remaining rules when it is zero |
//! | `eqfield` / `nefield` | sibling field name | equal / not equal to the sibling |
//!
//! A null value (an absent `Option`) passes every rule except `required`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;

use super::{OMIT_EMPTY, RuleParam, RuleRegistry, Validator, Violation};
use crate::schema::{FieldValue, Record};

const EMAIL_PATTERN: &str = r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$";
const EMAIL_MAX_LEN: usize = 254;
const EMAIL_LOCAL_MAX_LEN: usize = 64;
const EMAIL_DOMAIN_MAX_LEN: usize = 253;

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(EMAIL_PATTERN).expect("email pattern is a valid regex"));

/// Register every built-in rule into `registry`
pub fn register_all(registry: &mut RuleRegistry) {
    registry.register("required", |_| Ok(Box::new(Required)));
    registry.register("min", |param| {
        Ok(Box::new(Bound {
            limit: number_param("min", param)?,
            kind: BoundKind::Min,
        }))
    });
    registry.register("max", |param| {
        Ok(Box::new(Bound {
            limit: number_param("max", param)?,
            kind: BoundKind::Max,
        }))
    });
    registry.register("length", |param| {
        Ok(Box::new(Length {
            expected: length_param("length", param)?,
        }))
    });
    registry.register("len", |param| {
        Ok(Box::new(Length {
            expected: length_param("len", param)?,
        }))
    });
    registry.register("email", |_| Ok(Box::new(Email)));
    registry.register("alpha", |_| {
        Ok(Box::new(CharClass {
            name: "letters",
            allowed: |c| c.is_ascii_alphabetic(),
        }))
    });
    registry.register("alphanum", |_| {
        Ok(Box::new(CharClass {
            name: "letters and digits",
            allowed: |c| c.is_ascii_alphanumeric(),
        }))
    });
    registry.register("oneof", |param| {
        let options: Vec<String> = match param {
            Some(param) => param.raw().split_whitespace().map(String::from).collect(),
            None => Vec::new(),
        };
        if options.is_empty() {
            return Err("expects a space separated list of options".to_string());
        }
        Ok(Box::new(OneOf { options }))
    });
    registry.register(OMIT_EMPTY, |_| Ok(Box::new(OmitEmpty)));
    registry.register("eqfield", |param| {
        Ok(Box::new(FieldComparison {
            other: field_param(param)?,
            equal: true,
        }))
    });
    registry.register("nefield", |param| {
        Ok(Box::new(FieldComparison {
            other: field_param(param)?,
            equal: false,
        }))
    });
}

fn number_param(rule: &str, param: Option<&RuleParam>) -> Result<f64, String> {
    match param {
        Some(RuleParam::Number { value, .. }) => Ok(*value),
        Some(RuleParam::Text(raw)) => Err(format!("{} expects a number, got '{}'", rule, raw)),
        None => Err(format!("{} expects a number", rule)),
    }
}

fn length_param(rule: &str, param: Option<&RuleParam>) -> Result<usize, String> {
    let n = number_param(rule, param)?;
    if n < 0.0 || n.fract() != 0.0 {
        return Err(format!("{} expects a non-negative integer, got {}", rule, n));
    }
    Ok(n as usize)
}

fn field_param(param: Option<&RuleParam>) -> Result<String, String> {
    match param {
        Some(RuleParam::Text(name)) if !name.is_empty() => Ok(name.clone()),
        _ => Err("expects the name of a sibling field".to_string()),
    }
}

/// Value is present
pub struct Required;

impl Validator for Required {
    fn validate(&self, _field: &str, value: &FieldValue) -> Result<(), Violation> {
        // A bool can't distinguish "false" from "absent".
        if matches!(value, FieldValue::Bool(_)) || !value.is_zero() {
            Ok(())
        } else {
            Err(Violation::new("is required"))
        }
    }
}

#[derive(Clone, Copy)]
enum BoundKind {
    Min,
    Max,
}

impl BoundKind {
    fn name(self) -> &'static str {
        match self {
            BoundKind::Min => "min",
            BoundKind::Max => "max",
        }
    }

    fn holds(self, actual: f64, limit: f64) -> bool {
        match self {
            BoundKind::Min => actual >= limit,
            BoundKind::Max => actual <= limit,
        }
    }

    fn phrase(self) -> &'static str {
        match self {
            BoundKind::Min => "at least",
            BoundKind::Max => "at most",
        }
    }
}

/// Lower or upper bound on a number or a length
pub struct Bound {
    limit: f64,
    kind: BoundKind,
}

impl Validator for Bound {
    fn validate(&self, _field: &str, value: &FieldValue) -> Result<(), Violation> {
        let rule = self.kind.name();
        if let Some(actual) = value.as_f64() {
            if self.kind.holds(actual, self.limit) {
                return Ok(());
            }
            return Err(
                Violation::new(format!("must be {} {}", self.kind.phrase(), self.limit))
                    .with_details(json!({ rule: self.limit, "actual": actual })),
            );
        }
        let Some(len) = value.len() else {
            return Ok(());
        };
        if self.kind.holds(len as f64, self.limit) {
            return Ok(());
        }
        Err(Violation::new(format!(
            "must {} {} {}",
            if value.as_str().is_some() { "be" } else { "contain" },
            self.kind.phrase(),
            unit(value, self.limit)
        ))
        .with_details(json!({ rule: self.limit, "actual": len })))
    }
}

fn unit(value: &FieldValue, n: f64) -> String {
    let noun = match value {
        FieldValue::String(_) => "character",
        _ => "item",
    };
    if n == 1.0 {
        format!("{} {}", n, noun)
    } else {
        format!("{} {}s", n, noun)
    }
}

/// Exact length of text or a collection
pub struct Length {
    expected: usize,
}

impl Validator for Length {
    fn validate(&self, _field: &str, value: &FieldValue) -> Result<(), Violation> {
        match value.len() {
            Some(len) if len != self.expected => Err(Violation::new(format!(
                "must be exactly {} long",
                unit(value, self.expected as f64)
            ))
            .with_details(json!({ "length": self.expected, "actual": len }))),
            _ => Ok(()),
        }
    }
}

/// Email address syntax
pub struct Email;

impl Email {
    /// Whether `address` is a syntactically valid email address
    pub fn is_valid(address: &str) -> bool {
        if address.len() > EMAIL_MAX_LEN
            || address.contains("..")
            || address.starts_with('.')
            || address.ends_with('.')
        {
            return false;
        }
        let Some((local, domain)) = address.rsplit_once('@') else {
            return false;
        };
        if local.len() > EMAIL_LOCAL_MAX_LEN || local.starts_with('.') || local.ends_with('.') {
            return false;
        }
        if domain.len() > EMAIL_DOMAIN_MAX_LEN || domain.starts_with('.') || domain.ends_with('.')
        {
            return false;
        }
        EMAIL.is_match(address)
    }
}

impl Validator for Email {
    fn validate(&self, _field: &str, value: &FieldValue) -> Result<(), Violation> {
        match value.as_str() {
            Some(address) if !Email::is_valid(address) => {
                Err(Violation::new("must be a valid email address"))
            }
            _ => Ok(()),
        }
    }
}

/// Every character of a string belongs to a class
pub struct CharClass {
    name: &'static str,
    allowed: fn(char) -> bool,
}

impl Validator for CharClass {
    fn validate(&self, _field: &str, value: &FieldValue) -> Result<(), Violation> {
        match value.as_str() {
            Some(text) if text.is_empty() || !text.chars().all(self.allowed) => {
                Err(Violation::new(format!("must contain only {}", self.name)))
            }
            _ => Ok(()),
        }
    }
}

/// Scalar value is one of a fixed set
pub struct OneOf {
    options: Vec<String>,
}

impl Validator for OneOf {
    fn validate(&self, _field: &str, value: &FieldValue) -> Result<(), Violation> {
        let Some(text) = value.as_text() else {
            return Ok(());
        };
        if self.options.iter().any(|option| *option == text) {
            return Ok(());
        }
        Err(
            Violation::new(format!("must be one of [{}]", self.options.join(" ")))
                .with_details(json!({ "options": self.options })),
        )
    }
}

/// Marker; the engine stops checking a zero-valued field when it meets it
pub struct OmitEmpty;

impl Validator for OmitEmpty {
    fn validate(&self, _field: &str, _value: &FieldValue) -> Result<(), Violation> {
        Ok(())
    }
}

/// Compares a field with a sibling's coerced value
pub struct FieldComparison {
    other: String,
    equal: bool,
}

impl Validator for FieldComparison {
    fn validate(&self, _field: &str, _value: &FieldValue) -> Result<(), Violation> {
        Ok(())
    }

    fn validate_in_record(
        &self,
        _field: &str,
        value: &FieldValue,
        record: &Record,
    ) -> Result<(), Violation> {
        let Some(other) = record.get(&self.other) else {
            return Err(Violation::new(format!(
                "refers to unknown field '{}'",
                self.other
            )));
        };
        if same_value(value, other) == self.equal {
            return Ok(());
        }
        let verb = if self.equal { "equal" } else { "differ from" };
        Err(
            Violation::new(format!("must {} field '{}'", verb, self.other))
                .with_details(json!({ "field": self.other })),
        )
    }
}

fn same_value(a: &FieldValue, b: &FieldValue) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::UnknownRulePolicy;
    use rstest::rstest;

    fn check(tag: &str, value: FieldValue) -> Result<(), Violation> {
        let registry = RuleRegistry::with_builtins();
        let rules = registry.compile(tag, UnknownRulePolicy::Strict).unwrap();
        for rule in &rules {
            rule.validator().validate("field", &value)?;
        }
        Ok(())
    }

    fn text(s: &str) -> FieldValue {
        FieldValue::String(s.to_string())
    }

    #[rstest]
    #[case::empty_string(text(""), false)]
    #[case::string(text("x"), true)]
    #[case::zero(FieldValue::Int(0), false)]
    #[case::number(FieldValue::Float(0.1), true)]
    #[case::null(FieldValue::Null, false)]
    #[case::empty_sequence(FieldValue::Sequence(vec![]), false)]
    #[case::false_is_present(FieldValue::Bool(false), true)]
    #[case::true_is_present(FieldValue::Bool(true), true)]
    fn test_required(#[case] value: FieldValue, #[case] ok: bool) {
        assert_eq!(check("required", value).is_ok(), ok);
    }

    #[rstest]
    #[case::number_below(FieldValue::Int(-1), "min=0,max=120", false)]
    #[case::number_above(FieldValue::UInt(200), "min=0,max=120", false)]
    #[case::number_inside(FieldValue::Int(30), "min=0,max=120", true)]
    #[case::float_bound(FieldValue::Float(2.5), "min=2.5", true)]
    #[case::short_string(text("Jo"), "min=3", false)]
    #[case::long_string(text("Jonathan"), "max=5", false)]
    #[case::counts_chars(text("añb"), "max=3", true)]
    #[case::few_items(FieldValue::Sequence(vec![FieldValue::Int(1)]), "min=2", false)]
    #[case::null_skips(FieldValue::Null, "min=3", true)]
    #[case::bool_ignored(FieldValue::Bool(true), "min=3", true)]
    fn test_bounds(#[case] value: FieldValue, #[case] tag: &str, #[case] ok: bool) {
        assert_eq!(check(tag, value).is_ok(), ok);
    }

    #[test]
    fn test_bound_violation_details() {
        let err = check("max=120", FieldValue::Int(200)).unwrap_err();
        assert_eq!(err.message, "must be at most 120");
        assert_eq!(err.details, Some(json!({ "max": 120.0, "actual": 200.0 })));

        let err = check("min=3", text("Jo")).unwrap_err();
        assert_eq!(err.message, "must be at least 3 characters");
        assert_eq!(err.details, Some(json!({ "min": 3.0, "actual": 2 })));
    }

    #[rstest]
    #[case::exact(text("12345"), "length=5", true)]
    #[case::short(text("1234"), "length=5", false)]
    #[case::alias(text("ab"), "len=2", true)]
    #[case::items(FieldValue::Sequence(vec![FieldValue::Null; 3]), "len=3", true)]
    fn test_length(#[case] value: FieldValue, #[case] tag: &str, #[case] ok: bool) {
        assert_eq!(check(tag, value).is_ok(), ok);
    }

    #[test]
    fn test_length_rejects_fractional_param() {
        let registry = RuleRegistry::with_builtins();
        assert!(registry.compile("length=2.5", UnknownRulePolicy::Lenient).is_err());
        assert!(registry.compile("length", UnknownRulePolicy::Lenient).is_err());
    }

    #[rstest]
    #[case::simple("alice@example.com", true)]
    #[case::plus_tag("a.b+tag@mail.example.org", true)]
    #[case::missing_at("alice.example.com", false)]
    #[case::short_tld("a@b.c", false)]
    #[case::double_dot("a..b@example.com", false)]
    #[case::leading_dot(".a@example.com", false)]
    #[case::local_trailing_dot("a.@example.com", false)]
    #[case::domain_leading_dot("a@.example.com", false)]
    #[case::trailing_dot("a@example.com.", false)]
    #[case::space("a b@example.com", false)]
    fn test_email(#[case] address: &str, #[case] ok: bool) {
        assert_eq!(Email::is_valid(address), ok);
    }

    #[test]
    fn test_email_length_limits() {
        let local = "a".repeat(65);
        assert!(!Email::is_valid(&format!("{}@example.com", local)));
        let domain = format!("{}.com", "d".repeat(250));
        assert!(!Email::is_valid(&format!("a@{}", domain)));
    }

    #[rstest]
    #[case::alpha_ok(text("Alice"), "alpha", true)]
    #[case::alpha_digit(text("Alice1"), "alpha", false)]
    #[case::alpha_empty(text(""), "alpha", false)]
    #[case::alphanum_ok(text("abc123"), "alphanum", true)]
    #[case::alphanum_dash(text("abc-123"), "alphanum", false)]
    #[case::non_ascii(text("é"), "alpha", false)]
    #[case::null_skips(FieldValue::Null, "alpha", true)]
    fn test_char_class(#[case] value: FieldValue, #[case] tag: &str, #[case] ok: bool) {
        assert_eq!(check(tag, value).is_ok(), ok);
    }

    #[rstest]
    #[case::listed(text("green"), true)]
    #[case::unlisted(text("blue"), false)]
    #[case::case_sensitive(text("Red"), false)]
    fn test_oneof(#[case] value: FieldValue, #[case] ok: bool) {
        assert_eq!(check("oneof=red green", value).is_ok(), ok);
    }

    #[test]
    fn test_oneof_matches_numbers_as_text() {
        assert!(check("oneof=1 2 3", FieldValue::Int(2)).is_ok());
        assert!(check("oneof=1 2 3", FieldValue::Int(4)).is_err());
    }

    #[test]
    fn test_oneof_single_option_kept_as_written() {
        assert!(check("oneof=1.50", text("1.50")).is_ok());
        assert!(check("oneof=1.50", text("1.5")).is_err());
    }

    #[test]
    fn test_field_comparison() {
        let registry = RuleRegistry::with_builtins();
        let eq = registry
            .compile("eqfield=password", UnknownRulePolicy::Strict)
            .unwrap();
        let ne = registry
            .compile("nefield=old", UnknownRulePolicy::Strict)
            .unwrap();

        let mut record = Record::new();
        record.insert("password", text("hunter2"));
        record.insert("confirm", text("hunter2"));
        record.insert("old", FieldValue::Int(7));

        let eq = eq[0].validator();
        assert!(eq.validate_in_record("confirm", &text("hunter2"), &record).is_ok());
        assert!(eq.validate_in_record("confirm", &text("hunter3"), &record).is_err());

        let ne = ne[0].validator();
        assert!(ne.validate_in_record("new", &FieldValue::UInt(7), &record).is_err());
        assert!(ne.validate_in_record("new", &FieldValue::Int(8), &record).is_ok());
    }

    #[test]
    fn test_field_comparison_unknown_sibling() {
        let registry = RuleRegistry::with_builtins();
        let rules = registry
            .compile("eqfield=missing", UnknownRulePolicy::Strict)
            .unwrap();
        let err = rules[0]
            .validator()
            .validate_in_record("x", &FieldValue::Int(1), &Record::new())
            .unwrap_err();
        assert!(err.message.contains("unknown field 'missing'"));
    }
}
