//! Type coercion
//!
//! Converts decoded [`Value`]s into [`FieldValue`]s of a field's declared
//! [`FieldType`]. Scalars go through the lenient conversions below (a
//! string `"42"` fills an integer field, `"yes"` a boolean one). Containers
//! and nested records recurse, and every failure is recorded against its
//! full field path while the remaining fields keep going.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use indexmap::IndexMap;

use crate::engine::Session;
use crate::error::{ErrorList, ParseError, Result};
use crate::schema::{FieldType, FieldValue};
use crate::value::{Number, Value};

const TRUE_WORDS: [&str; 4] = ["true", "1", "yes", "on"];
const FALSE_WORDS: [&str; 5] = ["false", "0", "no", "off", ""];

/// Zero value of a field type, used for null, missing and excluded fields
/// and in place of a value that failed to coerce
pub fn zero(ty: &FieldType) -> FieldValue {
    match ty {
        FieldType::String => FieldValue::String(String::new()),
        FieldType::Bool => FieldValue::Bool(false),
        FieldType::Int { .. } => FieldValue::Int(0),
        FieldType::UInt { .. } => FieldValue::UInt(0),
        FieldType::Float => FieldValue::Float(0.0),
        FieldType::Sequence(_) => FieldValue::Sequence(Vec::new()),
        FieldType::Array(inner, len) => FieldValue::Sequence(vec![zero(inner); *len]),
        FieldType::Map(_) => FieldValue::Map(IndexMap::new()),
        FieldType::Raw => FieldValue::Raw(Value::Null),
        FieldType::Timestamp | FieldType::Optional(_) | FieldType::Record(_) => FieldValue::Null,
    }
}

/// Coerce a scalar value into a scalar field type
pub fn scalar(value: &Value, ty: &FieldType) -> std::result::Result<FieldValue, String> {
    match ty {
        FieldType::String => to_string(value).map(FieldValue::String),
        FieldType::Bool => to_bool(value).map(FieldValue::Bool),
        FieldType::Int { bits } => to_int(value, *bits).map(FieldValue::Int),
        FieldType::UInt { bits } => to_uint(value, *bits).map(FieldValue::UInt),
        FieldType::Float => to_float(value).map(FieldValue::Float),
        FieldType::Timestamp => to_timestamp(value).map(FieldValue::Timestamp),
        other => Err(format!("{} is not a scalar type", other.describe())),
    }
}

/// Text form of a scalar
pub fn to_string(value: &Value) -> std::result::Result<String, String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Null => Ok(String::new()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(format!("cannot convert {} to string", other.kind())),
    }
}

fn int_range(bits: u32) -> (i128, i128) {
    let max = (1i128 << (bits - 1)) - 1;
    (-max - 1, max)
}

fn uint_max(bits: u32) -> i128 {
    (1i128 << bits) - 1
}

/// Whole-number view of a value: floats truncate, booleans are 0 or 1,
/// strings parse as base-10 after trimming
fn integer(value: &Value) -> std::result::Result<i128, String> {
    match value {
        Value::Number(Number::Int(i)) => Ok(i128::from(*i)),
        Value::Number(Number::UInt(u)) => Ok(i128::from(*u)),
        Value::Number(Number::Float(f)) => {
            let t = f.trunc();
            // i128 covers every in-range 64-bit value with room to spare
            if t.is_finite() && t.abs() < 1e38 {
                Ok(t as i128)
            } else {
                Err(format!("{} is not a representable integer", f))
            }
        }
        Value::Bool(b) => Ok(i128::from(*b)),
        Value::String(s) => s
            .trim()
            .parse::<i128>()
            .map_err(|_| format!("invalid integer {:?}", s)),
        Value::Null => Ok(0),
        other => Err(format!("cannot convert {} to integer", other.kind())),
    }
}

/// Signed integer of `bits` width
pub fn to_int(value: &Value, bits: u32) -> std::result::Result<i64, String> {
    let n = integer(value)?;
    let (min, max) = int_range(bits);
    if n < min || n > max {
        return Err(format!("value {} out of range for i{}", n, bits));
    }
    i64::try_from(n).map_err(|_| format!("value {} out of range for i{}", n, bits))
}

/// Unsigned integer of `bits` width
pub fn to_uint(value: &Value, bits: u32) -> std::result::Result<u64, String> {
    let n = integer(value)?;
    if n < 0 {
        return Err(format!("negative value {} for u{}", n, bits));
    }
    if n > uint_max(bits) {
        return Err(format!("value {} out of range for u{}", n, bits));
    }
    u64::try_from(n).map_err(|_| format!("value {} out of range for u{}", n, bits))
}

/// Floating point number
pub fn to_float(value: &Value) -> std::result::Result<f64, String> {
    match value {
        Value::Number(n) => Ok(n.as_f64()),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("invalid float {:?}", s)),
        Value::Null => Ok(0.0),
        other => Err(format!("cannot convert {} to float", other.kind())),
    }
}

/// Boolean: `true/1/yes/on` and `false/0/no/off/""` in any case, or a
/// number that is nonzero
pub fn to_bool(value: &Value) -> std::result::Result<bool, String> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => Ok(n.is_nonzero()),
        Value::String(s) => {
            let lower = s.to_lowercase();
            if TRUE_WORDS.contains(&lower.as_str()) {
                Ok(true)
            } else if FALSE_WORDS.contains(&lower.as_str()) {
                Ok(false)
            } else {
                Err(format!("invalid boolean {:?}", s))
            }
        }
        Value::Null => Ok(false),
        other => Err(format!("cannot convert {} to boolean", other.kind())),
    }
}

/// Point in time.
///
/// Numbers are seconds since the Unix epoch, fractions kept. Strings try,
/// in order: RFC 3339 (only when the 11th character is `T`), `YYYY-MM-DD`,
/// `HH:MM:SS`, `YYYY-MM-DD HH:MM:SS`. Values without an offset are UTC.
pub fn to_timestamp(value: &Value) -> std::result::Result<DateTime<FixedOffset>, String> {
    match value {
        Value::Number(n) => from_epoch_seconds(n),
        Value::String(s) => parse_timestamp(s).ok_or_else(|| format!("invalid timestamp {:?}", s)),
        other => Err(format!("cannot convert {} to timestamp", other.kind())),
    }
}

fn from_epoch_seconds(n: &Number) -> std::result::Result<DateTime<FixedOffset>, String> {
    let parsed = match *n {
        Number::Int(secs) => DateTime::from_timestamp(secs, 0),
        Number::UInt(secs) => i64::try_from(secs)
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0)),
        Number::Float(f) if f.is_finite() => {
            let secs = f.floor();
            let nanos = (((f - secs) * 1e9).round() as u32).min(999_999_999);
            DateTime::from_timestamp(secs as i64, nanos)
        }
        Number::Float(_) => None,
    };
    parsed
        .map(|t| t.fixed_offset())
        .ok_or_else(|| format!("timestamp {} out of range", n))
}

fn parse_timestamp(s: &str) -> Option<DateTime<FixedOffset>> {
    if s.as_bytes().get(10) == Some(&b'T') {
        return DateTime::parse_from_rfc3339(s).ok();
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date.and_time(NaiveTime::default()).and_utc().fixed_offset());
    }
    if let Ok(time) = NaiveTime::parse_from_str(s, "%H:%M:%S") {
        // NaiveDate::default() is 1970-01-01
        return Some(NaiveDate::default().and_time(time).and_utc().fixed_offset());
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|t| t.and_utc().fixed_offset())
}

impl Session<'_> {
    /// Coerce `raw` into `ty` for the field at `path`.
    ///
    /// Field failures are pushed onto `errors` and the zero value is
    /// returned in their place; only limit violations and schema build
    /// failures come back as `Err`.
    pub(crate) fn coerce(
        &self,
        raw: &Value,
        ty: &FieldType,
        field: &str,
        path: &str,
        depth: usize,
        errors: &mut ErrorList,
    ) -> Result<FieldValue> {
        if raw.is_null() {
            return Ok(zero(ty));
        }

        let mismatch = |errors: &mut ErrorList| {
            errors.push(
                ParseError::new(field, format!("expected {}, found {}", ty.describe(), raw.kind()))
                    .at(path)
                    .with_value(raw.clone()),
            );
            zero(ty)
        };

        match ty {
            FieldType::Optional(inner) => self.coerce(raw, inner, field, path, depth, errors),
            FieldType::Raw => Ok(FieldValue::Raw(raw.clone())),

            FieldType::Sequence(inner) | FieldType::Array(inner, _) => {
                let Some(items) = raw.as_array() else {
                    return Ok(mismatch(errors));
                };
                let expected = match ty {
                    FieldType::Array(_, len) => Some(*len),
                    _ => None,
                };
                if let Some(len) = expected.filter(|len| *len != items.len()) {
                    errors.push(
                        ParseError::new(
                            field,
                            format!("expected {} elements, found {}", len, items.len()),
                        )
                        .at(path)
                        .with_value(raw.clone()),
                    );
                    return Ok(zero(ty));
                }
                let depth = self.enter(depth, path)?;
                let mut values = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    let item_field = format!("{}[{}]", field, i);
                    let item_path = format!("{}[{}]", path, i);
                    values.push(self.coerce(item, inner, &item_field, &item_path, depth, errors)?);
                }
                Ok(FieldValue::Sequence(values))
            }

            FieldType::Map(inner) => {
                let Some(object) = raw.as_object() else {
                    return Ok(mismatch(errors));
                };
                let depth = self.enter(depth, path)?;
                let mut entries = IndexMap::with_capacity(object.len());
                for (key, item) in object {
                    let item_path = format!("{}.{}", path, key);
                    let value = self.coerce(item, inner, key, &item_path, depth, errors)?;
                    entries.insert(key.clone(), value);
                }
                Ok(FieldValue::Map(entries))
            }

            FieldType::Record(record_type) => {
                let Some(object) = raw.as_object() else {
                    return Ok(mismatch(errors));
                };
                let depth = self.enter(depth, path)?;
                let descriptor = self.cache.resolve(record_type)?;
                let (record, nested) = self.fill_record(&descriptor, object, path, depth)?;
                errors.append(nested);
                Ok(FieldValue::Record(record))
            }

            scalar_type => match scalar(raw, scalar_type) {
                Ok(value) => Ok(value),
                Err(message) => {
                    errors.push(
                        ParseError::new(field, message)
                            .at(path)
                            .with_value(raw.clone()),
                    );
                    Ok(zero(ty))
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn s(text: &str) -> Value {
        Value::String(text.to_string())
    }

    #[rstest]
    #[case::true_word(s("true"), Ok(true))]
    #[case::upper(s("TRUE"), Ok(true))]
    #[case::one(s("1"), Ok(true))]
    #[case::yes(s("Yes"), Ok(true))]
    #[case::on(s("on"), Ok(true))]
    #[case::false_word(s("False"), Ok(false))]
    #[case::zero(s("0"), Ok(false))]
    #[case::no(s("no"), Ok(false))]
    #[case::off(s("OFF"), Ok(false))]
    #[case::empty(s(""), Ok(false))]
    #[case::number(Value::from(2i64), Ok(true))]
    #[case::zero_number(Value::from(0.0), Ok(false))]
    #[case::bool(Value::Bool(true), Ok(true))]
    fn test_to_bool(#[case] value: Value, #[case] expected: std::result::Result<bool, String>) {
        assert_eq!(to_bool(&value), expected);
    }

    #[rstest]
    #[case::maybe("maybe")]
    #[case::y("y")]
    #[case::padded(" true")]
    #[case::two("2")]
    fn test_to_bool_rejects(#[case] text: &str) {
        let err = to_bool(&s(text)).unwrap_err();
        assert!(err.starts_with("invalid boolean"));
    }

    #[rstest]
    #[case::int(Value::from(42i64), 32, Ok(42))]
    #[case::string(s(" 42 "), 32, Ok(42))]
    #[case::negative_string(s("-7"), 8, Ok(-7))]
    #[case::float_truncates(Value::from(3.9), 32, Ok(3))]
    #[case::negative_float_truncates(Value::from(-3.9), 32, Ok(-3))]
    #[case::bool(Value::Bool(true), 8, Ok(1))]
    #[case::i8_max(Value::from(127i64), 8, Ok(127))]
    #[case::i8_overflow(Value::from(128i64), 8, Err("value 128 out of range for i8".to_string()))]
    #[case::i8_underflow(s("-129"), 8, Err("value -129 out of range for i8".to_string()))]
    #[case::i64_overflow(s("9223372036854775808"), 64, Err("value 9223372036854775808 out of range for i64".to_string()))]
    #[case::garbage(s("12abc"), 32, Err("invalid integer \"12abc\"".to_string()))]
    #[case::float_string(s("1.5"), 32, Err("invalid integer \"1.5\"".to_string()))]
    fn test_to_int(
        #[case] value: Value,
        #[case] bits: u32,
        #[case] expected: std::result::Result<i64, String>,
    ) {
        assert_eq!(to_int(&value, bits), expected);
    }

    #[rstest]
    #[case::int(Value::from(255i64), 8, Ok(255))]
    #[case::string(s("65535"), 16, Ok(65535))]
    #[case::u64_max(Value::Number(Number::UInt(u64::MAX)), 64, Ok(u64::MAX))]
    #[case::overflow(Value::from(256i64), 8, Err("value 256 out of range for u8".to_string()))]
    #[case::negative(Value::from(-1i64), 32, Err("negative value -1 for u32".to_string()))]
    #[case::negative_string(s("-5"), 64, Err("negative value -5 for u64".to_string()))]
    fn test_to_uint(
        #[case] value: Value,
        #[case] bits: u32,
        #[case] expected: std::result::Result<u64, String>,
    ) {
        assert_eq!(to_uint(&value, bits), expected);
    }

    #[rstest]
    #[case::float(Value::from(1.5), Ok(1.5))]
    #[case::int(Value::from(2i64), Ok(2.0))]
    #[case::string(s("2.25"), Ok(2.25))]
    #[case::bool(Value::Bool(true), Ok(1.0))]
    #[case::garbage(s("abc"), Err("invalid float \"abc\"".to_string()))]
    fn test_to_float(#[case] value: Value, #[case] expected: std::result::Result<f64, String>) {
        assert_eq!(to_float(&value), expected);
    }

    #[rstest]
    #[case::string(s("Alice"), "Alice")]
    #[case::int(Value::from(5i64), "5")]
    #[case::float(Value::from(1.5), "1.5")]
    #[case::bool(Value::Bool(false), "false")]
    fn test_to_string(#[case] value: Value, #[case] expected: &str) {
        assert_eq!(to_string(&value).unwrap(), expected);
    }

    #[test]
    fn test_to_string_rejects_containers() {
        assert!(to_string(&Value::Array(vec![])).is_err());
        assert!(to_string(&Value::Object(Default::default())).is_err());
    }

    #[rstest]
    #[case::rfc3339("2024-03-01T10:20:30Z", "2024-03-01T10:20:30+00:00")]
    #[case::rfc3339_offset("2024-03-01T10:20:30+02:00", "2024-03-01T10:20:30+02:00")]
    #[case::rfc3339_fraction("2024-03-01T10:20:30.250Z", "2024-03-01T10:20:30.250+00:00")]
    #[case::date("2024-03-01", "2024-03-01T00:00:00+00:00")]
    #[case::time("10:20:30", "1970-01-01T10:20:30+00:00")]
    #[case::date_time("2024-03-01 10:20:30", "2024-03-01T10:20:30+00:00")]
    fn test_to_timestamp_strings(#[case] input: &str, #[case] expected: &str) {
        let t = to_timestamp(&s(input)).unwrap();
        assert_eq!(t.to_rfc3339(), expected);
    }

    #[test]
    fn test_to_timestamp_epoch_seconds() {
        let t = to_timestamp(&Value::from(1_700_000_000i64)).unwrap();
        assert_eq!(t.to_rfc3339(), "2023-11-14T22:13:20+00:00");

        let t = to_timestamp(&Value::from(1.5)).unwrap();
        assert_eq!(t.timestamp(), 1);
        assert_eq!(t.timestamp_subsec_millis(), 500);
    }

    #[rstest]
    #[case::garbage("yesterday")]
    #[case::t_but_bad("2024-03-01Tnope")]
    #[case::slashes("2024/03/01")]
    fn test_to_timestamp_rejects(#[case] input: &str) {
        assert!(to_timestamp(&s(input)).is_err());
    }

    #[test]
    fn test_zero_values() {
        assert_eq!(zero(&FieldType::String), FieldValue::String(String::new()));
        assert_eq!(zero(&FieldType::Int { bits: 8 }), FieldValue::Int(0));
        assert_eq!(
            zero(&FieldType::Array(Box::new(FieldType::Bool), 2)),
            FieldValue::Sequence(vec![FieldValue::Bool(false); 2])
        );
        assert_eq!(zero(&FieldType::Optional(Box::new(FieldType::Float))), FieldValue::Null);
    }
}
