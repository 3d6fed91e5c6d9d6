//! Coerced field values and their conversion into Rust types
//!
//! Pass 1 turns each raw [`Value`] into a [`FieldValue`]; validators only
//! ever see `FieldValue`s. Once a record is valid, [`Coerce::from_field_value`]
//! moves each value into the concrete field type of the caller's struct.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use super::{FieldType, Schema};
use crate::error::ParseError;
use crate::value::Value;

/// A coerced value, typed according to its [`FieldType`]
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Absent optional, or a null that has no typed zero
    Null,
    /// Boolean
    Bool(bool),
    /// Signed integer of any width
    Int(i64),
    /// Unsigned integer of any width
    UInt(u64),
    /// Floating point
    Float(f64),
    /// Text
    String(String),
    /// Point in time; naive inputs carry a zero offset
    Timestamp(DateTime<FixedOffset>),
    /// Elements of a sequence or fixed-size array
    Sequence(Vec<FieldValue>),
    /// String-keyed map
    Map(IndexMap<String, FieldValue>),
    /// Nested record
    Record(Record),
    /// Untouched generic document
    Raw(Value),
}

impl FieldValue {
    /// Short name of the value's kind, used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Bool(_) => "boolean",
            FieldValue::Int(_) | FieldValue::UInt(_) => "integer",
            FieldValue::Float(_) => "float",
            FieldValue::String(_) => "string",
            FieldValue::Timestamp(_) => "timestamp",
            FieldValue::Sequence(_) => "sequence",
            FieldValue::Map(_) => "map",
            FieldValue::Record(_) => "record",
            FieldValue::Raw(_) => "document",
        }
    }

    /// The zero value of its kind: empty text, zero number, empty
    /// collection, null, or a record whose fields are all zero.
    pub fn is_zero(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::Bool(b) => !b,
            FieldValue::Int(i) => *i == 0,
            FieldValue::UInt(u) => *u == 0,
            FieldValue::Float(f) => *f == 0.0,
            FieldValue::String(s) => s.is_empty(),
            FieldValue::Timestamp(t) => t.timestamp() == 0 && t.timestamp_subsec_nanos() == 0,
            FieldValue::Sequence(items) => items.is_empty(),
            FieldValue::Map(entries) => entries.is_empty(),
            FieldValue::Record(record) => record.is_zero(),
            FieldValue::Raw(value) => value.is_null(),
        }
    }

    /// Numeric view for bound checks
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            FieldValue::Int(i) => Some(i as f64),
            FieldValue::UInt(u) => Some(u as f64),
            FieldValue::Float(f) => Some(f),
            _ => None,
        }
    }

    /// Borrow the text, if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Length for strings (in characters), sequences and maps
    pub fn len(&self) -> Option<usize> {
        match self {
            FieldValue::String(s) => Some(s.chars().count()),
            FieldValue::Sequence(items) => Some(items.len()),
            FieldValue::Map(entries) => Some(entries.len()),
            _ => None,
        }
    }

    /// Scalar rendered as text, as used by `oneof`
    pub fn as_text(&self) -> Option<String> {
        match self {
            FieldValue::String(s) => Some(s.clone()),
            FieldValue::Bool(b) => Some(b.to_string()),
            FieldValue::Int(i) => Some(i.to_string()),
            FieldValue::UInt(u) => Some(u.to_string()),
            FieldValue::Float(f) => Some(f.to_string()),
            _ => None,
        }
    }

    /// Convert a nested record value into its struct; null converts from
    /// an empty record, giving every field its zero value.
    pub fn into_record<T: Schema>(self) -> Result<T, String> {
        match self {
            FieldValue::Record(record) => T::from_record(record).map_err(|e| e.to_string()),
            FieldValue::Null => T::from_record(Record::new()).map_err(|e| e.to_string()),
            other => Err(mismatch("record", &other)),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => f.write_str("null"),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Int(i) => write!(f, "{}", i),
            FieldValue::UInt(u) => write!(f, "{}", u),
            FieldValue::Float(x) => write!(f, "{}", x),
            FieldValue::String(s) => write!(f, "{:?}", s),
            FieldValue::Timestamp(t) => write!(f, "{}", t.to_rfc3339()),
            FieldValue::Sequence(items) => write!(f, "<sequence of {}>", items.len()),
            FieldValue::Map(entries) => write!(f, "<map of {}>", entries.len()),
            FieldValue::Record(record) => write!(f, "<record of {}>", record.len()),
            FieldValue::Raw(value) => write!(f, "{}", value),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Null => serializer.serialize_unit(),
            FieldValue::Bool(b) => serializer.serialize_bool(*b),
            FieldValue::Int(i) => serializer.serialize_i64(*i),
            FieldValue::UInt(u) => serializer.serialize_u64(*u),
            FieldValue::Float(f) => serializer.serialize_f64(*f),
            FieldValue::String(s) => serializer.serialize_str(s),
            FieldValue::Timestamp(t) => serializer.serialize_str(&t.to_rfc3339()),
            FieldValue::Sequence(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            FieldValue::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, item) in entries {
                    map.serialize_entry(key, item)?;
                }
                map.end()
            }
            FieldValue::Record(record) => record.serialize(serializer),
            FieldValue::Raw(value) => value.serialize(serializer),
        }
    }
}

/// Field values of one record, keyed by field name in declaration order.
///
/// Filled during pass 1, read by validators in pass 2 (cross-field rules
/// look up siblings here), then drained by [`Schema::from_record`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    values: IndexMap<&'static str, FieldValue>,
}

impl Record {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field's value
    pub fn insert(&mut self, field: &'static str, value: FieldValue) {
        self.values.insert(field, value);
    }

    /// Coerced value of a field
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.values.get(field)
    }

    /// Remove a field and convert it into `T`; a missing field converts
    /// from [`FieldValue::Null`].
    pub fn take<T: Coerce>(&mut self, field: &str) -> Result<T, ParseError> {
        let value = self.values.shift_remove(field).unwrap_or(FieldValue::Null);
        T::from_field_value(value).map_err(|message| ParseError::new(field, message))
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when the record has no fields
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// True when every field holds its zero value
    pub fn is_zero(&self) -> bool {
        self.values.values().all(FieldValue::is_zero)
    }

    /// Iterate over `(field, value)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &FieldValue)> {
        self.values.iter().map(|(k, v)| (*k, v))
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (key, value) in &self.values {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// A Rust type that can be the target of a field.
///
/// `#[derive(Schema)]` implements this for records; bindery implements it
/// for scalars, chrono types, `Option`, `Vec`, arrays and string-keyed maps.
pub trait Coerce: Sized {
    /// Shape the coercion engine should produce for this type
    fn field_type() -> FieldType;

    /// Convert the coerced value into `Self`
    fn from_field_value(value: FieldValue) -> Result<Self, String>;
}

fn mismatch(expected: &str, found: &FieldValue) -> String {
    format!("expected {}, found {}", expected, found.kind())
}

impl Coerce for String {
    fn field_type() -> FieldType {
        FieldType::String
    }

    fn from_field_value(value: FieldValue) -> Result<Self, String> {
        match value {
            FieldValue::String(s) => Ok(s),
            FieldValue::Null => Ok(String::new()),
            other => Err(mismatch("string", &other)),
        }
    }
}

impl Coerce for bool {
    fn field_type() -> FieldType {
        FieldType::Bool
    }

    fn from_field_value(value: FieldValue) -> Result<Self, String> {
        match value {
            FieldValue::Bool(b) => Ok(b),
            FieldValue::Null => Ok(false),
            other => Err(mismatch("boolean", &other)),
        }
    }
}

macro_rules! coerce_int {
    ($($ty:ty => $variant:ident, $bits:expr;)*) => {$(
        impl Coerce for $ty {
            fn field_type() -> FieldType {
                FieldType::$variant { bits: $bits }
            }

            fn from_field_value(value: FieldValue) -> Result<Self, String> {
                match value {
                    FieldValue::Int(i) => <$ty>::try_from(i)
                        .map_err(|_| format!("{} overflows {}", i, stringify!($ty))),
                    FieldValue::UInt(u) => <$ty>::try_from(u)
                        .map_err(|_| format!("{} overflows {}", u, stringify!($ty))),
                    FieldValue::Null => Ok(0),
                    other => Err(mismatch("integer", &other)),
                }
            }
        }
    )*};
}

coerce_int! {
    i8 => Int, 8;
    i16 => Int, 16;
    i32 => Int, 32;
    i64 => Int, 64;
    u8 => UInt, 8;
    u16 => UInt, 16;
    u32 => UInt, 32;
    u64 => UInt, 64;
}

macro_rules! coerce_float {
    ($($ty:ty),*) => {$(
        impl Coerce for $ty {
            fn field_type() -> FieldType {
                FieldType::Float
            }

            fn from_field_value(value: FieldValue) -> Result<Self, String> {
                match value {
                    FieldValue::Float(f) => {
                        let narrowed = f as $ty;
                        if f.is_finite() && !narrowed.is_finite() {
                            return Err(format!("{} overflows {}", f, stringify!($ty)));
                        }
                        Ok(narrowed)
                    }
                    FieldValue::Int(i) => Ok(i as $ty),
                    FieldValue::UInt(u) => Ok(u as $ty),
                    FieldValue::Null => Ok(0.0),
                    other => Err(mismatch("float", &other)),
                }
            }
        }
    )*};
}

coerce_float!(f32, f64);

fn timestamp(value: FieldValue) -> Result<Option<DateTime<FixedOffset>>, String> {
    match value {
        FieldValue::Timestamp(t) => Ok(Some(t)),
        FieldValue::Null => Ok(None),
        other => Err(mismatch("timestamp", &other)),
    }
}

impl Coerce for DateTime<FixedOffset> {
    fn field_type() -> FieldType {
        FieldType::Timestamp
    }

    fn from_field_value(value: FieldValue) -> Result<Self, String> {
        Ok(timestamp(value)?.unwrap_or_else(|| DateTime::<Utc>::default().fixed_offset()))
    }
}

impl Coerce for DateTime<Utc> {
    fn field_type() -> FieldType {
        FieldType::Timestamp
    }

    fn from_field_value(value: FieldValue) -> Result<Self, String> {
        Ok(timestamp(value)?
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_default())
    }
}

impl Coerce for NaiveDateTime {
    fn field_type() -> FieldType {
        FieldType::Timestamp
    }

    fn from_field_value(value: FieldValue) -> Result<Self, String> {
        Ok(timestamp(value)?
            .map(|t| t.naive_local())
            .unwrap_or_default())
    }
}

impl Coerce for NaiveDate {
    fn field_type() -> FieldType {
        FieldType::Timestamp
    }

    fn from_field_value(value: FieldValue) -> Result<Self, String> {
        Ok(timestamp(value)?
            .map(|t| t.date_naive())
            .unwrap_or_default())
    }
}

impl Coerce for NaiveTime {
    fn field_type() -> FieldType {
        FieldType::Timestamp
    }

    fn from_field_value(value: FieldValue) -> Result<Self, String> {
        Ok(timestamp(value)?.map(|t| t.time()).unwrap_or_default())
    }
}

impl<T: Coerce> Coerce for Option<T> {
    fn field_type() -> FieldType {
        FieldType::Optional(Box::new(T::field_type()))
    }

    fn from_field_value(value: FieldValue) -> Result<Self, String> {
        match value {
            FieldValue::Null => Ok(None),
            other => T::from_field_value(other).map(Some),
        }
    }
}

impl<T: Coerce> Coerce for Vec<T> {
    fn field_type() -> FieldType {
        FieldType::Sequence(Box::new(T::field_type()))
    }

    fn from_field_value(value: FieldValue) -> Result<Self, String> {
        match value {
            FieldValue::Sequence(items) => items.into_iter().map(T::from_field_value).collect(),
            FieldValue::Null => Ok(Vec::new()),
            other => Err(mismatch("sequence", &other)),
        }
    }
}

impl<T: Coerce, const N: usize> Coerce for [T; N] {
    fn field_type() -> FieldType {
        FieldType::Array(Box::new(T::field_type()), N)
    }

    fn from_field_value(value: FieldValue) -> Result<Self, String> {
        let items = match value {
            FieldValue::Null => (0..N)
                .map(|_| T::from_field_value(FieldValue::Null))
                .collect::<Result<Vec<_>, _>>()?,
            other => Vec::<T>::from_field_value(other)?,
        };
        let len = items.len();
        <[T; N]>::try_from(items)
            .map_err(|_| format!("expected array of length {}, found {}", N, len))
    }
}

impl<T: Coerce> Coerce for Box<T> {
    fn field_type() -> FieldType {
        T::field_type()
    }

    fn from_field_value(value: FieldValue) -> Result<Self, String> {
        T::from_field_value(value).map(Box::new)
    }
}

impl<T: Coerce> Coerce for HashMap<String, T> {
    fn field_type() -> FieldType {
        FieldType::Map(Box::new(T::field_type()))
    }

    fn from_field_value(value: FieldValue) -> Result<Self, String> {
        match value {
            FieldValue::Map(entries) => entries
                .into_iter()
                .map(|(k, v)| T::from_field_value(v).map(|v| (k, v)))
                .collect(),
            FieldValue::Null => Ok(HashMap::new()),
            other => Err(mismatch("map", &other)),
        }
    }
}

impl<T: Coerce> Coerce for BTreeMap<String, T> {
    fn field_type() -> FieldType {
        FieldType::Map(Box::new(T::field_type()))
    }

    fn from_field_value(value: FieldValue) -> Result<Self, String> {
        match value {
            FieldValue::Map(entries) => entries
                .into_iter()
                .map(|(k, v)| T::from_field_value(v).map(|v| (k, v)))
                .collect(),
            FieldValue::Null => Ok(BTreeMap::new()),
            other => Err(mismatch("map", &other)),
        }
    }
}

impl Coerce for Value {
    fn field_type() -> FieldType {
        FieldType::Raw
    }

    fn from_field_value(value: FieldValue) -> Result<Self, String> {
        match value {
            FieldValue::Raw(v) => Ok(v),
            FieldValue::Null => Ok(Value::Null),
            other => Err(mismatch("document", &other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_zero() {
        assert!(FieldValue::Null.is_zero());
        assert!(FieldValue::String(String::new()).is_zero());
        assert!(FieldValue::Int(0).is_zero());
        assert!(FieldValue::Sequence(vec![]).is_zero());
        assert!(!FieldValue::String("x".into()).is_zero());
        assert!(!FieldValue::Float(0.5).is_zero());

        let mut record = Record::new();
        record.insert("a", FieldValue::Int(0));
        record.insert("b", FieldValue::String(String::new()));
        assert!(FieldValue::Record(record.clone()).is_zero());
        record.insert("b", FieldValue::String("set".into()));
        assert!(!FieldValue::Record(record).is_zero());
    }

    #[test]
    fn test_len_counts_characters() {
        assert_eq!(FieldValue::String("héllo".into()).len(), Some(5));
        assert_eq!(FieldValue::Int(3).len(), None);
    }

    #[test]
    fn test_narrow_integer_overflow() {
        assert_eq!(u8::from_field_value(FieldValue::UInt(255)), Ok(255));
        assert!(u8::from_field_value(FieldValue::UInt(256)).is_err());
        assert!(i8::from_field_value(FieldValue::Int(-129)).is_err());
    }

    #[test]
    fn test_array_length_mismatch() {
        let value = FieldValue::Sequence(vec![FieldValue::Int(1), FieldValue::Int(2)]);
        assert_eq!(<[i32; 2]>::from_field_value(value.clone()), Ok([1, 2]));
        let err = <[i32; 3]>::from_field_value(value).unwrap_err();
        assert!(err.contains("length 3"));
    }

    #[test]
    fn test_array_from_null_is_zero_filled() {
        assert_eq!(<[i32; 2]>::from_field_value(FieldValue::Null), Ok([0, 0]));
        assert_eq!(
            <[String; 1]>::from_field_value(FieldValue::Null),
            Ok([String::new()])
        );
    }

    #[test]
    fn test_narrow_float_overflow() {
        let err = f32::from_field_value(FieldValue::Float(1e300)).unwrap_err();
        assert!(err.contains("overflows f32"));
        assert_eq!(f32::from_field_value(FieldValue::Float(1.5)), Ok(1.5));
        assert_eq!(f64::from_field_value(FieldValue::Float(1e300)), Ok(1e300));
        assert!(
            f32::from_field_value(FieldValue::Float(f64::INFINITY))
                .unwrap()
                .is_infinite()
        );
    }

    #[test]
    fn test_box_forwards_to_inner() {
        assert_eq!(Box::<i64>::field_type(), FieldType::Int { bits: 64 });
        assert_eq!(
            Box::<i64>::from_field_value(FieldValue::Int(7)),
            Ok(Box::new(7))
        );
    }

    #[test]
    fn test_option_wraps_and_unwraps() {
        assert_eq!(Option::<String>::from_field_value(FieldValue::Null), Ok(None));
        assert_eq!(
            Option::<String>::from_field_value(FieldValue::String("x".into())),
            Ok(Some("x".to_string()))
        );
    }

    #[test]
    fn test_record_take_missing_field_uses_null() {
        let mut record = Record::new();
        record.insert("name", FieldValue::String("Ann".into()));
        assert_eq!(record.take::<String>("name").unwrap(), "Ann");
        assert_eq!(record.take::<Vec<i64>>("missing").unwrap(), Vec::<i64>::new());
        assert!(!record.take::<bool>("name").unwrap(), "taken fields convert from null");
    }

    #[test]
    fn test_record_take_reports_field_name() {
        let mut record = Record::new();
        record.insert("age", FieldValue::String("x".into()));
        let err = record.take::<i32>("age").unwrap_err();
        assert_eq!(err.field, "age");
        assert!(err.message.contains("expected integer"));
    }

    #[test]
    fn test_timestamp_conversions() {
        let t = DateTime::parse_from_rfc3339("2024-03-01T10:20:30+02:00").unwrap();
        let value = FieldValue::Timestamp(t);
        let utc = DateTime::<Utc>::from_field_value(value.clone()).unwrap();
        assert_eq!(utc.to_rfc3339(), "2024-03-01T08:20:30+00:00");
        let date = NaiveDate::from_field_value(value.clone()).unwrap();
        assert_eq!(date.to_string(), "2024-03-01");
        let time = NaiveTime::from_field_value(value).unwrap();
        assert_eq!(time.to_string(), "10:20:30");
    }

    #[test]
    fn test_serialize_field_value() {
        let mut record = Record::new();
        record.insert("n", FieldValue::Int(1));
        record.insert(
            "tags",
            FieldValue::Sequence(vec![FieldValue::String("a".into())]),
        );
        let json = serde_json::to_string(&FieldValue::Record(record)).unwrap();
        assert_eq!(json, r#"{"n":1,"tags":["a"]}"#);
    }
}
