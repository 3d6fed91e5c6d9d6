//! Field metadata
//!
//! A [`FieldSpec`] is what a type declares about one field (usually via
//! `#[derive(Schema)]`); a [`FieldDescriptor`] is the cached, compiled form
//! with resolved source keys and instantiated rules.

use std::any::TypeId;
use std::fmt;

use super::Schema;
use crate::format::Format;
use crate::rules::ValidationRule;

/// Source key that excludes a field from parsing
pub const EXCLUDED_KEY: &str = "-";

/// Shape of a field's target type, driving coercion
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    /// Text
    String,
    /// Boolean
    Bool,
    /// Signed integer of the given width
    Int {
        /// Width in bits: 8, 16, 32 or 64
        bits: u32,
    },
    /// Unsigned integer of the given width
    UInt {
        /// Width in bits: 8, 16, 32 or 64
        bits: u32,
    },
    /// Floating point
    Float,
    /// Date, time, or date-time
    Timestamp,
    /// `Option<T>`
    Optional(Box<FieldType>),
    /// `Vec<T>`
    Sequence(Box<FieldType>),
    /// `[T; N]`
    Array(Box<FieldType>, usize),
    /// String-keyed map
    Map(Box<FieldType>),
    /// Nested record
    Record(RecordType),
    /// Generic document kept as decoded
    Raw,
}

impl FieldType {
    /// Field type of a nested record
    pub fn record<T: Schema>() -> Self {
        FieldType::Record(RecordType::of::<T>())
    }

    /// Short description used in error messages
    pub fn describe(&self) -> String {
        match self {
            FieldType::String => "string".to_string(),
            FieldType::Bool => "boolean".to_string(),
            FieldType::Int { bits } => format!("i{}", bits),
            FieldType::UInt { bits } => format!("u{}", bits),
            FieldType::Float => "float".to_string(),
            FieldType::Timestamp => "timestamp".to_string(),
            FieldType::Optional(inner) => format!("optional {}", inner.describe()),
            FieldType::Sequence(inner) => format!("sequence of {}", inner.describe()),
            FieldType::Array(inner, len) => format!("array of {} {}", len, inner.describe()),
            FieldType::Map(inner) => format!("map of {}", inner.describe()),
            FieldType::Record(record) => record.type_name.to_string(),
            FieldType::Raw => "document".to_string(),
        }
    }
}

/// Handle to a nested record type; its schema is resolved lazily through
/// the cache so recursive types never recurse while describing themselves.
#[derive(Clone, Copy)]
pub struct RecordType {
    /// Identity used as the cache key
    pub type_id: TypeId,
    /// Rust type name, for messages and cache keys
    pub type_name: &'static str,
    /// Declared fields of the type
    pub fields: fn() -> Vec<FieldSpec>,
}

impl RecordType {
    /// Handle for `T`
    pub fn of<T: Schema>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            fields: T::fields,
        }
    }
}

impl PartialEq for RecordType {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl fmt::Debug for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordType")
            .field("type_name", &self.type_name)
            .finish()
    }
}

/// A field as declared by its type
#[derive(Debug, Clone)]
pub struct FieldSpec {
    /// Rust field name
    pub name: &'static str,
    /// Explicit JSON key
    pub json: Option<&'static str>,
    /// Explicit YAML key
    pub yaml: Option<&'static str>,
    /// Validation tag, e.g. `required,min=3`
    pub validate: &'static str,
    /// Target shape
    pub ty: FieldType,
}

impl FieldSpec {
    /// Field with no explicit keys and no rules
    pub fn new(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            json: None,
            yaml: None,
            validate: "",
            ty,
        }
    }

    /// Set the JSON key
    pub fn json(mut self, key: &'static str) -> Self {
        self.json = Some(key);
        self
    }

    /// Set the YAML key
    pub fn yaml(mut self, key: &'static str) -> Self {
        self.yaml = Some(key);
        self
    }

    /// Set the validation tag
    pub fn validate(mut self, tag: &'static str) -> Self {
        self.validate = tag;
        self
    }
}

/// Compiled, cached metadata for one field
#[derive(Debug)]
pub struct FieldDescriptor {
    name: &'static str,
    json_key: &'static str,
    yaml_key: &'static str,
    tag: &'static str,
    ty: FieldType,
    rules: Vec<ValidationRule>,
}

impl FieldDescriptor {
    pub(crate) fn new(spec: FieldSpec, rules: Vec<ValidationRule>) -> Self {
        let json_key = spec.json.unwrap_or(spec.name);
        let yaml_key = spec.yaml.or(spec.json).unwrap_or(spec.name);
        Self {
            name: spec.name,
            json_key,
            yaml_key,
            tag: spec.validate,
            ty: spec.ty,
            rules,
        }
    }

    /// Rust field name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Key read from JSON input
    pub fn json_key(&self) -> &'static str {
        self.json_key
    }

    /// Key read from YAML input (YAML key, else JSON key, else name)
    pub fn yaml_key(&self) -> &'static str {
        self.yaml_key
    }

    /// Key for `format`, or `None` when the field is excluded (`"-"`)
    pub fn source_key(&self, format: Format) -> Option<&'static str> {
        let key = match format {
            Format::Json => self.json_key,
            Format::Yaml => self.yaml_key,
        };
        (key != EXCLUDED_KEY).then_some(key)
    }

    /// Raw validation tag text
    pub fn tag(&self) -> &'static str {
        self.tag
    }

    /// Target shape
    pub fn ty(&self) -> &FieldType {
        &self.ty
    }

    /// Compiled validation rules, in tag order
    pub fn rules(&self) -> &[ValidationRule] {
        &self.rules
    }
}

/// Compiled, immutable metadata for one record type
#[derive(Debug)]
pub struct SchemaDescriptor {
    type_id: TypeId,
    type_name: &'static str,
    fields: Vec<FieldDescriptor>,
}

impl SchemaDescriptor {
    pub(crate) fn new(
        type_id: TypeId,
        type_name: &'static str,
        fields: Vec<FieldDescriptor>,
    ) -> Self {
        Self {
            type_id,
            type_name,
            fields,
        }
    }

    /// Identity of the described type
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Rust type name
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Fields in declaration order
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Look up a field by Rust name
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }
}
