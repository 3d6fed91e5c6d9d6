//! Parse engine
//!
//! An [`Engine`] turns raw bytes into a typed, validated record:
//!
//! 1. reject input over `max_input_size`
//! 2. detect the format (unless given) and decode a [`Value`] tree
//! 3. resolve the target's cached [`SchemaDescriptor`]
//! 4. pass 1: coerce every field, recording failures without stopping
//! 5. pass 2: run every field's rules against the fully coerced record
//! 6. return the record, or all collected errors as [`Error::Invalid`]
//!
//! Engines are cheap to clone, `Send + Sync`, and hold no per-parse state.

use std::sync::Arc;

use crate::error::{Error, ErrorList, ParseError, Result};
use crate::format::{self, Format};
use crate::schema::{Record, Schema, SchemaCache, SchemaDescriptor};
use crate::value::{Object, Value};
use crate::{ParseConfig, config, validate};

/// Parses documents into [`Schema`] types
#[derive(Debug, Clone)]
pub struct Engine {
    config: ParseConfig,
    cache: Arc<SchemaCache>,
}

impl Engine {
    /// Engine using the process-wide configuration and schema cache
    pub fn new() -> Self {
        Self::with_config(config::global())
    }

    /// Engine with explicit configuration.
    ///
    /// Lenient engines share [`SchemaCache::global`] and strict ones share
    /// [`SchemaCache::global_strict`], so descriptors compiled under one
    /// policy are never reused for the other.
    pub fn with_config(config: ParseConfig) -> Self {
        let cache = SchemaCache::shared(config.unknown_rules);
        Self { config, cache }
    }

    /// Engine with explicit configuration and schema cache, e.g. one whose
    /// registry carries custom rules
    pub fn with_cache(config: ParseConfig, cache: Arc<SchemaCache>) -> Self {
        Self { config, cache }
    }

    /// Active configuration
    pub fn config(&self) -> &ParseConfig {
        &self.config
    }

    /// Schema cache in use
    pub fn cache(&self) -> &SchemaCache {
        &self.cache
    }

    /// Compiled schema of `T`
    pub fn schema<T: Schema>(&self) -> Result<Arc<SchemaDescriptor>> {
        self.cache.descriptor::<T>()
    }

    /// Parse one record from `input`, detecting the format when `None`
    pub fn parse<T: Schema>(&self, input: &[u8], format: Option<Format>) -> Result<T> {
        let (value, format) = self.decode(input, format)?;
        self.parse_value(&value, format)
    }

    /// Parse a document whose root is an array of records
    pub fn parse_list<T: Schema>(&self, input: &[u8], format: Option<Format>) -> Result<Vec<T>> {
        let (value, format) = self.decode(input, format)?;
        let Value::Array(items) = &value else {
            return Err(Error::RootMismatch {
                expected: "array",
                found: value.kind(),
            });
        };

        let descriptor = self.schema::<T>()?;
        let session = self.session(format);
        let depth = session.enter(1, "")?;
        let mut records = Vec::with_capacity(items.len());
        let mut errors = ErrorList::new();
        for (i, item) in items.iter().enumerate() {
            let prefix = format!("[{}]", i);
            let Some(object) = item.as_object() else {
                errors.push(
                    ParseError::new(
                        prefix.clone(),
                        format!("expected object, found {}", item.kind()),
                    )
                    .with_value(item.clone()),
                );
                continue;
            };
            let (record, record_errors) = session.fill_record(&descriptor, object, &prefix, depth)?;
            errors.append(record_errors);
            records.push(record);
        }
        self.finish(&descriptor, errors)?;
        records
            .into_iter()
            .map(|record| T::from_record(record).map_err(|e| Error::Invalid(e.into())))
            .collect()
    }

    /// Parse one record from an already decoded tree; `format` selects the
    /// source keys
    pub fn parse_value<T: Schema>(&self, value: &Value, format: Format) -> Result<T> {
        let Some(object) = value.as_object() else {
            return Err(Error::RootMismatch {
                expected: "object",
                found: value.kind(),
            });
        };
        let descriptor = self.schema::<T>()?;
        let (record, errors) = self.session(format).fill_record(&descriptor, object, "", 1)?;
        self.finish(&descriptor, errors)?;
        T::from_record(record).map_err(|e| Error::Invalid(e.into()))
    }

    /// Reject `input` when it exceeds `max_input_size`
    pub(crate) fn check_size(&self, input: &[u8]) -> Result<()> {
        let limit = self.config.max_input_size;
        if limit > 0 && input.len() > limit {
            return Err(Error::InputTooLarge {
                size: input.len(),
                limit,
            });
        }
        Ok(())
    }

    fn decode(&self, input: &[u8], format: Option<Format>) -> Result<(Value, Format)> {
        self.check_size(input)?;
        let format = format.unwrap_or_else(|| format::detect(input));
        let value = format::decode(input, format)?;
        Ok((value, format))
    }

    fn session(&self, format: Format) -> Session<'_> {
        Session {
            cache: &self.cache,
            format,
            max_depth: self.config.max_depth,
        }
    }

    fn finish(&self, descriptor: &SchemaDescriptor, errors: ErrorList) -> Result<()> {
        if errors.is_empty() {
            return Ok(());
        }
        tracing::debug!(
            type_name = descriptor.type_name(),
            errors = errors.len(),
            "document rejected"
        );
        Err(Error::Invalid(errors))
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

/// State shared by every field of one parse call
pub(crate) struct Session<'a> {
    pub(crate) cache: &'a SchemaCache,
    pub(crate) format: Format,
    pub(crate) max_depth: usize,
}

impl Session<'_> {
    /// Depth of a container entered from `depth`, or the fatal limit error
    pub(crate) fn enter(&self, depth: usize, path: &str) -> Result<usize> {
        let depth = depth + 1;
        if self.max_depth > 0 && depth > self.max_depth {
            return Err(Error::DepthExceeded {
                limit: self.max_depth,
                path: path.to_string(),
            });
        }
        Ok(depth)
    }

    /// Run both passes for one record. Field errors come back alongside the
    /// record; `Err` is reserved for fatal conditions.
    pub(crate) fn fill_record(
        &self,
        descriptor: &SchemaDescriptor,
        object: &Object,
        prefix: &str,
        depth: usize,
    ) -> Result<(Record, ErrorList)> {
        let mut record = Record::new();
        let mut errors = ErrorList::new();

        for field in descriptor.fields() {
            let path = join_path(prefix, field.name());
            let raw = field
                .source_key(self.format)
                .and_then(|key| object.get(key));
            let value = match raw {
                Some(raw) => {
                    self.coerce(raw, field.ty(), field.name(), &path, depth, &mut errors)?
                }
                None => crate::coerce::zero(field.ty()),
            };
            record.insert(field.name(), value);
        }

        validate::validate_record(descriptor, &record, prefix, self.format, &mut errors);
        Ok((record, errors))
    }
}

/// `prefix.name`, or `name` at the root
pub(crate) fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}
