//! Result caching
//!
//! Parsing is a pure function of the input bytes, the format and the
//! target type, so a parsed record can be cached under a key derived from
//! those three. [`parse_cached`] checks a [`ResultCache`] before handing the
//! bytes to the engine and stores successful results afterwards.

use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;

use crate::engine::Engine;
use crate::error::Result;
use crate::format::{self, Format};
use crate::schema::Schema;

/// Identifies one parse result
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    digest: String,
    format: Format,
    type_name: &'static str,
}

impl CacheKey {
    /// Key for parsing `input` as `format` into `T`
    pub fn new<T: Schema>(input: &[u8], format: Format) -> Self {
        Self {
            digest: hex::encode(Sha256::digest(input)),
            format,
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Hex SHA-256 of the input
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Input format
    pub fn format(&self) -> Format {
        self.format
    }

    /// Target type name
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.type_name, self.format, self.digest)
    }
}

/// Store of parsed records
pub trait ResultCache<T> {
    /// Cached record, if any
    fn get(&self, key: &CacheKey) -> Option<T>;

    /// Store a record
    fn put(&self, key: CacheKey, value: T);
}

/// Unbounded in-process [`ResultCache`]
#[derive(Debug)]
pub struct MemoryCache<T> {
    entries: Mutex<HashMap<CacheKey, T>>,
}

impl<T> MemoryCache<T> {
    /// Empty cache
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// True when nothing is stored
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl<T> Default for MemoryCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> ResultCache<T> for MemoryCache<T> {
    fn get(&self, key: &CacheKey) -> Option<T> {
        self.entries.lock().get(key).cloned()
    }

    fn put(&self, key: CacheKey, value: T) {
        self.entries.lock().insert(key, value);
    }
}

/// Parse through `cache`: a hit skips the engine entirely, a successful
/// miss is stored. Errors are never cached.
pub fn parse_cached<T, C>(
    engine: &Engine,
    cache: &C,
    input: &[u8],
    format: Option<Format>,
) -> Result<T>
where
    T: Schema + Clone,
    C: ResultCache<T> + ?Sized,
{
    engine.check_size(input)?;
    let format = format.unwrap_or_else(|| format::detect(input));
    let key = CacheKey::new::<T>(input, format);
    if let Some(hit) = cache.get(&key) {
        tracing::trace!(key = %key, "result cache hit");
        return Ok(hit);
    }

    let value: T = engine.parse(input, Some(format))?;
    tracing::trace!(key = %key, "result cache miss");
    cache.put(key, value.clone());
    Ok(value)
}
