//! Input formats: detection and decoding
//!
//! [`detect`] classifies raw bytes with cheap structural heuristics over the
//! first few lines; [`decode`] turns bytes of a known format into a
//! [`Value`] tree. Decoding failures are fatal for the whole parse.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::value::Value;

/// Number of non-empty lines the detector looks at
const DETECT_LINES: usize = 5;

/// Supported input formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// JSON text
    Json,
    /// YAML text
    Yaml,
}

impl Format {
    /// Lowercase tag used in cache keys and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Yaml => "yaml",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Format::Json),
            "yaml" | "yml" => Ok(Format::Yaml),
            other => Err(format!("unsupported format '{}'", other)),
        }
    }
}

/// Guess the format of `input`.
///
/// Empty input and anything starting with `{` or `[` is JSON. Otherwise the
/// first five non-empty lines decide: a leading `---`, a `- ` list item, or
/// a majority of unquoted `key: value` lines means YAML. Everything else
/// falls back to JSON.
pub fn detect(input: &[u8]) -> Format {
    let Some(start) = input.iter().position(|b| !b.is_ascii_whitespace()) else {
        return Format::Json;
    };
    if matches!(input[start], b'{' | b'[') {
        return Format::Json;
    }

    let mut inspected = 0;
    let mut key_value_lines = 0;
    for line in input[start..]
        .split(|&b| b == b'\n')
        .map(<[u8]>::trim_ascii)
        .filter(|line| !line.is_empty())
        .take(DETECT_LINES)
    {
        if inspected == 0 && line.starts_with(b"---") {
            return Format::Yaml;
        }
        if line.starts_with(b"- ") {
            return Format::Yaml;
        }
        if is_key_value_line(line) {
            key_value_lines += 1;
        }
        inspected += 1;
    }

    if key_value_lines * 2 > inspected {
        Format::Yaml
    } else {
        Format::Json
    }
}

/// `key: value` with an unquoted key: the first colon is followed by a
/// space, a tab, or the end of the line, and not preceded by a quote.
fn is_key_value_line(line: &[u8]) -> bool {
    if matches!(line.first(), Some(b'"' | b'\'')) {
        return false;
    }
    let Some(colon) = line.iter().position(|&b| b == b':') else {
        return false;
    };
    if colon == 0 || matches!(line[colon - 1], b'"' | b'\'') {
        return false;
    }
    matches!(line.get(colon + 1), None | Some(b' ' | b'\t'))
}

/// Decode `input` as `format` into a generic document tree.
pub fn decode(input: &[u8], format: Format) -> Result<Value> {
    let value = match format {
        Format::Json => serde_json::from_slice(input).map_err(Error::Json)?,
        Format::Yaml => serde_yaml::from_slice(input).map_err(Error::Yaml)?,
    };
    tracing::trace!(%format, bytes = input.len(), "decoded document");
    Ok(value)
}
