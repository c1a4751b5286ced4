//! Dotted/indexed paths into nested documents.
//!
//! A path such as `homeTeam.sourceReferences[0].sourceValue` is parsed once
//! into typed [`PathSegment`]s and then resolved against any number of
//! documents without re-parsing.
//!
//! ```rust,ignore
//! use matchrecon::FieldPath;
//! use serde_json::json;
//!
//! let path: FieldPath = "homeTeam.sourceReferences[0].sourceValue".parse()?;
//! let doc = json!({ "homeTeam": { "sourceReferences": [{ "sourceValue": "6698" }] } });
//! assert_eq!(path.resolve(&doc)?, &json!("6698"));
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::error::PathParseError;

/// `key` or `key[index]`.
static SEGMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([^\[\]]+)(?:\[(\d+)\])?$").expect("valid segment regex"));

/// One step of a path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// Descend into a map by key.
    Key(String),
    /// Descend into a map by key, then into the resulting sequence by index.
    Indexed { key: String, index: usize },
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) => f.write_str(key),
            PathSegment::Indexed { key, index } => write!(f, "{}[{}]", key, index),
        }
    }
}

/// Why a path could not be resolved against a document.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    #[error("key '{key}' not found")]
    MissingKey { key: String },

    #[error("index {index} out of bounds for '{key}' (length {len})")]
    IndexOutOfBounds { key: String, index: usize, len: usize },

    #[error("expected a map before '{key}', found {found}")]
    NotAMap { key: String, found: &'static str },

    #[error("expected a sequence at '{key}', found {found}")]
    NotASequence { key: String, found: &'static str },

    #[error("resolved to {found}, not a scalar")]
    NotScalar { found: &'static str },
}

/// A path lookup that cannot be completed against a given document.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("cannot resolve '{path}': {reason}")]
pub struct ResolutionFailure {
    pub path: String,
    pub reason: FailureReason,
}

/// A parsed document path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    raw: String,
    segments: Vec<PathSegment>,
}

impl FieldPath {
    /// Parse a dotted path; each segment is `key` or `key[n]`.
    pub fn parse(raw: &str) -> Result<Self, PathParseError> {
        if raw.is_empty() {
            return Err(PathParseError::Empty);
        }

        let segments = raw
            .split('.')
            .map(|segment| parse_segment(raw, segment))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// Build a path from already-typed segments.
    pub fn from_segments(segments: Vec<PathSegment>) -> Self {
        let raw = segments
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(".");
        Self { raw, segments }
    }

    /// A single-key path.
    pub fn from_key(key: impl Into<String>) -> Self {
        Self::from_segments(vec![PathSegment::Key(key.into())])
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// This path under a prefix, e.g. `homeTeam.players[3].shirtNumber`.
    pub fn qualified(&self, prefix: &str) -> String {
        format!("{}.{}", prefix, self.raw)
    }

    /// Resolve to a scalar leaf (string, number, boolean or null).
    pub fn resolve<'a>(&self, document: &'a Value) -> Result<&'a Value, ResolutionFailure> {
        let value = self.lookup(document)?;
        if value.is_object() || value.is_array() {
            return Err(self.failure(FailureReason::NotScalar {
                found: value_kind(value),
            }));
        }
        Ok(value)
    }

    /// Resolve to any node, including maps and sequences.
    pub fn lookup<'a>(&self, document: &'a Value) -> Result<&'a Value, ResolutionFailure> {
        let mut current = document;

        for segment in &self.segments {
            current = match segment {
                PathSegment::Key(key) => self.descend(current, key)?,
                PathSegment::Indexed { key, index } => {
                    let node = self.descend(current, key)?;
                    let items = node.as_array().ok_or_else(|| {
                        self.failure(FailureReason::NotASequence {
                            key: key.clone(),
                            found: value_kind(node),
                        })
                    })?;
                    items.get(*index).ok_or_else(|| {
                        self.failure(FailureReason::IndexOutOfBounds {
                            key: key.clone(),
                            index: *index,
                            len: items.len(),
                        })
                    })?
                }
            };
        }

        Ok(current)
    }

    fn descend<'a>(&self, node: &'a Value, key: &str) -> Result<&'a Value, ResolutionFailure> {
        let map = node.as_object().ok_or_else(|| {
            self.failure(FailureReason::NotAMap {
                key: key.to_string(),
                found: value_kind(node),
            })
        })?;
        map.get(key).ok_or_else(|| {
            self.failure(FailureReason::MissingKey {
                key: key.to_string(),
            })
        })
    }

    fn failure(&self, reason: FailureReason) -> ResolutionFailure {
        ResolutionFailure {
            path: self.raw.clone(),
            reason,
        }
    }
}

fn parse_segment(raw: &str, segment: &str) -> Result<PathSegment, PathParseError> {
    if segment.is_empty() {
        return Err(PathParseError::EmptySegment {
            path: raw.to_string(),
        });
    }

    let invalid = || PathParseError::InvalidSegment {
        path: raw.to_string(),
        segment: segment.to_string(),
    };

    let caps = SEGMENT_RE.captures(segment).ok_or_else(invalid)?;
    let key = caps[1].to_string();

    match caps.get(2) {
        None => Ok(PathSegment::Key(key)),
        Some(index) => {
            let index = index.as_str().parse::<usize>().map_err(|_| invalid())?;
            Ok(PathSegment::Indexed { key, index })
        }
    }
}

/// Human-readable JSON kind, for failure messages.
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a map",
    }
}

impl FromStr for FieldPath {
    type Err = PathParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for FieldPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for FieldPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        FieldPath::parse(&raw).map_err(serde::de::Error::custom)
    }
}
