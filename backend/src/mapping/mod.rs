//! Mapping tables: which flat field corresponds to which document path.
//!
//! A [`MappingConfig`] carries two ordered tables (match-level and
//! roster-level) plus the [`RosterKeys`] that tell the roster pairer where
//! sides, shirt numbers and player collections live. Tables are immutable
//! once loaded; declaration order is report order.

pub mod operations;

pub use operations::{operations_description, Operation};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;

use crate::error::{ConfigError, ConfigResult};
use crate::models::Side;
use crate::path::{FieldPath, PathSegment};

/// Built-in tables, embedded at compile time.
const DEFAULT_MAPPINGS: &str = include_str!("../../mappings/default.json");

/// One correspondence between a flat field and a document path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    /// Flat field name (relational column)
    pub source: String,

    /// Document path; relative to a roster entry for roster mappings
    pub target: FieldPath,

    /// Normalizations applied to the flat value before comparison
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_ops: Vec<Operation>,

    /// Normalizations applied to the document value before comparison
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_ops: Vec<Operation>,
}

impl FieldMapping {
    pub fn new(source: impl Into<String>, target: FieldPath) -> Self {
        Self {
            source: source.into(),
            target,
            source_ops: Vec::new(),
            target_ops: Vec::new(),
        }
    }

    pub fn with_source_op(mut self, op: Operation) -> Self {
        self.source_ops.push(op);
        self
    }

    pub fn with_target_op(mut self, op: Operation) -> Self {
        self.target_ops.push(op);
        self
    }

    /// Run the source-side operations in order.
    pub fn normalize_source(&self, value: &Value) -> Value {
        apply_all(&self.source_ops, value)
    }

    /// Run the target-side operations in order.
    pub fn normalize_target(&self, value: &Value) -> Value {
        apply_all(&self.target_ops, value)
    }

    fn operations(&self) -> impl Iterator<Item = &Operation> {
        self.source_ops.iter().chain(self.target_ops.iter())
    }
}

fn apply_all(ops: &[Operation], value: &Value) -> Value {
    ops.iter().fold(value.clone(), |acc, op| op.apply(&acc))
}

/// Where the roster pairer finds its keys, on both sides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterKeys {
    /// Flat field telling home from away
    #[serde(default = "default_side_field")]
    pub side_field: String,

    /// Flat field holding the shirt number
    #[serde(default = "default_shirt_field")]
    pub shirt_field: String,

    /// Shirt number path inside a document roster entry
    #[serde(default = "default_entry_shirt_path")]
    pub entry_shirt_path: FieldPath,

    /// Player collection under each team object
    #[serde(default = "default_players_field")]
    pub players_field: String,

    #[serde(default = "default_home_key")]
    pub home_key: String,

    #[serde(default = "default_away_key")]
    pub away_key: String,
}

fn default_side_field() -> String {
    "IS_HOME".to_string()
}

fn default_shirt_field() -> String {
    "SHIRT_NUMBER".to_string()
}

fn default_entry_shirt_path() -> FieldPath {
    FieldPath::from_key("shirtNumber")
}

fn default_players_field() -> String {
    "players".to_string()
}

fn default_home_key() -> String {
    "homeTeam".to_string()
}

fn default_away_key() -> String {
    "awayTeam".to_string()
}

impl Default for RosterKeys {
    fn default() -> Self {
        Self {
            side_field: default_side_field(),
            shirt_field: default_shirt_field(),
            entry_shirt_path: default_entry_shirt_path(),
            players_field: default_players_field(),
            home_key: default_home_key(),
            away_key: default_away_key(),
        }
    }
}

impl RosterKeys {
    /// Team object key for a side.
    pub fn side_key(&self, side: Side) -> &str {
        match side {
            Side::Home => &self.home_key,
            Side::Away => &self.away_key,
        }
    }

    /// Path of a side's roster collection, e.g. `homeTeam.players`.
    pub fn roster_path(&self, side: Side) -> FieldPath {
        FieldPath::from_segments(vec![
            PathSegment::Key(self.side_key(side).to_string()),
            PathSegment::Key(self.players_field.clone()),
        ])
    }

    /// Prefix that qualifies roster paths, e.g. `homeTeam.players[3]`.
    pub fn entry_prefix(&self, side: Side, entry_index: usize) -> String {
        format!("{}.{}[{}]", self.side_key(side), self.players_field, entry_index)
    }
}

/// The complete set of mapping tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingConfig {
    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default)]
    pub description: String,

    /// Match-level mappings, paths from the document root
    pub match_fields: Vec<FieldMapping>,

    /// Roster mappings, paths from a roster entry
    pub roster_fields: Vec<FieldMapping>,

    #[serde(default)]
    pub roster: RosterKeys,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self::builtin()
    }
}

impl MappingConfig {
    /// The built-in tables.
    pub fn builtin() -> Self {
        serde_json::from_str(DEFAULT_MAPPINGS).expect("Invalid embedded mapping table")
    }

    /// Parse and validate tables from a JSON string.
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(json).map_err(|source| ConfigError::Json {
            context: "mapping configuration".to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate tables from a JSON value.
    pub fn from_value(value: Value) -> ConfigResult<Self> {
        let config: Self = serde_json::from_value(value).map_err(|source| ConfigError::Json {
            context: "mapping configuration".to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate tables from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|source| ConfigError::Json {
            context: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Check table shape: non-empty, named sources, no duplicate pairs,
    /// compilable regex operations.
    pub fn validate(&self) -> ConfigResult<()> {
        validate_table("match_fields", &self.match_fields)?;
        validate_table("roster_fields", &self.roster_fields)?;

        if self.roster.side_field.is_empty() {
            return Err(ConfigError::MissingSetting("roster.side_field".to_string()));
        }
        if self.roster.shirt_field.is_empty() {
            return Err(ConfigError::MissingSetting("roster.shirt_field".to_string()));
        }
        Ok(())
    }

    /// Every flat field the tables read, in first-use order.
    pub fn source_fields(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.match_fields
            .iter()
            .chain(self.roster_fields.iter())
            .map(|m| m.source.as_str())
            .chain([self.roster.side_field.as_str(), self.roster.shirt_field.as_str()])
            .filter(|field| seen.insert(*field))
            .collect()
    }
}

fn validate_table(table: &'static str, mappings: &[FieldMapping]) -> ConfigResult<()> {
    if mappings.is_empty() {
        return Err(ConfigError::EmptyTable(table));
    }

    let mut seen = HashSet::new();
    for mapping in mappings {
        if mapping.source.trim().is_empty() {
            return Err(ConfigError::EmptySourceField { table });
        }
        if !seen.insert((mapping.source.as_str(), mapping.target.as_str())) {
            return Err(ConfigError::DuplicateMapping {
                table,
                source_field: mapping.source.clone(),
                target: mapping.target.to_string(),
            });
        }
        for pattern in mapping.operations().filter_map(Operation::pattern) {
            regex::Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
                source_field: mapping.source.clone(),
                pattern: pattern.to_string(),
                message: e.to_string(),
            })?;
        }
    }
    Ok(())
}
