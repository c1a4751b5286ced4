//! Domain models for match reconciliation.
//!
//! - [`FlatRecord`] - One relational row, flattened to name → scalar
//! - [`FlatRecordSet`] - The match row plus every roster row of one match
//! - [`Side`] - Home or away
//! - [`RowScope`] - Which flat row a value came from (for error messages)

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::compare;
use crate::error::{ReconcileError, SourceError};

// =============================================================================
// Side
// =============================================================================

/// Side of a team in a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Home,
    Away,
}

impl Side {
    /// Reconciliation order: home roster before away roster.
    pub const ALL: [Side; 2] = [Side::Home, Side::Away];

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Home => "home",
            Side::Away => "away",
        }
    }

    /// Interpret a flat side attribute.
    ///
    /// Accepts `"home"` / `"away"` (any case), or an "is home" flag given
    /// as a boolean, a number, `"true"`/`"false"` or a numeric string
    /// (`"1"`, `"0"`, `"1.0"` from a float column export).
    pub fn from_flat_value(value: &Value) -> Option<Side> {
        let from_flag = |is_home: bool| if is_home { Side::Home } else { Side::Away };

        match value {
            Value::Bool(b) => Some(from_flag(*b)),
            Value::Number(n) => n.as_f64().map(|f| from_flag(f != 0.0)),
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "home" | "h" => Some(Side::Home),
                "away" | "a" => Some(Side::Away),
                "true" => Some(Side::Home),
                "false" => Some(Side::Away),
                _ => compare::as_number(value).map(|f| from_flag(f != 0.0)),
            },
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Row scope
// =============================================================================

/// Identifies the flat row a field was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowScope {
    /// The match-level row.
    Match,
    /// A roster row whose side is known.
    Roster { side: Side, row_index: usize },
    /// A roster row before its side is read.
    RosterRow { row_index: usize },
}

impl fmt::Display for RowScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowScope::Match => write!(f, "match record"),
            RowScope::Roster { side, row_index } => write!(f, "{} roster row {}", side, row_index),
            RowScope::RosterRow { row_index } => write!(f, "roster row {}", row_index),
        }
    }
}

// =============================================================================
// Flat records
// =============================================================================

/// One relational row: field name → scalar value.
///
/// Timestamps are carried as strings; they are canonicalized at comparison
/// time, not here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlatRecord {
    fields: Map<String, Value>,
}

impl FlatRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a JSON value; `None` unless it is an object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self { fields }),
            _ => None,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Look up a field the caller contractually expects to exist.
    pub fn require(&self, field: &str, scope: RowScope) -> Result<&Value, ReconcileError> {
        self.fields
            .get(field)
            .ok_or_else(|| ReconcileError::MissingField {
                field: field.to_string(),
                scope,
            })
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) {
        self.fields.insert(field.into(), value);
    }

    /// Builder-style insert.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value.into());
        self
    }
}

impl From<Map<String, Value>> for FlatRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

impl FromIterator<(String, Value)> for FlatRecord {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

/// All flat rows of one match.
///
/// The relational query joins match columns onto every roster row, so the
/// first row doubles as the match-level record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatRecordSet {
    pub match_record: FlatRecord,
    pub roster: Vec<FlatRecord>,
}

impl FlatRecordSet {
    pub fn new(match_record: FlatRecord, roster: Vec<FlatRecord>) -> Self {
        Self { match_record, roster }
    }

    /// Split joined rows into the match record and the roster.
    ///
    /// Returns `None` for an empty row set.
    pub fn from_rows(rows: Vec<FlatRecord>) -> Option<Self> {
        let match_record = rows.first()?.clone();
        Some(Self {
            match_record,
            roster: rows,
        })
    }

    /// Same as [`FlatRecordSet::from_rows`] for rows given as JSON objects.
    pub fn from_values(match_id: i64, rows: Vec<Value>) -> Result<Self, SourceError> {
        let records = rows
            .into_iter()
            .enumerate()
            .map(|(i, row)| FlatRecord::from_value(row).ok_or(SourceError::InvalidRecord(i)))
            .collect::<Result<Vec<_>, _>>()?;

        Self::from_rows(records).ok_or(SourceError::NoRecords(match_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_side_from_flag_and_name() {
        assert_eq!(Side::from_flat_value(&json!(1)), Some(Side::Home));
        assert_eq!(Side::from_flat_value(&json!(0)), Some(Side::Away));
        assert_eq!(Side::from_flat_value(&json!(true)), Some(Side::Home));
        assert_eq!(Side::from_flat_value(&json!("1")), Some(Side::Home));
        assert_eq!(Side::from_flat_value(&json!(" Away ")), Some(Side::Away));
        assert_eq!(Side::from_flat_value(&json!("HOME")), Some(Side::Home));
        assert_eq!(Side::from_flat_value(&json!("left")), None);
        assert_eq!(Side::from_flat_value(&Value::Null), None);
    }

    #[test]
    fn test_side_from_float_flag_string() {
        assert_eq!(Side::from_flat_value(&json!("1.0")), Some(Side::Home));
        assert_eq!(Side::from_flat_value(&json!("0.0")), Some(Side::Away));
        assert_eq!(Side::from_flat_value(&json!(1.0)), Side::from_flat_value(&json!("1.0")));
        assert_eq!(Side::from_flat_value(&json!("")), None);
        assert_eq!(Side::from_flat_value(&json!("NaN")), None);
    }

    #[test]
    fn test_record_set_from_rows() {
        let rows = vec![
            FlatRecord::new().with("MATCH_ID", 1).with("SHIRT_NUMBER", 7),
            FlatRecord::new().with("MATCH_ID", 1).with("SHIRT_NUMBER", 9),
        ];
        let set = FlatRecordSet::from_rows(rows).unwrap();
        assert_eq!(set.match_record.get("SHIRT_NUMBER"), Some(&json!(7)));
        assert_eq!(set.roster.len(), 2);

        assert!(FlatRecordSet::from_rows(Vec::new()).is_none());
    }

    #[test]
    fn test_record_set_from_values_rejects_non_objects() {
        let err = FlatRecordSet::from_values(3, vec![json!({"A": 1}), json!([1, 2])]).unwrap_err();
        assert!(matches!(err, SourceError::InvalidRecord(1)));

        let err = FlatRecordSet::from_values(3, Vec::new()).unwrap_err();
        assert!(matches!(err, SourceError::NoRecords(3)));
    }

    #[test]
    fn test_require_reports_scope() {
        let record = FlatRecord::new().with("GENDER", "M");
        assert_eq!(record.require("GENDER", RowScope::Match).unwrap(), &json!("M"));

        let err = record.require("AREA_ID", RowScope::Match).unwrap_err();
        assert!(err.to_string().contains("match record"));
    }
}
