//! Reconciliation report model.
//!
//! A report is an ordered list of [`ComparisonResult`] rows (match-level
//! rows first, then home roster, then away roster) plus the roster pairing
//! diagnostics, which are kept apart from the rows.

pub mod sink;

pub use sink::{CsvReportSink, JsonReportSink, ReportSink};

use serde::Serialize;
use serde_json::Value;
use std::fmt;

use crate::compare;
use crate::path::ResolutionFailure;
use crate::reconcile::roster::PairingFailure;

/// Document-side value of a comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// The path resolved to this scalar.
    Resolved(Value),
    /// The path could not be resolved in this document.
    Unresolved {
        #[serde(rename = "unresolved")]
        reason: ResolutionFailure,
    },
}

impl FieldValue {
    pub fn value(&self) -> Option<&Value> {
        match self {
            FieldValue::Resolved(value) => Some(value),
            FieldValue::Unresolved { .. } => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, FieldValue::Resolved(_))
    }
}

impl From<Result<Value, ResolutionFailure>> for FieldValue {
    fn from(result: Result<Value, ResolutionFailure>) -> Self {
        match result {
            Ok(value) => FieldValue::Resolved(value),
            Err(reason) => FieldValue::Unresolved { reason },
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Resolved(value) => f.write_str(&compare::display_value(value)),
            FieldValue::Unresolved { reason } => write!(f, "<unresolved: {}>", reason.reason),
        }
    }
}

/// One field-by-field comparison.
///
/// Both values are canonicalized on construction and `matched` is derived
/// from them there; the fields are read-only afterwards.
///
/// Roster rows also carry the index of the flat row they were read from,
/// since several flat rows may pair with the same document entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    source_field: String,
    target_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    flat_row: Option<usize>,
    source_value: Value,
    target_value: FieldValue,
    matched: bool,
}

impl ComparisonResult {
    pub fn new(
        source_field: impl Into<String>,
        target_path: impl Into<String>,
        source_value: Value,
        target_value: FieldValue,
    ) -> Self {
        let source_value = compare::canonicalize(&source_value);
        let target_value = match target_value {
            FieldValue::Resolved(value) => FieldValue::Resolved(compare::canonicalize(&value)),
            unresolved => unresolved,
        };
        let matched = target_value
            .value()
            .is_some_and(|target| compare::equal(&source_value, target));

        Self {
            source_field: source_field.into(),
            target_path: target_path.into(),
            flat_row: None,
            source_value,
            target_value,
            matched,
        }
    }

    /// Record the flat row a roster comparison was read from.
    pub fn with_flat_row(mut self, row_index: usize) -> Self {
        self.flat_row = Some(row_index);
        self
    }

    pub fn source_field(&self) -> &str {
        &self.source_field
    }

    pub fn target_path(&self) -> &str {
        &self.target_path
    }

    /// Flat row index; `None` for match-level rows.
    pub fn flat_row(&self) -> Option<usize> {
        self.flat_row
    }

    pub fn source_value(&self) -> &Value {
        &self.source_value
    }

    pub fn target_value(&self) -> &FieldValue {
        &self.target_value
    }

    pub fn matched(&self) -> bool {
        self.matched
    }
}

/// Counts over one report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub total: usize,
    pub matched: usize,
    pub mismatched: usize,
    /// Mismatches caused by an unresolvable path (subset of `mismatched`)
    pub unresolved: usize,
    pub pairing_failures: usize,
}

impl fmt::Display for ReportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} compared, {} matched, {} mismatched ({} unresolved), {} unpaired roster rows",
            self.total, self.matched, self.mismatched, self.unresolved, self.pairing_failures
        )
    }
}

/// Result of reconciling one match.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationReport {
    pub rows: Vec<ComparisonResult>,
    pub pairing_failures: Vec<PairingFailure>,
}

impl ReconciliationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, row: ComparisonResult) {
        self.rows.push(row);
    }

    pub fn summary(&self) -> ReportSummary {
        let matched = self.rows.iter().filter(|r| r.matched()).count();
        let unresolved = self
            .rows
            .iter()
            .filter(|r| !r.target_value().is_resolved())
            .count();

        ReportSummary {
            total: self.rows.len(),
            matched,
            mismatched: self.rows.len() - matched,
            unresolved,
            pairing_failures: self.pairing_failures.len(),
        }
    }

    pub fn mismatches(&self) -> impl Iterator<Item = &ComparisonResult> {
        self.rows.iter().filter(|r| !r.matched())
    }

    /// Every row matched and every roster row was paired.
    pub fn all_matched(&self) -> bool {
        self.pairing_failures.is_empty() && self.rows.iter().all(ComparisonResult::matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::FailureReason;
    use serde_json::json;

    fn unresolved(path: &str) -> FieldValue {
        FieldValue::Unresolved {
            reason: ResolutionFailure {
                path: path.to_string(),
                reason: FailureReason::MissingKey { key: "name".into() },
            },
        }
    }

    #[test]
    fn test_matched_is_derived_from_canonical_values() {
        let row = ComparisonResult::new(
            "KICKOFF_DATE",
            "kickOffDate",
            json!("2021-06-20 16:00:00.00"),
            FieldValue::Resolved(json!("2021-06-20T16:00:00")),
        );
        assert!(row.matched());
        assert_eq!(row.source_value(), &json!("2021-06-20T16:00:00"));

        let row = ComparisonResult::new("AREA_ID", "league.nation", json!(2072), FieldValue::Resolved(json!(2073)));
        assert!(!row.matched());
    }

    #[test]
    fn test_unresolved_never_matches() {
        let row = ComparisonResult::new("SEASON_NAME", "season.name", Value::Null, unresolved("season.name"));
        assert!(!row.matched());
        assert_eq!(row.target_value().to_string(), "<unresolved: key 'name' not found>");
    }

    #[test]
    fn test_summary_counts() {
        let mut report = ReconciliationReport::new();
        report.push(ComparisonResult::new("A", "a", json!(1), FieldValue::Resolved(json!(1.0))));
        report.push(ComparisonResult::new("B", "b", json!("x"), FieldValue::Resolved(json!("y"))));
        report.push(ComparisonResult::new("C", "c", json!("x"), unresolved("c")));

        let summary = report.summary();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.matched, 1);
        assert_eq!(summary.mismatched, 2);
        assert_eq!(summary.unresolved, 1);
        assert_eq!(report.mismatches().count(), 2);
        assert!(!report.all_matched());
    }

    #[test]
    fn test_row_json_shape() {
        let row = ComparisonResult::new("C", "season.name", json!("x"), unresolved("season.name"));
        let value = serde_json::to_value(&row).unwrap();
        assert_eq!(value["sourceField"], json!("C"));
        assert_eq!(value["matched"], json!(false));
        assert_eq!(value["targetValue"]["unresolved"]["reason"]["kind"], json!("missing_key"));

        let row = ComparisonResult::new("A", "a", json!(7), FieldValue::Resolved(json!(7)));
        assert_eq!(serde_json::to_value(&row).unwrap()["targetValue"], json!(7));
    }
}
