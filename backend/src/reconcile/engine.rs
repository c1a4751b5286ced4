//! Reconciliation engine
//!
//! Runs the mapping tables of a [`MappingConfig`] over one record set and
//! one document and produces a [`ReconciliationReport`]. Pure and
//! synchronous: no I/O, no logging, no state kept between calls.

use serde_json::Value;

use super::roster::{self, Pairing};
use crate::error::ReconcileResult;
use crate::mapping::{FieldMapping, MappingConfig};
use crate::models::{FlatRecord, FlatRecordSet, RowScope, Side};
use crate::path::ResolutionFailure;
use crate::report::{ComparisonResult, ReconciliationReport};

/// Reconcile one match.
///
/// # Arguments
/// * `flat` - The relational rows of the match
/// * `document` - The nested document of the same match
/// * `mappings` - Mapping tables and roster keys
///
/// # Returns
/// Rows in order: match mappings, then home roster, then away roster.
/// Unresolvable paths become non-matching rows; unpaired roster rows are
/// listed in [`ReconciliationReport::pairing_failures`].
///
/// # Errors
/// A flat row lacking a mapped field (or an unreadable side value) is a
/// contract violation and fails the whole call.
pub fn reconcile(
    flat: &FlatRecordSet,
    document: &Value,
    mappings: &MappingConfig,
) -> ReconcileResult<ReconciliationReport> {
    let mut report = ReconciliationReport::new();

    for mapping in &mappings.match_fields {
        let row = compare_field(
            mapping,
            &flat.match_record,
            RowScope::Match,
            document,
            mapping.target.to_string(),
        )?;
        report.push(row);
    }

    let keys = &mappings.roster;
    for side in Side::ALL {
        let entries = roster::roster_entries(document, side, keys);
        let pairings = roster::pair(&flat.roster, &entries, side, keys)?;

        for Pairing { row_index, row, outcome, .. } in pairings {
            let paired = match outcome {
                Ok(paired) => paired,
                Err(failure) => {
                    report.pairing_failures.push(failure);
                    continue;
                }
            };

            let prefix = keys.entry_prefix(side, paired.index);
            for mapping in &mappings.roster_fields {
                let result = compare_field(
                    mapping,
                    row,
                    RowScope::Roster { side, row_index },
                    paired.entry,
                    mapping.target.qualified(&prefix),
                )?;
                report.push(result.with_flat_row(row_index));
            }
        }
    }

    Ok(report)
}

/// Compare one flat field against one document path.
///
/// `label` is the path as reported (qualified for roster entries).
fn compare_field(
    mapping: &FieldMapping,
    record: &FlatRecord,
    scope: RowScope,
    node: &Value,
    label: String,
) -> ReconcileResult<ComparisonResult> {
    let source_value = mapping.normalize_source(record.require(&mapping.source, scope)?);

    let target_value = mapping
        .target
        .resolve(node)
        .map(|value| mapping.normalize_target(value))
        .map_err(|failure| ResolutionFailure {
            path: label.clone(),
            reason: failure.reason,
        });

    Ok(ComparisonResult::new(
        mapping.source.clone(),
        label,
        source_value,
        target_value.into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReconcileError;
    use crate::mapping::Operation;
    use crate::path::FieldPath;
    use crate::report::FieldValue;
    use serde_json::json;

    fn path(raw: &str) -> FieldPath {
        FieldPath::parse(raw).unwrap()
    }

    fn config() -> MappingConfig {
        MappingConfig {
            version: "1.0".into(),
            description: String::new(),
            match_fields: vec![
                FieldMapping::new("SEASON_NAME", path("season.name")),
                FieldMapping::new("HOME_TEAM_ID", path("homeTeam.sourceReferences[0].sourceValue")),
            ],
            roster_fields: vec![
                FieldMapping::new("SHIRT_NUMBER", path("shirtNumber")),
                FieldMapping::new("MINUTES_PLAYED", path("minutesPlayed")),
            ],
            roster: Default::default(),
        }
    }

    fn document() -> Value {
        json!({
            "season": { "name": "Premier League 2020/2021" },
            "homeTeam": {
                "sourceReferences": [{ "sourceValue": "6698" }],
                "players": [
                    { "shirtNumber": 1, "minutesPlayed": 90 },
                    { "shirtNumber": 7, "minutesPlayed": 84 }
                ]
            },
            "awayTeam": {
                "players": [{ "shirtNumber": 4, "minutesPlayed": 90 }]
            }
        })
    }

    fn row(is_home: i64, shirt: i64, minutes: i64) -> FlatRecord {
        FlatRecord::new()
            .with("SEASON_NAME", "Premier League 2020/2021")
            .with("HOME_TEAM_ID", 6698)
            .with("IS_HOME", is_home)
            .with("SHIRT_NUMBER", shirt)
            .with("MINUTES_PLAYED", minutes)
    }

    #[test]
    fn test_row_order_and_qualified_paths() {
        // away row listed first: home rows still come first in the report
        let flat = FlatRecordSet::from_rows(vec![row(0, 4, 90), row(1, 7, 84)]).unwrap();
        let report = reconcile(&flat, &document(), &config()).unwrap();

        let paths: Vec<&str> = report.rows.iter().map(|r| r.target_path()).collect();
        assert_eq!(
            paths,
            vec![
                "season.name",
                "homeTeam.sourceReferences[0].sourceValue",
                "homeTeam.players[1].shirtNumber",
                "homeTeam.players[1].minutesPlayed",
                "awayTeam.players[0].shirtNumber",
                "awayTeam.players[0].minutesPlayed",
            ]
        );
        assert!(report.all_matched());
    }

    #[test]
    fn test_unresolved_path_is_a_mismatch_row() {
        let mut config = config();
        config.match_fields.push(FieldMapping::new("SEASON_NAME", path("season.title")));
        let flat = FlatRecordSet::from_rows(vec![row(1, 7, 84)]).unwrap();

        let report = reconcile(&flat, &document(), &config).unwrap();
        let row = &report.rows[2];
        assert!(!row.matched());
        match row.target_value() {
            FieldValue::Unresolved { reason } => assert_eq!(reason.path, "season.title"),
            other => panic!("expected unresolved, got {:?}", other),
        }
    }

    #[test]
    fn test_unresolved_roster_path_is_qualified() {
        let mut config = config();
        config.roster_fields.push(FieldMapping::new("SHIRT_NUMBER", path("stats.goals")));
        let flat = FlatRecordSet::from_rows(vec![row(1, 7, 84)]).unwrap();

        let report = reconcile(&flat, &document(), &config).unwrap();
        let last = report.rows.last().unwrap();
        match last.target_value() {
            FieldValue::Unresolved { reason } => {
                assert_eq!(reason.path, "homeTeam.players[1].stats.goals")
            }
            other => panic!("expected unresolved, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_flat_field_is_fatal() {
        let flat = FlatRecordSet::from_rows(vec![FlatRecord::new().with("SEASON_NAME", "x")]).unwrap();
        let err = reconcile(&flat, &document(), &config()).unwrap_err();
        assert_eq!(
            err,
            ReconcileError::MissingField {
                field: "HOME_TEAM_ID".into(),
                scope: RowScope::Match,
            }
        );
    }

    #[test]
    fn test_normalization_applies_per_side() {
        let mut config = config();
        config.match_fields = vec![FieldMapping::new("SEASON_NAME", path("season.name"))
            .with_source_op(Operation::Uppercase)
            .with_target_op(Operation::Uppercase)];
        let mut record = row(1, 7, 84);
        record.insert("SEASON_NAME", json!("premier league 2020/2021"));
        let flat = FlatRecordSet::from_rows(vec![record]).unwrap();

        let report = reconcile(&flat, &document(), &config).unwrap();
        assert!(report.rows[0].matched());
        assert_eq!(report.rows[0].source_value(), &json!("PREMIER LEAGUE 2020/2021"));
    }

    #[test]
    fn test_roster_rows_carry_their_flat_row() {
        let flat = FlatRecordSet::from_rows(vec![row(0, 4, 90), row(1, 7, 84)]).unwrap();
        let report = reconcile(&flat, &document(), &config()).unwrap();

        let flat_rows: Vec<Option<usize>> = report.rows.iter().map(|r| r.flat_row()).collect();
        assert_eq!(flat_rows, vec![None, None, Some(1), Some(1), Some(0), Some(0)]);
    }

    #[test]
    fn test_unpaired_rows_produce_no_rows() {
        let flat = FlatRecordSet::from_rows(vec![row(1, 99, 90)]).unwrap();
        let report = reconcile(&flat, &document(), &config()).unwrap();

        assert_eq!(report.rows.len(), 2);
        assert_eq!(report.pairing_failures.len(), 1);
        assert_eq!(report.pairing_failures[0].shirt_number, json!(99));
    }
}
