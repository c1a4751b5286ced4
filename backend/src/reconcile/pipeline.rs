//! Fetch → reconcile → log, for one match or a batch of matches.
//!
//! ```text
//! ┌────────────────┐   ┌───────────────┐
//! │ DocumentSource │   │ RecordSource  │   fetched concurrently
//! └───────┬────────┘   └──────┬────────┘
//!         └────────┬──────────┘
//!                  ▼
//!          engine::reconcile            pure, synchronous
//!                  ▼
//!            MatchReport                logged summary + pairing warnings
//! ```

use futures::stream::{self, StreamExt};
use serde::Serialize;

use super::engine;
use crate::api::logs::{
    log_error_indent, log_info, log_info_indent, log_success_indent, log_warning_indent,
};
use crate::error::PipelineResult;
use crate::mapping::MappingConfig;
use crate::report::ReconciliationReport;
use crate::sources::{DocumentSource, RecordSource};

/// Default number of matches reconciled at the same time.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Report of one match.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchReport {
    pub match_id: i64,
    pub report: ReconciliationReport,
}

/// A match whose reconciliation failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchFailure {
    pub match_id: i64,
    pub error: String,
}

/// Result of a batch run, in input order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchOutcome {
    pub reports: Vec<MatchReport>,
    pub failures: Vec<MatchFailure>,
}

impl BatchOutcome {
    /// No match failed.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Every match succeeded and every report is fully matched.
    pub fn all_matched(&self) -> bool {
        self.is_success() && self.reports.iter().all(|r| r.report.all_matched())
    }
}

/// Reconcile one match.
///
/// Both inputs are fetched concurrently; if either fetch fails the engine
/// is not run.
pub async fn reconcile_match<D, R>(
    match_id: i64,
    documents: &D,
    records: &R,
    mappings: &MappingConfig,
) -> PipelineResult<MatchReport>
where
    D: DocumentSource,
    R: RecordSource,
{
    log_info(format!("Match {}: fetching document and records", match_id));

    let (document, flat) = tokio::join!(
        documents.fetch_document(match_id),
        records.fetch_records(match_id)
    );
    let document = document?;
    let flat = flat?;
    log_info_indent(format!("{} roster rows", flat.roster.len()), 1);

    let report = engine::reconcile(&flat, &document, mappings)?;

    for failure in &report.pairing_failures {
        log_warning_indent(format!("Unpaired {}", failure), 1);
    }

    let summary = report.summary();
    if report.all_matched() {
        log_success_indent(format!("Match {}: {}", match_id, summary), 1);
    } else {
        log_warning_indent(format!("Match {}: {}", match_id, summary), 1);
    }

    Ok(MatchReport { match_id, report })
}

/// Reconcile many matches, at most `concurrency` at a time.
///
/// A failing match is logged and recorded; the others still run.
pub async fn reconcile_batch<D, R>(
    match_ids: &[i64],
    documents: &D,
    records: &R,
    mappings: &MappingConfig,
    concurrency: usize,
) -> BatchOutcome
where
    D: DocumentSource,
    R: RecordSource,
{
    let results: Vec<_> = stream::iter(match_ids.iter().copied())
        .map(|match_id| async move {
            let result = reconcile_match(match_id, documents, records, mappings).await;
            (match_id, result)
        })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let mut outcome = BatchOutcome::default();
    for (match_id, result) in results {
        match result {
            Ok(report) => outcome.reports.push(report),
            Err(e) => {
                log_error_indent(format!("Match {}: {}", match_id, e), 1);
                outcome.failures.push(MatchFailure {
                    match_id,
                    error: e.to_string(),
                });
            }
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{SourceError, SourceResult};
    use crate::models::{FlatRecord, FlatRecordSet};
    use serde_json::{json, Value};

    struct Fixture;

    impl DocumentSource for Fixture {
        async fn fetch_document(&self, match_id: i64) -> SourceResult<Value> {
            match match_id {
                1 | 2 => Ok(json!({
                    "season": { "name": "Premier League 2020/2021" },
                    "homeTeam": { "players": [{ "shirtNumber": 7 }] },
                    "awayTeam": { "players": [] }
                })),
                _ => Err(SourceError::NotFound(format!("{}.json", match_id))),
            }
        }
    }

    impl RecordSource for Fixture {
        async fn fetch_records(&self, match_id: i64) -> SourceResult<FlatRecordSet> {
            if match_id == 2 {
                return Err(SourceError::NoRecords(2));
            }
            let row = FlatRecord::new()
                .with("SEASON_NAME", "Premier League 2020/2021")
                .with("IS_HOME", 1)
                .with("SHIRT_NUMBER", 7);
            FlatRecordSet::from_rows(vec![row]).ok_or(SourceError::NoRecords(match_id))
        }
    }

    fn mappings() -> MappingConfig {
        MappingConfig::from_value(json!({
            "match_fields": [{ "source": "SEASON_NAME", "target": "season.name" }],
            "roster_fields": [{ "source": "SHIRT_NUMBER", "target": "shirtNumber" }]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_reconcile_match() {
        let report = reconcile_match(1, &Fixture, &Fixture, &mappings()).await.unwrap();
        assert_eq!(report.match_id, 1);
        assert_eq!(report.report.rows.len(), 2);
        assert!(report.report.all_matched());
    }

    #[tokio::test]
    async fn test_collaborator_failure_aborts_match() {
        let err = reconcile_match(2, &Fixture, &Fixture, &mappings()).await.unwrap_err();
        assert!(err.to_string().contains("No records for match 2"));
    }

    #[tokio::test]
    async fn test_batch_isolates_failures_and_keeps_order() {
        let outcome = reconcile_batch(&[3, 1, 2, 1], &Fixture, &Fixture, &mappings(), 2).await;

        assert_eq!(
            outcome.reports.iter().map(|r| r.match_id).collect::<Vec<_>>(),
            vec![1, 1]
        );
        assert_eq!(
            outcome.failures.iter().map(|f| f.match_id).collect::<Vec<_>>(),
            vec![3, 2]
        );
        assert!(!outcome.is_success());
    }
}
