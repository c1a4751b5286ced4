//! Report export.
//!
//! A [`ReportSink`] receives one report per reconciled match and is
//! finished once at the end of a run.

use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::{ComparisonResult, ReconciliationReport, ReportSummary};
use crate::error::SinkResult;
use crate::reconcile::roster::PairingFailure;

/// CSV column headers. `DB Row` is empty for match-level rows.
pub const CSV_HEADERS: [&str; 7] = [
    "Match ID",
    "DB Column Name",
    "API Name",
    "DB Value",
    "API Value",
    "Match",
    "DB Row",
];

/// Destination for reconciliation reports.
pub trait ReportSink {
    /// Write the report of one match.
    fn write_report(&mut self, match_id: i64, report: &ReconciliationReport) -> SinkResult<()>;

    /// Flush everything; no writes may follow.
    fn finish(&mut self) -> SinkResult<()>;
}

// =============================================================================
// CSV
// =============================================================================

/// One CSV line per comparison row, all matches in one file.
pub struct CsvReportSink<W: Write> {
    writer: csv::Writer<W>,
    mismatches_only: bool,
}

impl CsvReportSink<BufWriter<File>> {
    /// Create (or truncate) a CSV report file.
    pub fn create(path: impl AsRef<Path>) -> SinkResult<Self> {
        let file = File::create(path)?;
        Self::new(BufWriter::new(file))
    }
}

impl<W: Write> CsvReportSink<W> {
    /// Wrap a writer and emit the header line.
    pub fn new(inner: W) -> SinkResult<Self> {
        let mut writer = csv::Writer::from_writer(inner);
        writer.write_record(CSV_HEADERS)?;
        Ok(Self {
            writer,
            mismatches_only: false,
        })
    }

    /// Only export rows that did not match.
    pub fn with_mismatches_only(mut self, mismatches_only: bool) -> Self {
        self.mismatches_only = mismatches_only;
        self
    }

    /// Flush and return the underlying writer.
    pub fn into_inner(mut self) -> SinkResult<W> {
        self.writer.flush()?;
        self.writer
            .into_inner()
            .map_err(|e| std::io::Error::new(e.error().kind(), e.error().to_string()).into())
    }

    fn write_row(&mut self, match_id: i64, row: &ComparisonResult) -> SinkResult<()> {
        self.writer.write_record([
            match_id.to_string(),
            row.source_field().to_string(),
            row.target_path().to_string(),
            crate::compare::display_value(row.source_value()),
            row.target_value().to_string(),
            if row.matched() { "True" } else { "False" }.to_string(),
            row.flat_row().map(|i| i.to_string()).unwrap_or_default(),
        ])?;
        Ok(())
    }
}

impl<W: Write> ReportSink for CsvReportSink<W> {
    fn write_report(&mut self, match_id: i64, report: &ReconciliationReport) -> SinkResult<()> {
        for row in &report.rows {
            if self.mismatches_only && row.matched() {
                continue;
            }
            self.write_row(match_id, row)?;
        }
        Ok(())
    }

    fn finish(&mut self) -> SinkResult<()> {
        self.writer.flush()?;
        Ok(())
    }
}

// =============================================================================
// JSON
// =============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonMatchEntry {
    match_id: i64,
    summary: ReportSummary,
    rows: Vec<ComparisonResult>,
    pairing_failures: Vec<PairingFailure>,
}

/// Collects every report and writes one JSON array on [`ReportSink::finish`].
pub struct JsonReportSink<W: Write> {
    writer: W,
    entries: Vec<JsonMatchEntry>,
    finished: bool,
}

impl JsonReportSink<BufWriter<File>> {
    pub fn create(path: impl AsRef<Path>) -> SinkResult<Self> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> JsonReportSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            entries: Vec::new(),
            finished: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ReportSink for JsonReportSink<W> {
    fn write_report(&mut self, match_id: i64, report: &ReconciliationReport) -> SinkResult<()> {
        self.entries.push(JsonMatchEntry {
            match_id,
            summary: report.summary(),
            rows: report.rows.clone(),
            pairing_failures: report.pairing_failures.clone(),
        });
        Ok(())
    }

    fn finish(&mut self) -> SinkResult<()> {
        if self.finished {
            return Ok(());
        }
        serde_json::to_writer_pretty(&mut self.writer, &self.entries)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        self.finished = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::FieldValue;
    use serde_json::{json, Value};

    fn report() -> ReconciliationReport {
        let mut report = ReconciliationReport::new();
        report.push(ComparisonResult::new(
            "SEASON_NAME",
            "season.name",
            json!("Premier League 2020/2021"),
            FieldValue::Resolved(json!("Premier League 2020/2021")),
        ));
        report.push(ComparisonResult::new(
            "GENDER",
            "league.gender",
            json!("M"),
            FieldValue::Resolved(json!("Male")),
        ));
        report
    }

    #[test]
    fn test_csv_sink_writes_header_and_rows() {
        let mut sink = CsvReportSink::new(Vec::new()).unwrap();
        sink.write_report(5034295, &report()).unwrap();
        sink.finish().unwrap();

        let out = String::from_utf8(sink.into_inner().unwrap()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "Match ID,DB Column Name,API Name,DB Value,API Value,Match,DB Row");
        assert_eq!(
            lines[1],
            "5034295,SEASON_NAME,season.name,Premier League 2020/2021,Premier League 2020/2021,True,"
        );
        assert_eq!(lines[2], "5034295,GENDER,league.gender,M,Male,False,");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_csv_sink_writes_flat_row_of_roster_rows() {
        let mut report = ReconciliationReport::new();
        report.push(
            ComparisonResult::new(
                "MINUTES_PLAYED",
                "homeTeam.players[0].minutesPlayed",
                json!(12),
                FieldValue::Resolved(json!(90)),
            )
            .with_flat_row(4),
        );

        let mut sink = CsvReportSink::new(Vec::new()).unwrap();
        sink.write_report(9, &report).unwrap();

        let out = String::from_utf8(sink.into_inner().unwrap()).unwrap();
        assert_eq!(
            out.lines().nth(1),
            Some("9,MINUTES_PLAYED,homeTeam.players[0].minutesPlayed,12,90,False,4")
        );
    }

    #[test]
    fn test_csv_sink_mismatches_only() {
        let mut sink = CsvReportSink::new(Vec::new()).unwrap().with_mismatches_only(true);
        sink.write_report(1, &report()).unwrap();

        let out = String::from_utf8(sink.into_inner().unwrap()).unwrap();
        assert_eq!(out.lines().count(), 2);
        assert!(out.contains("GENDER"));
    }

    #[test]
    fn test_csv_sink_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");
        let mut sink = CsvReportSink::create(&path).unwrap();
        sink.write_report(7, &report()).unwrap();
        sink.finish().unwrap();
        drop(sink);

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("Match ID,"));
        assert_eq!(content.lines().count(), 3);
    }

    #[test]
    fn test_json_sink_writes_array() {
        let mut sink = JsonReportSink::new(Vec::new());
        sink.write_report(1, &report()).unwrap();
        sink.write_report(2, &ReconciliationReport::new()).unwrap();
        sink.finish().unwrap();

        let value: Value = serde_json::from_slice(&sink.into_inner()).unwrap();
        let entries = value.as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["matchId"], json!(1));
        assert_eq!(entries[0]["summary"]["matched"], json!(1));
        assert_eq!(entries[1]["rows"], json!([]));
    }
}
