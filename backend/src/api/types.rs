//! REST API request and response types.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::report::{ReconciliationReport, ReportSummary};

/// Body of `POST /api/reconcile`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileRequest {
    /// Echoed back in the response
    #[serde(default)]
    pub match_id: Option<i64>,

    /// Joined relational rows, first row carries the match columns
    pub records: Vec<Value>,

    /// The nested match document
    pub document: Value,

    /// Mapping configuration overriding the server's
    #[serde(default)]
    pub mappings: Option<Value>,
}

/// Response of `POST /api/reconcile`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileResponse {
    /// Unique report identifier
    pub report_id: String,

    pub match_id: Option<i64>,

    /// "matched" or "mismatched"
    pub status: String,

    pub summary: ReportSummary,

    pub report: ReconciliationReport,
}

impl ReconcileResponse {
    pub fn new(match_id: Option<i64>, report: ReconciliationReport) -> Self {
        let status = if report.all_matched() { "matched" } else { "mismatched" };
        Self {
            report_id: Uuid::new_v4().to_string(),
            match_id,
            status: status.to_string(),
            summary: report.summary(),
            report,
        }
    }
}

/// Create an error response
pub fn error_response(error: &str) -> Value {
    json!({
        "reportId": Uuid::new_v4().to_string(),
        "status": "error",
        "error": error,
        "report": null
    })
}
