//! Error types for the matchrecon reconciliation pipeline.
//!
//! This module defines the error hierarchy, from the innermost layer out:
//!
//! - [`PathParseError`] - Malformed document paths in a mapping table
//! - [`ConfigError`] - Mapping tables and property files
//! - [`ReconcileError`] - Contract violations detected by the engine
//! - [`SourceError`] - Document / record collaborators (API, database, files)
//! - [`SinkError`] - Report export
//! - [`PipelineError`] - Top-level orchestration errors
//!
//! Unresolvable paths and unpaired roster rows are *not* errors: they are
//! recorded in the report (see [`crate::path::ResolutionFailure`] and
//! [`crate::reconcile::roster::PairingFailure`]).
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use std::path::PathBuf;
use thiserror::Error;

use crate::models::RowScope;
use crate::parser::CsvError;

// =============================================================================
// Path Errors
// =============================================================================

/// A document path that cannot be parsed into segments.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathParseError {
    /// The path string is empty.
    #[error("path is empty")]
    Empty,

    /// Two dots in a row, or a leading/trailing dot.
    #[error("path '{path}' has an empty segment")]
    EmptySegment { path: String },

    /// A segment that is neither `key` nor `key[index]`.
    #[error("path '{path}': invalid segment '{segment}'")]
    InvalidSegment { path: String, segment: String },
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors while loading mapping tables or property files.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a file.
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON syntax or shape error.
    #[error("Invalid JSON in {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// Invalid document path in a mapping.
    #[error("Invalid mapping path: {0}")]
    Path(#[from] PathParseError),

    /// A mapping table has no entries.
    #[error("Mapping table '{0}' is empty")]
    EmptyTable(&'static str),

    /// A mapping has an empty source field name.
    #[error("Mapping table '{table}' has an entry with an empty source field")]
    EmptySourceField { table: &'static str },

    /// The same (source, target) pair is declared twice in one table.
    #[error("Mapping table '{table}' declares {source_field} -> {target} twice")]
    DuplicateMapping {
        table: &'static str,
        source_field: String,
        target: String,
    },

    /// A normalization operation carries an invalid regex.
    #[error("Invalid regex '{pattern}' on mapping '{source_field}': {message}")]
    InvalidPattern {
        source_field: String,
        pattern: String,
        message: String,
    },

    /// A required setting is absent.
    #[error("Missing setting: {0}")]
    MissingSetting(String),
}

// =============================================================================
// Reconciliation Errors
// =============================================================================

/// Contract violations: the flat records do not carry what the mapping
/// tables declare. Fatal for the reconciliation of that match.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReconcileError {
    /// A mapped field is absent from a flat row.
    #[error("{scope}: missing field '{field}'")]
    MissingField { field: String, scope: RowScope },

    /// The side attribute of a roster row is neither home nor away.
    #[error("roster row {row_index}: field '{field}' has unrecognised side value '{value}'")]
    InvalidSide {
        field: String,
        value: String,
        row_index: usize,
    },
}

// =============================================================================
// Collaborator Errors
// =============================================================================

/// Failures of the document or record collaborators.
///
/// Any of these means the input is absent; the engine is never run on a
/// partial input.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Token request failed or the service rejected the bearer token.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Transport-level HTTP failure.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Non-success HTTP status.
    #[error("Unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    /// Response was not JSON.
    #[error("Unexpected content type '{0}'")]
    ContentType(String),

    /// Body could not be parsed, or is not a JSON object.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// No document or export exists for the match.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The record source returned zero rows for the match.
    #[error("No records for match {0}")]
    NoRecords(i64),

    /// A record row is not a field map.
    #[error("Record row {0} is not an object")]
    InvalidRecord(usize),

    /// Database connectivity or query failure.
    #[error("Database error: {0}")]
    Database(String),

    /// A mapped result column of a type the record source cannot map to a scalar.
    #[error("Column '{column}' has unsupported type {type_name}")]
    UnsupportedColumn { column: String, type_name: String },

    /// An export lacks columns the mapping tables read.
    #[error("Match {match_id}: missing columns {}", columns.join(", "))]
    MissingColumns { match_id: i64, columns: Vec<String> },

    /// CSV export could not be parsed.
    #[error("CSV error: {0}")]
    Csv(#[from] CsvError),

    /// File IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Sink Errors
// =============================================================================

/// Errors while exporting reports.
#[derive(Debug, Error)]
pub enum SinkError {
    /// IO error.
    #[error("Report IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV writer error.
    #[error("Report CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error.
    #[error("Report JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level error of one match reconciliation.
///
/// This is the error type returned by [`crate::reconcile::pipeline::reconcile_match`].
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Document or record source unavailable.
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Mapping/schema mismatch.
    #[error("Reconcile error: {0}")]
    Reconcile(#[from] ReconcileError),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Report export error.
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Pipeline error.
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for engine operations.
pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// Result type for collaborator operations.
pub type SourceResult<T> = Result<T, SourceError>;

/// Result type for report export.
pub type SinkResult<T> = Result<T, SinkError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Side;

    #[test]
    fn test_error_conversion_chain() {
        // SourceError -> PipelineError
        let source_err = SourceError::NoRecords(5034295);
        let pipeline_err: PipelineError = source_err.into();
        assert!(pipeline_err.to_string().contains("5034295"));

        // ReconcileError -> PipelineError
        let reconcile_err = ReconcileError::MissingField {
            field: "GENDER".into(),
            scope: RowScope::Match,
        };
        let pipeline_err: PipelineError = reconcile_err.into();
        assert!(pipeline_err.to_string().contains("GENDER"));
    }

    #[test]
    fn test_missing_field_names_the_row() {
        let err = ReconcileError::MissingField {
            field: "MINUTES_PLAYED".into(),
            scope: RowScope::Roster {
                side: Side::Away,
                row_index: 4,
            },
        };
        let msg = err.to_string();
        assert!(msg.contains("away roster row 4"));
        assert!(msg.contains("MINUTES_PLAYED"));
    }

    #[test]
    fn test_path_error_converts_to_config_error() {
        let err: ConfigError = PathParseError::EmptySegment {
            path: "season..name".into(),
        }
        .into();
        assert!(err.to_string().contains("season..name"));
    }
}
