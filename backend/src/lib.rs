//! # Matchrecon - match and roster reconciliation
//!
//! Matchrecon checks, field by field, that the relational copy of a football
//! match (one joined row per roster entry) agrees with the nested match
//! document served by the match API.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐                      ┌──────────────┐
//! │  Postgres / │──── FlatRecordSet ──▶│              │     ┌────────────┐
//! │  CSV export │                      │    Engine    │────▶│   Report   │
//! └─────────────┘                      │ (mapping +   │     │ (CSV/JSON) │
//! ┌─────────────┐                      │  pairing)    │     └────────────┘
//! │  Match API/ │──── document ───────▶│              │
//! │  JSON files │                      └──────────────┘
//! └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use matchrecon::{reconcile, FlatRecordSet, MappingConfig};
//!
//! let flat = FlatRecordSet::from_values(5034295, rows)?;
//! let report = reconcile(&flat, &document, &MappingConfig::builtin())?;
//! println!("{}", report.summary());
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Flat records and sides
//! - [`path`] - Document path parsing and resolution
//! - [`compare`] - Canonicalization and equality
//! - [`mapping`] - Mapping tables and normalization operations
//! - [`reconcile`] - Roster pairing, engine and batch pipeline
//! - [`report`] - Comparison rows and report sinks
//! - [`parser`] - CSV parsing with auto-detection
//! - [`sources`] - Match API, Postgres and file sources
//! - [`config`] - Property files per environment
//! - [`api`] - HTTP API server and log stream

// Core modules
pub mod error;
pub mod models;

// Resolution and comparison
pub mod path;
pub mod compare;

// Mapping tables
pub mod mapping;

// Reconciliation
pub mod reconcile;
pub mod report;

// Inputs
pub mod parser;
pub mod sources;
pub mod config;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigError,
    PathParseError,
    PipelineError,
    ReconcileError,
    ServerError,
    SinkError,
    SourceError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    FlatRecord,
    FlatRecordSet,
    RowScope,
    Side,
};

// =============================================================================
// Re-exports - Paths and comparison
// =============================================================================

pub use path::{FieldPath, FailureReason, ResolutionFailure};
pub use compare::{canonicalize, display_value, equal};

// =============================================================================
// Re-exports - Mapping
// =============================================================================

pub use mapping::{
    FieldMapping,
    MappingConfig,
    Operation,
    RosterKeys,
    operations_description,
};

// =============================================================================
// Re-exports - Engine and pipeline
// =============================================================================

pub use reconcile::{
    reconcile,
    reconcile_batch,
    reconcile_match,
    BatchOutcome,
    MatchFailure,
    MatchReport,
    PairingFailure,
    UnpairedReason,
};

pub use report::{
    ComparisonResult,
    CsvReportSink,
    FieldValue,
    JsonReportSink,
    ReconciliationReport,
    ReportSink,
    ReportSummary,
};

// =============================================================================
// Re-exports - Sources and config
// =============================================================================

pub use parser::{
    parse_bytes_auto,
    parse_file_auto,
    detect_encoding,
    detect_delimiter,
    decode_content,
    CsvError,
    ParseResult,
};

pub use sources::{
    ApiDocumentSource,
    CsvRecordSource,
    DocumentBackend,
    DocumentSource,
    FileDocumentSource,
    PgRecordSource,
    RecordBackend,
    RecordSource,
    TokenClient,
};

pub use config::{AppConfig, Environment};

// =============================================================================
// Re-exports - API
// =============================================================================

pub use api::types::{
    ReconcileRequest,
    ReconcileResponse,
    error_response,
};

// Server
pub mod server {
    pub use crate::api::server::start_server;
}
