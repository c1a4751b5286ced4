//! External collaborators: where documents and relational records come from.
//!
//! The engine never calls these; the pipeline fetches both inputs through
//! the traits below and hands complete values to the engine.
//!
//! | Source | Online | Offline |
//! |--------|--------|---------|
//! | Document | [`ApiDocumentSource`] (bearer token) | [`FileDocumentSource`] (`{dir}/{id}.json`) |
//! | Records | [`PgRecordSource`] (Postgres) | [`CsvRecordSource`] (`{dir}/{id}.csv`) |

pub mod document;
pub mod records;
pub mod session;

pub use document::{load_document, ApiDocumentSource, FileDocumentSource};
pub use records::{CsvRecordSource, PgRecordSource, MATCH_ROSTER_QUERY};
pub use session::{Credentials, Session, TokenClient};

use serde_json::Value;
use std::future::Future;

use crate::error::SourceResult;
use crate::models::FlatRecordSet;

/// Supplies the nested document of a match.
pub trait DocumentSource {
    /// The document of one match; always a JSON object.
    fn fetch_document(&self, match_id: i64) -> impl Future<Output = SourceResult<Value>> + Send;
}

/// Supplies the relational rows of a match.
pub trait RecordSource {
    /// Every joined row of one match; never empty.
    fn fetch_records(&self, match_id: i64) -> impl Future<Output = SourceResult<FlatRecordSet>> + Send;
}

/// Document source selected at runtime.
#[derive(Debug, Clone)]
pub enum DocumentBackend {
    Api(ApiDocumentSource),
    File(FileDocumentSource),
}

impl DocumentSource for DocumentBackend {
    async fn fetch_document(&self, match_id: i64) -> SourceResult<Value> {
        match self {
            DocumentBackend::Api(source) => source.fetch_document(match_id).await,
            DocumentBackend::File(source) => source.fetch_document(match_id).await,
        }
    }
}

/// Record source selected at runtime.
#[derive(Debug, Clone)]
pub enum RecordBackend {
    Postgres(PgRecordSource),
    Csv(CsvRecordSource),
}

impl RecordSource for RecordBackend {
    async fn fetch_records(&self, match_id: i64) -> SourceResult<FlatRecordSet> {
        match self {
            RecordBackend::Postgres(source) => source.fetch_records(match_id).await,
            RecordBackend::Csv(source) => source.fetch_records(match_id).await,
        }
    }
}
