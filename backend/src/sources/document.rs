//! Document sources: the match API and local JSON files.

use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{DocumentSource, Session};
use crate::api::logs::log_warning_indent;
use crate::error::{SourceError, SourceResult};

/// Default number of attempts per document
const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Delay between attempts in milliseconds
const RETRY_DELAY_MS: u64 = 1000;

/// Match document endpoint, relative to the API base URL.
pub fn document_url(base_url: &str, match_id: i64) -> String {
    format!("{}/api/v1/wyscout/matches/{}", base_url.trim_end_matches('/'), match_id)
}

/// Fetches match documents from the match API with a bearer token.
///
/// Only transport errors and 5xx responses are retried; every other
/// failure is returned at once.
#[derive(Debug, Clone)]
pub struct ApiDocumentSource {
    client: reqwest::Client,
    base_url: String,
    session: Session,
    max_attempts: u32,
    retry_delay: Duration,
}

impl ApiDocumentSource {
    pub fn new(base_url: impl Into<String>, session: Session) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            session,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: Duration::from_millis(RETRY_DELAY_MS),
        }
    }

    /// Set the number of attempts (at least one)
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    async fn try_fetch(&self, url: &str) -> SourceResult<Value> {
        let response = self
            .client
            .get(url)
            .header(AUTHORIZATION, self.session.bearer())
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| SourceError::Http(e.to_string()))?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(SourceError::Auth(format!(
                    "{} rejected the token ({})",
                    url,
                    response.status()
                )));
            }
            StatusCode::NOT_FOUND => return Err(SourceError::NotFound(url.to_string())),
            status => {
                return Err(SourceError::Status {
                    status: status.as_u16(),
                    url: url.to_string(),
                });
            }
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if !is_json_content_type(&content_type) {
            return Err(SourceError::ContentType(content_type));
        }

        let body = response
            .text()
            .await
            .map_err(|e| SourceError::Http(e.to_string()))?;

        parse_document(&body)
    }
}

impl DocumentSource for ApiDocumentSource {
    async fn fetch_document(&self, match_id: i64) -> SourceResult<Value> {
        let url = document_url(&self.base_url, match_id);
        let mut attempt = 1;

        loop {
            match self.try_fetch(&url).await {
                Err(e) if attempt < self.max_attempts && is_transient(&e) => {
                    log_warning_indent(
                        format!("Match {}: attempt {}/{} failed: {}", match_id, attempt, self.max_attempts, e),
                        1,
                    );
                    tokio::time::sleep(self.retry_delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

fn is_transient(error: &SourceError) -> bool {
    match error {
        SourceError::Http(_) => true,
        SourceError::Status { status, .. } => *status >= 500,
        _ => false,
    }
}

/// `application/json`, with or without parameters.
fn is_json_content_type(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
}

/// Parse a document body; anything but a JSON object is rejected.
pub fn parse_document(body: &str) -> SourceResult<Value> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| SourceError::InvalidDocument(e.to_string()))?;

    if !value.is_object() {
        return Err(SourceError::InvalidDocument(format!(
            "expected a JSON object, found {}",
            crate::path::value_kind(&value)
        )));
    }
    Ok(value)
}

/// Read one document file.
pub fn load_document(path: impl AsRef<Path>) -> SourceResult<Value> {
    let path = path.as_ref();
    let body = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => SourceError::NotFound(path.display().to_string()),
        _ => SourceError::Io(e),
    })?;
    parse_document(&body)
}

/// Reads `{dir}/{match_id}.json`.
#[derive(Debug, Clone)]
pub struct FileDocumentSource {
    dir: PathBuf,
}

impl FileDocumentSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, match_id: i64) -> PathBuf {
        self.dir.join(format!("{}.json", match_id))
    }
}

impl DocumentSource for FileDocumentSource {
    async fn fetch_document(&self, match_id: i64) -> SourceResult<Value> {
        let path = self.path_for(match_id);
        let body = tokio::fs::read_to_string(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => SourceError::NotFound(path.display().to_string()),
            _ => SourceError::Io(e),
        })?;
        parse_document(&body)
    }
}
