//! Token acquisition.
//!
//! A [`TokenClient`] exchanges [`Credentials`] for a bearer token once and
//! returns it as an immutable [`Session`]. There is no refresh or caching:
//! callers that need a new token ask for a new session.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::{ConfigError, ConfigResult, SourceError, SourceResult};

/// Password-grant credentials, as stored in `api_credentials[_prod].json`.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default = "default_grant_type")]
    pub grant_type: String,
    pub username: String,
    pub password: String,
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub scope: String,
}

fn default_grant_type() -> String {
    "password".to_string()
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("grant_type", &self.grant_type)
            .field("username", &self.username)
            .field("password", &"***")
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .field("scope", &self.scope)
            .finish()
    }
}

impl Credentials {
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Json {
            context: path.display().to_string(),
            source,
        })
    }
}

/// An acquired bearer token.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    access_token: String,
}

impl Session {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// `Authorization` header value.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session").field("access_token", &"***").finish()
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

/// Client for the identity service token endpoint.
#[derive(Debug, Clone)]
pub struct TokenClient {
    client: reqwest::Client,
    token_url: String,
}

impl TokenClient {
    pub fn new(token_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), token_url)
    }

    pub fn with_client(client: reqwest::Client, token_url: impl Into<String>) -> Self {
        Self {
            client,
            token_url: token_url.into(),
        }
    }

    /// POST the form-encoded grant and read `access_token` from the reply.
    pub async fn fetch_session(&self, credentials: &Credentials) -> SourceResult<Session> {
        let form = [
            ("grant_type", credentials.grant_type.as_str()),
            ("username", credentials.username.as_str()),
            ("password", credentials.password.as_str()),
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
            ("scope", credentials.scope.as_str()),
        ];

        let response = self
            .client
            .post(&self.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| SourceError::Auth(format!("token request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Auth(format!(
                "token endpoint returned {}",
                status
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Auth(format!("invalid token response: {}", e)))?;

        body.access_token
            .filter(|token| !token.is_empty())
            .map(Session::new)
            .ok_or_else(|| SourceError::Auth("token response has no access_token".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credentials() -> Credentials {
        Credentials {
            grant_type: "password".into(),
            username: "analyst".into(),
            password: "secret".into(),
            client_id: "recon".into(),
            client_secret: "hush".into(),
            scope: "matches".into(),
        }
    }

    #[tokio::test]
    async fn test_fetch_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/connect/token"))
            .and(body_string_contains("grant_type=password"))
            .and(body_string_contains("username=analyst"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "abc123",
                "expires_in": 3600
            })))
            .mount(&server)
            .await;

        let client = TokenClient::new(format!("{}/connect/token", server.uri()));
        let session = client.fetch_session(&credentials()).await.unwrap();
        assert_eq!(session.access_token(), "abc123");
        assert_eq!(session.bearer(), "Bearer abc123");
    }

    #[tokio::test]
    async fn test_rejected_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "error": "invalid_grant" })))
            .mount(&server)
            .await;

        let client = TokenClient::new(format!("{}/connect/token", server.uri()));
        let err = client.fetch_session(&credentials()).await.unwrap_err();
        assert!(matches!(err, SourceError::Auth(_)));
    }

    #[tokio::test]
    async fn test_missing_access_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token_type": "Bearer" })))
            .mount(&server)
            .await;

        let client = TokenClient::new(format!("{}/connect/token", server.uri()));
        let err = client.fetch_session(&credentials()).await.unwrap_err();
        assert!(err.to_string().contains("access_token"));
    }

    #[test]
    fn test_secrets_not_in_debug() {
        let debug = format!("{:?} {:?}", credentials(), Session::new("abc123"));
        assert!(!debug.contains("\"secret\""));
        assert!(!debug.contains("hush"));
        assert!(!debug.contains("abc123"));
    }

    #[test]
    fn test_credentials_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api_credentials.json");
        std::fs::write(
            &path,
            r#"{"username": "analyst", "password": "secret", "client_id": "recon"}"#,
        )
        .unwrap();

        let creds = Credentials::from_file(&path).unwrap();
        assert_eq!(creds.grant_type, "password");
        assert_eq!(creds.scope, "");
    }
}
