//! Remote progress API client.
//!
//! The backend resolves the learner from the session credential and keeps
//! one record per (learner, module).

use crate::config::RemoteConfig;
use async_trait::async_trait;
use reqwest::{header, Client, ClientBuilder, StatusCode};
use safescape_core::{
    ModuleNum, ProgressUpdate, RemoteModuleResponse, RemoteProgressRecord, RemoteSnapshot,
};
use tracing::debug;

/// Errors talking to the progress API.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// No resolvable identity; the caller is a guest
    #[error("not authenticated")]
    Unauthorized,

    /// Non-success response
    #[error("progress API returned status {0}")]
    Status(StatusCode),

    /// Network or transport failure
    #[error("progress API request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body did not match the expected shape
    #[error("invalid progress API response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl RemoteError {
    /// Whether this is the expected guest-mode outcome rather than a fault.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, RemoteError::Unauthorized)
    }
}

/// Server-of-record for learner progress.
#[async_trait]
pub trait RemoteProgress: Send + Sync {
    /// Fetch every module record for the current learner.
    async fn fetch_all(&self) -> Result<RemoteSnapshot, RemoteError>;

    /// Fetch one module's record, if the learner has one.
    async fn fetch_module(&self, module: ModuleNum) -> Result<Option<RemoteProgressRecord>, RemoteError>;

    /// Upsert one module's full section state.
    async fn upsert(&self, update: &ProgressUpdate) -> Result<(), RemoteError>;
}

/// HTTP implementation of [`RemoteProgress`].
#[derive(Clone)]
pub struct HttpProgressClient {
    /// HTTP client
    client: Client,

    /// Endpoint URL
    url: String,

    /// Session cookie value
    session: Option<String>,
}

impl HttpProgressClient {
    /// Create a client for the configured backend.
    pub fn new(config: &RemoteConfig) -> Self {
        Self {
            client: ClientBuilder::new()
                .timeout(config.timeout)
                .build()
                .unwrap_or_default(),
            url: config.url(),
            session: config.session.clone(),
        }
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.session {
            Some(session) => builder.header(header::COOKIE, format!("session={}", session)),
            None => builder,
        }
    }

    async fn read_body(response: reqwest::Response) -> Result<String, RemoteError> {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(RemoteError::Unauthorized);
        }
        if !status.is_success() {
            return Err(RemoteError::Status(status));
        }
        Ok(response.text().await?)
    }
}

#[async_trait]
impl RemoteProgress for HttpProgressClient {
    async fn fetch_all(&self) -> Result<RemoteSnapshot, RemoteError> {
        debug!("Fetching progress from {}", self.url);
        let response = self.request(self.client.get(&self.url)).send().await?;
        let body = Self::read_body(response).await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn fetch_module(&self, module: ModuleNum) -> Result<Option<RemoteProgressRecord>, RemoteError> {
        let url = format!("{}?moduleNum={}", self.url, module);
        debug!("Fetching module progress from {}", url);
        let response = self.request(self.client.get(&url)).send().await?;
        let body = Self::read_body(response).await?;
        let parsed: RemoteModuleResponse = serde_json::from_str(&body)?;
        Ok(parsed.progress)
    }

    async fn upsert(&self, update: &ProgressUpdate) -> Result<(), RemoteError> {
        debug!("Pushing module {} to {}", update.module_num, self.url);
        let response = self
            .request(self.client.post(&self.url))
            .json(update)
            .send()
            .await?;
        Self::read_body(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_uses_configured_url() {
        let client = HttpProgressClient::new(
            &RemoteConfig::new("http://localhost:3000").with_session("abc"),
        );
        assert_eq!(client.url, "http://localhost:3000/api/kids/safescape/progress");
        assert_eq!(client.session.as_deref(), Some("abc"));
    }

    #[test]
    fn test_unauthorized_classification() {
        assert!(RemoteError::Unauthorized.is_unauthorized());
        assert!(!RemoteError::Status(StatusCode::BAD_REQUEST).is_unauthorized());
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_transport_error() {
        // port 9 (discard) on localhost is not expected to serve HTTP
        let client = HttpProgressClient::new(
            &RemoteConfig::new("http://127.0.0.1:9")
                .with_timeout(std::time::Duration::from_millis(500)),
        );
        let err = client.fetch_all().await.unwrap_err();
        assert!(matches!(err, RemoteError::Http(_)));
    }
}
