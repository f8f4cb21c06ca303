//! HTTP fetcher backed by `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use virtualqueryset_core::{VirtualError, VirtualResult};

use super::Fetcher;
use crate::record::walk_path;

/// Fetches JSON with a `GET` request.
///
/// ```rust,no_run
/// use std::time::Duration;
/// use virtualqueryset_db::source::{ApiSource, HttpFetcher};
///
/// let fetcher = HttpFetcher::new("https://api.example.com/v1/products")
///     .with_bearer_token("secret")
///     .with_timeout(Duration::from_secs(10))
///     .with_json_path("data.results");
/// let source = ApiSource::new(fetcher);
/// ```
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    url: String,
    bearer_token: Option<String>,
    timeout: Option<Duration>,
    json_path: Option<String>,
}

impl HttpFetcher {
    /// Fetches `url` with a default client.
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), url)
    }

    /// Fetches `url` with a caller-provided client.
    pub fn with_client(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            bearer_token: None,
            timeout: None,
            json_path: None,
        }
    }

    /// Sends `Authorization: Bearer <token>`.
    #[must_use]
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Fails requests that take longer than `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Returns only the part of the response at a dot-separated path.
    #[must_use]
    pub fn with_json_path(mut self, path: impl Into<String>) -> Self {
        self.json_path = Some(path.into());
        self
    }

    /// The URL being fetched.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self) -> VirtualResult<serde_json::Value> {
        let mut request = self.client.get(&self.url);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        let response = request
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| VirtualError::FetchError(format!("GET {}: {e}", self.url)))?;
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| VirtualError::FetchError(format!("GET {}: invalid JSON: {e}", self.url)))?;

        match &self.json_path {
            None => Ok(body),
            Some(path) => walk_path(&body, path.split('.')).cloned().ok_or_else(|| {
                VirtualError::FetchError(format!("GET {}: no value at '{path}'", self.url))
            }),
        }
    }

    fn describe(&self) -> String {
        format!("GET {}", self.url)
    }
}
