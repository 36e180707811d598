//! HTTP capability: GET a URL, get JSON back

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use swapi_common::{Result, SwapiError};
use tracing::trace;

/// Source of JSON documents addressed by URL
///
/// Implementations are shared by every task of a run.
#[async_trait]
pub trait JsonFetcher: Send + Sync {
    async fn get_json(&self, url: &str) -> Result<Value>;
}

/// [`JsonFetcher`] over a single pooled `reqwest` client
///
/// Success bodies and 404 bodies are returned as JSON; the upstream API
/// describes missing resources with a JSON body, and deciding what counts
/// as "not found" is left to the caller. Any other status is a transport
/// error, as is a body that is not JSON. There are no retries.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("swapi-ingest/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SwapiError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl JsonFetcher for HttpClient {
    async fn get_json(&self, url: &str) -> Result<Value> {
        trace!(url, "GET");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SwapiError::transport(url, e))?;

        let status = response.status();
        if !status.is_success() && status != StatusCode::NOT_FOUND {
            return Err(SwapiError::transport(url, format!("unexpected status {}", status)));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| SwapiError::transport(url, e))?;

        serde_json::from_slice(&body)
            .map_err(|e| SwapiError::transport(url, format!("invalid JSON body ({}): {}", status, e)))
    }
}
