//! HTTP client for a running vidferry server

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::api::models::{BatchResponse, QueuedResponse, StatusResponse};

pub const DEFAULT_SERVER: &str = "http://localhost:10000";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Server returned {status}: {body}")]
    Rejected { status: StatusCode, body: String },
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            user_agent: format!("vidferry/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str, config: ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Raw `/health` document
    pub async fn health(&self) -> Result<Value> {
        self.get("/health").await
    }

    pub async fn submit_one(&self, url: &str) -> Result<QueuedResponse> {
        self.post("/queue", &serde_json::json!({ "url": url })).await
    }

    pub async fn submit_batch(&self, urls: &[String]) -> Result<BatchResponse> {
        self.post("/batch", &serde_json::json!({ "urls": urls })).await
    }

    pub async fn status(&self) -> Result<StatusResponse> {
        self.get("/status").await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url, "GET");

        let response = self.client.get(&url).send().await?;
        decode(response).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url, "POST");

        let response = self.client.post(&url).json(body).send().await?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ClientError::Rejected { status, body });
    }

    Ok(response.json().await?)
}
