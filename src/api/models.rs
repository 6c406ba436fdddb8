//! Request and response bodies of the HTTP facade
//!
//! Field names match what existing submission scripts already read, so the
//! JSON shape is part of the contract:
//!
//! ```json
//! POST /queue   {"url": "https://www.youtube.com/watch?v=..."}
//! POST /batch   {"urls": ["https://youtu.be/a", "https://youtu.be/b"]}
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::status::StatusSnapshot;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UrlRequest {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BatchRequest {
    #[serde(default)]
    pub urls: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CookiesForm {
    #[serde(default)]
    pub cookies: String,
}

/// Result of `POST /download`
///
/// Success carries `message`, failure carries `error`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownloadResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueuedResponse {
    pub success: bool,
    pub message: String,
    pub url: String,
    pub queue_position: usize,
    pub currently_processing: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BatchResponse {
    pub success: bool,
    pub message: String,
    pub urls_count: usize,
    pub queue_size: usize,
    pub currently_processing: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StatusResponse {
    pub currently_processing: Option<String>,
    pub queue_size: usize,
    pub total_completed: u64,
    pub total_failed: u64,
    pub worker_alive: bool,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub tool_installed: bool,
    pub storage_configured: bool,
    pub cookies_available: bool,
    pub worker_alive: bool,
    pub queue_size: usize,
    pub stats: StatusSnapshot,
    pub version: &'static str,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CookiesResponse {
    pub success: bool,
    pub message: String,
    pub bytes: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub error: String,
}
