use axum::extract::rejection::{FormRejection, JsonRejection};
use axum::{Form, Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::{info, warn};

use super::{
    error::ApiError,
    models::{
        BatchRequest, BatchResponse, CookiesForm, CookiesResponse, DownloadResponse,
        HealthResponse, QueuedResponse, StatusResponse, UrlRequest,
    },
    state::AppState,
    validation::{validate_url, validate_urls},
};
use crate::fetcher::tool_installed;
use crate::observability::tail_log;

const NO_LOGS: &str = "No logs available";

/// Health check endpoint (GET /health)
///
/// Always 200 while the process can answer. The flags report what would
/// make a job fail: missing downloader binary, missing storage credentials,
/// missing cookies, or a dead worker.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        tool_installed: tool_installed(&state.config.fetcher.binary),
        storage_configured: state.storage_configured,
        cookies_available: state.cookies.exists(),
        worker_alive: state.service.worker_alive(),
        queue_size: state.service.queue_size(),
        stats: state.service.snapshot(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Synchronous download endpoint (POST /download)
///
/// Runs the whole pipeline inside the request. Waits behind a job the
/// worker is already running.
pub async fn download(
    State(state): State<AppState>,
    payload: Result<Json<UrlRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload?;
    let url = validate_url(&request).map_err(|e| ApiError::InvalidPayload(e.to_string()))?;

    info!(url, "Received immediate download request");
    let outcome = state.service.process_now(&url).await;

    let response = if outcome.success {
        (
            StatusCode::OK,
            Json(DownloadResponse {
                success: true,
                message: Some(outcome.message),
                error: None,
                url,
            }),
        )
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(DownloadResponse {
                success: false,
                message: None,
                error: Some(outcome.message),
                url,
            }),
        )
    };

    Ok(response)
}

/// Queue endpoint (POST /queue)
pub async fn enqueue(
    State(state): State<AppState>,
    payload: Result<Json<UrlRequest>, JsonRejection>,
) -> Result<Json<QueuedResponse>, ApiError> {
    let Json(request) = payload?;
    let url = validate_url(&request).map_err(|e| ApiError::InvalidPayload(e.to_string()))?;

    let ack = state.service.enqueue(&url)?;

    Ok(Json(QueuedResponse {
        success: true,
        message: "Video added to queue".to_string(),
        url,
        queue_position: ack.queue_position,
        currently_processing: ack.currently_processing,
    }))
}

/// Batch queue endpoint (POST /batch)
pub async fn enqueue_batch(
    State(state): State<AppState>,
    payload: Result<Json<BatchRequest>, JsonRejection>,
) -> Result<Json<BatchResponse>, ApiError> {
    let Json(request) = payload?;
    let urls = validate_urls(&request).map_err(|e| ApiError::InvalidPayload(e.to_string()))?;

    let ack = state.service.enqueue_batch(&urls)?;

    Ok(Json(BatchResponse {
        success: true,
        message: format!("Added {} videos to queue", urls.len()),
        urls_count: urls.len(),
        queue_size: ack.queue_position,
        currently_processing: ack.currently_processing,
    }))
}

/// Processing status endpoint (GET /status)
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let status = state.service.status();

    Json(StatusResponse {
        currently_processing: status.currently_processing,
        queue_size: status.queue_size,
        total_completed: status.total_completed,
        total_failed: status.total_failed,
        worker_alive: status.worker_alive,
        started_at: status.started_at,
    })
}

/// Recent log lines (GET /logs) as plain text
pub async fn logs(State(state): State<AppState>) -> String {
    let logging = &state.config.logging;

    match &logging.file {
        Some(path) => tail_log(path, logging.tail_lines)
            .await
            .unwrap_or_else(|| NO_LOGS.to_string()),
        None => NO_LOGS.to_string(),
    }
}

/// Cookie upload endpoint (POST /upload-cookies), form field `cookies`
pub async fn upload_cookies(
    State(state): State<AppState>,
    payload: Result<Form<CookiesForm>, FormRejection>,
) -> Result<Json<CookiesResponse>, ApiError> {
    let Form(form) = payload?;

    let bytes = state.cookies.write(&form.cookies).await.inspect_err(|e| {
        warn!(error = %e, "Rejected cookies upload");
    })?;

    Ok(Json(CookiesResponse {
        success: true,
        message: "Cookies uploaded successfully".to_string(),
        bytes,
    }))
}
