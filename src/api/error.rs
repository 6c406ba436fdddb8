use axum::extract::rejection::{FormRejection, JsonRejection};
use axum::{Json, http::StatusCode, response::IntoResponse};
use thiserror::Error;

use super::models::ErrorResponse;
use crate::cookies::CookieError;
use crate::queue::QueueError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidPayload(String),
    #[error("payload too large")]
    PayloadTooLarge,
    #[error("job queue is not accepting work")]
    QueueClosed,
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::QueueClosed => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidPayload(_) => "INVALID_PAYLOAD",
            ApiError::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            ApiError::QueueClosed => "QUEUE_CLOSED",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let body = ErrorResponse {
            code: self.code(),
            error: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return ApiError::PayloadTooLarge;
        }
        ApiError::InvalidPayload(rejection.body_text())
    }
}

impl From<FormRejection> for ApiError {
    fn from(rejection: FormRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return ApiError::PayloadTooLarge;
        }
        ApiError::InvalidPayload(rejection.body_text())
    }
}

impl From<QueueError> for ApiError {
    fn from(value: QueueError) -> Self {
        match value {
            QueueError::Closed => ApiError::QueueClosed,
        }
    }
}

impl From<CookieError> for ApiError {
    fn from(value: CookieError) -> Self {
        match value {
            CookieError::Empty => ApiError::InvalidPayload(value.to_string()),
            CookieError::Io(e) => ApiError::Internal(e.to_string()),
        }
    }
}
