//! HTTP-boundary errors.

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::error::StoreError;

/// Errors a handler can return to a client.
///
/// Conversion failures are deliberately absent: they happen after Submit
/// has already answered 202 and are reported through the job record.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request itself is malformed (bad field, wrong file type, ...).
    #[error("{0}")]
    InvalidInput(String),

    /// No job with the requested id (never existed, consumed, or expired).
    #[error("job not found")]
    NotFound,

    /// Upload exceeds the configured size limit.
    #[error("uploaded file exceeds the size limit")]
    PayloadTooLarge,

    /// The job store failed; the request may be retried.
    #[error("job store unavailable")]
    Store(#[from] StoreError),

    /// Anything else that should not leak internals to the client.
    #[error("internal error")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidInput(_) => "INVALID_INPUT",
            ApiError::NotFound => "NOT_FOUND",
            ApiError::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            ApiError::Store(_) => "STORE_UNAVAILABLE",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Server-side detail goes to the log, not the wire.
        match &self {
            ApiError::Store(e) => error!(error = %e, "store failure surfaced to client"),
            ApiError::Internal(detail) => error!(detail = %detail, "internal error"),
            _ => {}
        }
        let body = Json(json!({
            "error": self.to_string(),
            "code": self.code(),
        }));
        (self.status(), body).into_response()
    }
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        // axum reports body-limit overruns through multipart read errors.
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge
        } else {
            ApiError::InvalidInput(format!("malformed multipart request: {e}"))
        }
    }
}
