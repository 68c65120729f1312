//! HTTP error type for glyph-api
//!
//! Every failure leaves the service as a JSON body
//! `{"error": {"code": ..., "message": ...}}` with a status matching its kind.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::invoker::InvokeError;
use crate::pipeline::PipelineError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Backend disabled at startup (503)
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Backend ran and failed (500)
    #[error("Inference failed: {0}")]
    InferenceFailed(String),

    /// Ledger or artifact I/O (500)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::InferenceFailed(_) | ApiError::Storage(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::ServiceUnavailable(_) => "BACKEND_UNAVAILABLE",
            ApiError::InferenceFailed(_) => "INFERENCE_FAILED",
            ApiError::Storage(_) => "STORAGE_ERROR",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn message(self) -> String {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::ServiceUnavailable(msg)
            | ApiError::InferenceFailed(msg)
            | ApiError::Storage(msg)
            | ApiError::Internal(msg) => msg,
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::InvalidRequest(msg) => ApiError::BadRequest(msg),
            PipelineError::Inference(e @ InvokeError::Unavailable { .. }) => {
                ApiError::ServiceUnavailable(e.to_string())
            }
            PipelineError::Inference(e) => ApiError::InferenceFailed(e.to_string()),
            PipelineError::Ledger(e) => ApiError::Storage(e.to_string()),
            PipelineError::Artifact(e) => ApiError::Storage(e.to_string()),
            PipelineError::Internal(msg) => ApiError::Internal(msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let message = self.message();

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
