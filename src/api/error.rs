//! API error types with structured JSON responses.

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::pipeline::extraction::ExtractionError;
use crate::pipeline::llm::LlmError;
use crate::pipeline::PipelineError;
use crate::validation::ValidationError;

/// Structured error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Internal error: {0}")]
    Internal(String),
    /// The hosted model failed or answered with something unusable.
    #[error("Upstream model error: {0}")]
    Upstream(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", detail),
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, "NOT_FOUND", detail),
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                )
            }
            ApiError::Upstream(detail) => {
                tracing::warn!(detail, "Upstream model error");
                (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", detail)
            }
        };

        let body = ErrorBody {
            error: ErrorDetail { code, message },
        };
        (status, Json(body)).into_response()
    }
}

impl From<LlmError> for ApiError {
    /// Provider response bodies stay in the log; clients get the status only.
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Api { status, body } => {
                tracing::error!(status, body, "Model provider rejected the request");
                ApiError::Upstream(format!("Model provider returned HTTP {status}"))
            }
            LlmError::MalformedResponse(detail) => {
                tracing::error!(detail, "Malformed model provider response");
                ApiError::Upstream("Model provider returned a malformed response".into())
            }
            other => ApiError::Upstream(other.to_string()),
        }
    }
}

impl From<ExtractionError> for ApiError {
    fn from(err: ExtractionError) -> Self {
        match err {
            ExtractionError::FileNotFound(path) => {
                ApiError::NotFound(format!("File not found: {}", path.display()))
            }
            ExtractionError::UnsupportedFormat(_)
            | ExtractionError::PdfParsing(_)
            | ExtractionError::NoTextExtracted
            | ExtractionError::Csv(_) => ApiError::BadRequest(err.to_string()),
            ExtractionError::Io(_) | ExtractionError::WorkerPanicked => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Llm(e) => e.into(),
            PipelineError::Extraction(e) => e.into(),
            PipelineError::EmptyInput => ApiError::BadRequest("Input text is empty".into()),
            PipelineError::JsonParsing(_) | PipelineError::AllChunksFailed(_) => {
                ApiError::Upstream(err.to_string())
            }
            PipelineError::WorkerPanicked => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::EmptyInput => ApiError::BadRequest(err.to_string()),
            ValidationError::DimensionMismatch { .. } | ValidationError::NotFitted => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::BadRequest(format!("Malformed multipart body: {}", err.body_text()))
    }
}
