//! API error types and the wire envelope.
//!
//! Every failure renders as `{"success": false, "error": <kind>, "message":
//! <human>}`. External-I/O causes are collapsed to `external-io` at the
//! boundary; internal callers see the full error chain.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use vidpipe_pipeline::PipelineError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Upload assembly failed: {0}")]
    UploadAssemblyFailed(String),

    #[error("External I/O failure: {0}")]
    ExternalIo(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// The machine-readable `error` field of the envelope.
    fn kind(&self) -> &'static str {
        match self {
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::NotFound(_) => "not-found",
            ApiError::InvalidArgument(_) => "invalid-argument",
            ApiError::Conflict(_) => "conflict",
            ApiError::NotSupported(_) => "not-supported",
            ApiError::RateLimited => "rate-limited",
            ApiError::UploadAssemblyFailed(_) => "upload-assembly-failed",
            ApiError::ExternalIo(_) => "external-io",
            ApiError::Internal(_) => "internal",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::NotSupported(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::UploadAssemblyFailed(_) => StatusCode::BAD_GATEWAY,
            ApiError::ExternalIo(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::InvalidArgument(m) => Self::InvalidArgument(m),
            PipelineError::Conflict(m) => Self::Conflict(m),
            PipelineError::NotFound(m) => Self::NotFound(m),
            PipelineError::NotSupported(m) => Self::NotSupported(m),
            PipelineError::UploadAssemblyFailed(m) => Self::UploadAssemblyFailed(m),
            PipelineError::SessionExpired => Self::NotFound("upload session expired".into()),
            PipelineError::Store(e) => Self::ExternalIo(e.to_string()),
            PipelineError::Queue(e) => Self::ExternalIo(e.to_string()),
            PipelineError::Storage(e) => {
                if e.is_not_supported() {
                    Self::NotSupported(e.to_string())
                } else {
                    Self::ExternalIo(e.to_string())
                }
            }
        }
    }
}

impl From<vidpipe_store::StoreError> for ApiError {
    fn from(err: vidpipe_store::StoreError) -> Self {
        use vidpipe_store::StoreError;
        match err {
            StoreError::NotFound(m) => Self::NotFound(m),
            StoreError::Conflict(m) => Self::Conflict(m),
            other => Self::ExternalIo(other.to_string()),
        }
    }
}

impl From<vidpipe_queue::QueueError> for ApiError {
    fn from(err: vidpipe_queue::QueueError) -> Self {
        Self::ExternalIo(err.to_string())
    }
}

impl From<vidpipe_storage::StorageError> for ApiError {
    fn from(err: vidpipe_storage::StorageError) -> Self {
        if err.is_not_supported() {
            Self::NotSupported(err.to_string())
        } else {
            Self::ExternalIo(err.to_string())
        }
    }
}

#[derive(Serialize)]
struct ErrorEnvelope {
    success: bool,
    error: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Don't leak backend details in production
        let message = match &self {
            ApiError::ExternalIo(_) | ApiError::Internal(_) => {
                if std::env::var("ENVIRONMENT").unwrap_or_default() == "production" {
                    "An internal error occurred".to_string()
                } else {
                    self.to_string()
                }
            }
            _ => self.to_string(),
        };

        let body = ErrorEnvelope {
            success: false,
            error: self.kind(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(ApiError::not_found("x").kind(), "not-found");
        assert_eq!(ApiError::Conflict("x".into()).kind(), "conflict");
        assert_eq!(ApiError::NotSupported("x".into()).kind(), "not-supported");
        assert_eq!(ApiError::ExternalIo("x".into()).kind(), "external-io");
    }

    #[test]
    fn test_pipeline_conflict_maps_to_409() {
        let err: ApiError = PipelineError::conflict("busy").into();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }
}
