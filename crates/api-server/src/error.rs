//! Boundary mapping from internal errors to HTTP responses
//!
//! Every internal outcome becomes a stable error kind plus a
//! human-readable message here; stack detail and filesystem paths never
//! reach the client. The bounded engine stderr excerpt is the only
//! diagnostic that passes through.

use crate::types::ErrorBody;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use slide_convert_common::ConvertError;
use slide_convert_store::StoreError;
use tracing::{error, warn};

/// HTTP-facing wrapper around [`ConvertError`]
#[derive(Debug)]
pub struct ApiError(pub ConvertError);

impl ApiError {
    /// Stable machine-readable kind string
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match &self.0 {
            ConvertError::UnsupportedSource(_)
            | ConvertError::UnsupportedTarget(_)
            | ConvertError::InvalidRequest(_) => "validation_error",
            ConvertError::UnsafeFilename(_) => "unsafe_filename",
            ConvertError::Timeout(_) => "timeout",
            ConvertError::EngineFailed { .. } | ConvertError::OutputMissing => {
                "conversion_failed"
            }
            ConvertError::NotFound(_) => "not_found",
            ConvertError::Busy => "busy",
            ConvertError::Io(_) => "internal_error",
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            ConvertError::UnsupportedSource(_)
            | ConvertError::UnsupportedTarget(_)
            | ConvertError::InvalidRequest(_)
            | ConvertError::UnsafeFilename(_) => StatusCode::BAD_REQUEST,
            ConvertError::NotFound(_) => StatusCode::NOT_FOUND,
            ConvertError::Busy => StatusCode::SERVICE_UNAVAILABLE,
            ConvertError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ConvertError::EngineFailed { .. }
            | ConvertError::OutputMissing
            | ConvertError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match &self.0 {
            // Filesystem errors are operator-actionable, not client-actionable
            ConvertError::Io(_) => "internal storage error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        } else {
            warn!("Request rejected: {}", self.0);
        }

        let body = ErrorBody {
            error: self.kind().to_string(),
            message: self.message(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<ConvertError> for ApiError {
    fn from(err: ConvertError) -> Self {
        Self(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self(err.into())
    }
}
