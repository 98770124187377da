//! Error-to-HTTP response conversion.
//!
//! Route handlers return `Result<T, AppError>` and use `?` on
//! [`hf_core::Error`] directly.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Wrapper so we can implement `IntoResponse` for an external type.
#[derive(Debug)]
pub struct AppError {
    inner: hf_core::Error,
    request_id: Option<String>,
}

impl AppError {
    pub fn new(inner: hf_core::Error) -> Self {
        Self {
            inner,
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, id: String) -> Self {
        self.request_id = Some(id);
        self
    }
}

impl From<hf_core::Error> for AppError {
    fn from(e: hf_core::Error) -> Self {
        Self::new(e)
    }
}

fn error_code(err: &hf_core::Error) -> &'static str {
    match err {
        hf_core::Error::NotFound { .. } => "not_found",
        hf_core::Error::Unauthorized(_) => "unauthorized",
        hf_core::Error::Validation(_) => "validation_error",
        hf_core::Error::Io { .. } => "io_error",
        hf_core::Error::Tool { .. } => "tool_error",
        hf_core::Error::ProbeFailed(_) => "probe_failed",
        hf_core::Error::CombineFailed(_) => "combine_failed",
        hf_core::Error::Internal(_) => "internal_error",
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.inner.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(status = %status, error = %self.inner, "Server error in API handler");
        }

        let body = json!({
            "error": self.inner.to_string(),
            "code": error_code(&self.inner),
            "request_id": self.request_id,
        });

        (status, axum::Json(body)).into_response()
    }
}
