//! HTTP-shaped error conversion. `ApiError` wraps `CoreError` and renders the
//! `{success:false, error, code?, details?}` body every endpoint returns on
//! failure, mirroring the `ApiError`/`IntoResponse` split other example
//! services in this pack use for their error boundary.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::errors::{CoreError, FetchError};

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip)]
    pub status: u16,
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let status = err.status_code();
        let code = error_code(&err);
        let details = match &err {
            CoreError::Validation(msg) => Some(msg.clone()),
            _ => None,
        };
        Self {
            success: false,
            error: err.to_string(),
            code,
            details,
            status,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

/// Maps a `CoreError` onto the spec's surfaced error-code vocabulary.
/// `RateLimited` and plain `Auth` carry no code (S4), matching the teacher
/// convention of leaving machine codes optional on the response body.
fn error_code(err: &CoreError) -> Option<&'static str> {
    match err {
        CoreError::Validation(_) => Some("VALIDATION_ERROR"),
        CoreError::Auth => None,
        CoreError::Billing => Some("INSUFFICIENT_CREDITS_ERROR"),
        CoreError::Authorization => Some("FORBIDDEN_ERROR"),
        CoreError::NotFound(_) => Some("NOT_FOUND_ERROR"),
        CoreError::Timeout => Some("TIMEOUT_ERROR"),
        CoreError::RateLimited { .. } => None,
        CoreError::Engine { .. } => Some("INTERNAL_SERVER_ERROR"),
        CoreError::Adapter(fe) => Some(fetch_error_code(fe)),
        CoreError::Other(_) => Some("INTERNAL_SERVER_ERROR"),
    }
}

fn fetch_error_code(fe: &FetchError) -> &'static str {
    match fe {
        FetchError::Dns(_) => "DNS_RESOLUTION_ERROR",
        FetchError::Ssl(_) => "SSL_ERROR",
        FetchError::Timeout => "TIMEOUT_ERROR",
        FetchError::UnsupportedFile(_) => "UNSUPPORTED_FILE_ERROR",
        FetchError::Http4xx { .. } | FetchError::Http5xx { .. } | FetchError::EngineSpecific(_) => {
            "INTERNAL_SERVER_ERROR"
        }
    }
}
