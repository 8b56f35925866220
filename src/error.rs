//! Client-facing error taxonomy.
//!
//! Every failure the gateway reports to a caller is a [`GatewayError`], and
//! every one of them renders the same JSON envelope:
//!
//! ```text
//! {"error": "<reason phrase>", "message": "<short message>", "code": <status>}
//! ```

use std::time::Duration;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::backend::BackendError;
use crate::security::rate_limit::retry_after_secs;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("request body too large")]
    PayloadTooLarge,

    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("rate limit exceeded")]
    RateLimited { retry_after: Duration },

    #[error("backend call failed: {0}")]
    Backend(#[from] BackendError),

    #[error("request timed out")]
    Timeout,

    #[error("request canceled")]
    Canceled,

    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// Only produced by panic containment.
    #[error("internal fault")]
    Fault,
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            GatewayError::Forbidden(_) => StatusCode::FORBIDDEN,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::Backend(e) => e.status(),
            GatewayError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::Canceled | GatewayError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Fault => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to the caller. Never carries internal detail.
    pub fn client_message(&self) -> String {
        match self {
            GatewayError::BadRequest(m)
            | GatewayError::Unauthenticated(m)
            | GatewayError::Forbidden(m)
            | GatewayError::NotFound(m)
            | GatewayError::Unavailable(m) => m.clone(),
            GatewayError::PayloadTooLarge => "request body too large".to_string(),
            GatewayError::RateLimited { .. } => "rate limit exceeded, please try again later".to_string(),
            GatewayError::Backend(e) => e.client_message(),
            GatewayError::Timeout => "request timed out".to_string(),
            GatewayError::Canceled => "request canceled, server is shutting down".to_string(),
            GatewayError::Fault => "an unexpected error occurred".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    code: u16,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            error: status.canonical_reason().unwrap_or("Error"),
            message: self.client_message(),
            code: status.as_u16(),
        };

        let mut response = (status, Json(body)).into_response();
        if let GatewayError::RateLimited { retry_after } = self {
            response.headers_mut().insert(
                header::RETRY_AFTER,
                HeaderValue::from(retry_after_secs(retry_after)),
            );
        }
        response
    }
}
