//! Backend failure taxonomy and its client-facing translation.

use axum::http::StatusCode;
use thiserror::Error;
use tonic::Code;

/// Fixed set of failure kinds a backend call can surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendErrorKind {
    InvalidArgument,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    Unauthenticated,
    ResourceExhausted,
    Unimplemented,
    Unavailable,
    DeadlineExceeded,
    Canceled,
    Unknown,
}

impl BackendErrorKind {
    /// Client status for this kind.
    pub fn status(self) -> StatusCode {
        match self {
            BackendErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
            BackendErrorKind::NotFound => StatusCode::NOT_FOUND,
            BackendErrorKind::AlreadyExists => StatusCode::CONFLICT,
            BackendErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
            BackendErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
            BackendErrorKind::ResourceExhausted => StatusCode::TOO_MANY_REQUESTS,
            BackendErrorKind::Unimplemented => StatusCode::NOT_IMPLEMENTED,
            BackendErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            BackendErrorKind::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
            BackendErrorKind::Canceled => StatusCode::REQUEST_TIMEOUT,
            BackendErrorKind::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Label used in logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            BackendErrorKind::InvalidArgument => "invalid_argument",
            BackendErrorKind::NotFound => "not_found",
            BackendErrorKind::AlreadyExists => "already_exists",
            BackendErrorKind::PermissionDenied => "permission_denied",
            BackendErrorKind::Unauthenticated => "unauthenticated",
            BackendErrorKind::ResourceExhausted => "resource_exhausted",
            BackendErrorKind::Unimplemented => "unimplemented",
            BackendErrorKind::Unavailable => "unavailable",
            BackendErrorKind::DeadlineExceeded => "deadline_exceeded",
            BackendErrorKind::Canceled => "canceled",
            BackendErrorKind::Unknown => "unknown",
        }
    }

    fn summary(self) -> &'static str {
        match self {
            BackendErrorKind::InvalidArgument => "invalid request",
            BackendErrorKind::NotFound => "resource not found",
            BackendErrorKind::AlreadyExists => "resource already exists",
            BackendErrorKind::PermissionDenied => "permission denied",
            BackendErrorKind::Unauthenticated => "authentication required",
            BackendErrorKind::ResourceExhausted => "too many requests",
            BackendErrorKind::Unimplemented => "operation not implemented",
            BackendErrorKind::Unavailable => "service unavailable",
            BackendErrorKind::DeadlineExceeded => "upstream request timed out",
            BackendErrorKind::Canceled => "request canceled",
            BackendErrorKind::Unknown => "internal server error",
        }
    }

    /// Kinds whose backend text describes the caller's own input.
    fn exposes_detail(self) -> bool {
        matches!(
            self,
            BackendErrorKind::InvalidArgument | BackendErrorKind::AlreadyExists
        )
    }
}

impl From<Code> for BackendErrorKind {
    fn from(code: Code) -> Self {
        match code {
            Code::InvalidArgument => BackendErrorKind::InvalidArgument,
            Code::NotFound => BackendErrorKind::NotFound,
            Code::AlreadyExists => BackendErrorKind::AlreadyExists,
            Code::PermissionDenied => BackendErrorKind::PermissionDenied,
            Code::Unauthenticated => BackendErrorKind::Unauthenticated,
            Code::ResourceExhausted => BackendErrorKind::ResourceExhausted,
            Code::Unimplemented => BackendErrorKind::Unimplemented,
            Code::Unavailable => BackendErrorKind::Unavailable,
            Code::DeadlineExceeded => BackendErrorKind::DeadlineExceeded,
            Code::Cancelled => BackendErrorKind::Canceled,
            _ => BackendErrorKind::Unknown,
        }
    }
}

/// A failed backend call. Created once at the call boundary, never retried.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind:?}: {message}")]
pub struct BackendError {
    pub kind: BackendErrorKind,
    pub message: String,
}

impl BackendError {
    pub fn new(kind: BackendErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Unavailable, message)
    }

    pub fn status(&self) -> StatusCode {
        self.kind.status()
    }

    /// Message safe to show the caller.
    ///
    /// Only input-validation kinds pass the backend's text through, trimmed
    /// to a single short line; every other kind gets a fixed summary.
    pub fn client_message(&self) -> String {
        if self.kind.exposes_detail() {
            let detail = sanitize(&self.message);
            if !detail.is_empty() {
                return detail;
            }
        }
        self.kind.summary().to_string()
    }
}

const MAX_DETAIL_CHARS: usize = 200;

fn sanitize(message: &str) -> String {
    let line = message.lines().next().unwrap_or("").trim();
    line.chars()
        .filter(|c| !c.is_control())
        .take(MAX_DETAIL_CHARS)
        .collect()
}

impl From<tonic::Status> for BackendError {
    fn from(status: tonic::Status) -> Self {
        Self::new(status.code().into(), status.message())
    }
}
