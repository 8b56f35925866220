//! Response construction.
//!
//! # Responsibilities
//! - Render backend results as JSON with the route's success status
//! - Render the local health document
//!
//! # Design Decisions
//! - Errors never reach here; they render through `GatewayError`

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;

pub const SERVICE_NAME: &str = "api-gateway";

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    service: &'static str,
}

/// `{"status":"healthy","service":"api-gateway"}`
pub fn health() -> Response {
    Json(Health {
        status: "healthy",
        service: SERVICE_NAME,
    })
    .into_response()
}

/// A backend result with the route's success status.
pub fn json(status: StatusCode, value: Value) -> Response {
    (status, Json(value)).into_response()
}
