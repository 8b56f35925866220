//! Edge gateway library.
//!
//! Terminates client HTTP traffic, applies cross-cutting policy (CORS,
//! request ids, timeouts, rate limits, bearer authentication, role checks)
//! and forwards each request to a backend service as a unary gRPC call.

// Core subsystems
pub mod config;
pub mod error;
pub mod http;
pub mod routing;

// Backend traffic
pub mod backend;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::schema::GatewayConfig;
pub use error::GatewayError;
pub use http::{HttpServer, Pipeline};
pub use lifecycle::{DrainOutcome, LifecycleManager, Shutdown};
