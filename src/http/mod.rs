//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum front end, peer address)
//!     → pipeline.rs (RequestContext, route lookup, ordered stages)
//!     → middleware/* (cors, recovery, request_id, access_log, deadline,
//!                     rate_limit, authenticate, authorize)
//!     → dispatch.rs (health | request.rs translation → backend dispatcher)
//!     → response.rs (JSON with the route's success status)
//!     → Send to client
//! ```

pub mod context;
pub mod dispatch;
pub mod middleware;
pub mod pipeline;
pub mod request;
pub mod response;
pub mod server;

pub use context::{RequestContext, WriteState, X_REQUEST_ID};
pub use dispatch::DispatchEndpoint;
pub use pipeline::{BoxFuture, Endpoint, GatewayServices, Next, Pipeline, Stage};
pub use server::HttpServer;
