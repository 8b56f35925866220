//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum Router that feeds every request into the pipeline
//! - Serve it on a bound listener with peer addresses attached
//! - Stop accepting and close idle connections when told to drain
//!
//! # Design Decisions
//! - Axum is only the socket/HTTP front end; routing, auth and limits live in
//!   the pipeline, reached through a single fallback handler

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    response::Response,
    Router,
};
use tokio::net::TcpListener;

use crate::http::pipeline::Pipeline;

/// HTTP front end for the gateway pipeline.
pub struct HttpServer {
    pipeline: Arc<Pipeline>,
}

impl HttpServer {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self { pipeline }
    }

    /// Build the Axum router.
    pub fn router(&self) -> Router {
        Router::new()
            .fallback(gateway_handler)
            .with_state(self.pipeline.clone())
    }

    /// Serve until `shutdown` resolves, then finish open requests and return.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, stages = ?self.pipeline.stage_names(), "HTTP server starting");

        let app = self.router().into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Hand the request to the pipeline.
async fn gateway_handler(State(pipeline): State<Arc<Pipeline>>, request: Request<Body>) -> Response {
    let remote_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
        .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 0)));

    pipeline.handle(request, remote_addr).await
}
