//! Timing and access logging.

use axum::body::HttpBody;
use axum::response::Response;
use tokio::time::Instant;

use crate::http::context::RequestContext;
use crate::http::pipeline::{BoxFuture, Next, Stage};
use crate::observability::metrics;

#[derive(Debug, Clone, Copy, Default)]
pub struct AccessLog;

impl Stage for AccessLog {
    fn name(&self) -> &'static str {
        "access_log"
    }

    fn handle<'a>(&'a self, ctx: &'a mut RequestContext, next: Next<'a>) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let start = Instant::now();
            let response = next.run(&mut *ctx).await;
            let elapsed = start.elapsed();

            let status = response.status();
            // Buffered JSON bodies have an exact size; streaming ones log 0.
            let bytes = response.body().size_hint().exact().unwrap_or(0);

            let request_id = ctx.ensure_request_id().to_string();
            tracing::info!(
                request_id = %request_id,
                method = %ctx.method,
                path = %ctx.path(),
                route = %ctx.route_name(),
                client = %ctx.client_key,
                status = status.as_u16(),
                duration_ms = elapsed.as_millis() as u64,
                bytes,
                "Request completed"
            );
            metrics::record_request(ctx.method.as_str(), ctx.route_name(), status.as_u16(), elapsed);

            response
        })
    }
}
