//! Request identification.
//!
//! Assigns the request id (client-supplied when valid, else UUID v4) before
//! anything downstream runs and echoes it on the response whatever the outcome.

use axum::http::HeaderValue;
use axum::response::Response;

use crate::http::context::{RequestContext, X_REQUEST_ID};
use crate::http::pipeline::{BoxFuture, Next, Stage};

#[derive(Debug, Clone, Copy, Default)]
pub struct RequestId;

impl Stage for RequestId {
    fn name(&self) -> &'static str {
        "request_id"
    }

    fn handle<'a>(&'a self, ctx: &'a mut RequestContext, next: Next<'a>) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let id = ctx.ensure_request_id().to_string();
            let mut response = next.run(ctx).await;

            if let Ok(value) = HeaderValue::from_str(&id) {
                response.headers_mut().insert(X_REQUEST_ID, value);
            }
            response
        })
    }
}
