//! Rate limiting stage.
//!
//! Gates every request on the fixed-window limiter before any credential is
//! looked at, and reports the client's quota on the response.

use std::sync::Arc;

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::response::{IntoResponse, Response};

use crate::error::GatewayError;
use crate::http::context::RequestContext;
use crate::http::pipeline::{BoxFuture, Next, Stage};
use crate::observability::metrics;
use crate::security::rate_limit::{Decision, RateLimiter};

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

#[derive(Debug, Clone)]
pub struct RateLimit {
    limiter: Arc<RateLimiter>,
}

impl RateLimit {
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self { limiter }
    }
}

fn quota_headers(headers: &mut HeaderMap, limit: u32, remaining: u32) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(remaining));
}

impl Stage for RateLimit {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    fn handle<'a>(&'a self, ctx: &'a mut RequestContext, next: Next<'a>) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            match self.limiter.check(&ctx.client_key) {
                Decision::Allowed { limit, remaining } => {
                    let mut response = next.run(ctx).await;
                    quota_headers(response.headers_mut(), limit, remaining);
                    response
                }
                Decision::Limited { limit, retry_after } => {
                    let request_id = ctx.ensure_request_id().to_string();
                    tracing::warn!(
                        request_id = %request_id,
                        client = %ctx.client_key,
                        retry_after_ms = retry_after.as_millis() as u64,
                        "Rate limit exceeded"
                    );
                    metrics::record_rate_limited();

                    let mut response = ctx.finish(GatewayError::RateLimited { retry_after }.into_response());
                    quota_headers(response.headers_mut(), limit, 0);
                    response
                }
            }
        })
    }
}
