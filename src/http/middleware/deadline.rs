//! Cancellation and timeout binding.
//!
//! Sets the request deadline and races the rest of the chain against it and
//! against the request's cancellation token. Whichever side commits the
//! response first wins; the loser is dropped, which abandons any backend call
//! still in progress.

use std::time::Duration;

use axum::response::{IntoResponse, Response};
use tokio::time::{sleep_until, Instant};

use crate::error::GatewayError;
use crate::http::context::RequestContext;
use crate::http::pipeline::{BoxFuture, Next, Stage};

#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    timeout: Duration,
}

impl Deadline {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Stage for Deadline {
    fn name(&self) -> &'static str {
        "deadline"
    }

    fn handle<'a>(&'a self, ctx: &'a mut RequestContext, next: Next<'a>) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            // An unrepresentable deadline means no deadline at all.
            let deadline = Instant::now().checked_add(self.timeout);
            ctx.deadline = deadline;

            let cancel = ctx.cancel.clone();
            let write = ctx.write_state().clone();
            let request_id = ctx.ensure_request_id().to_string();

            if cancel.is_cancelled() && write.try_claim() {
                return GatewayError::Canceled.into_response();
            }

            let expired = async {
                match deadline {
                    Some(deadline) => sleep_until(deadline).await,
                    None => std::future::pending().await,
                }
            };

            let mut downstream = next.run(ctx);
            let interrupted = tokio::select! {
                biased;
                _ = cancel.cancelled() => GatewayError::Canceled,
                _ = expired => GatewayError::Timeout,
                response = &mut downstream => return response,
            };

            if write.try_claim() {
                drop(downstream);
                tracing::warn!(
                    request_id = %request_id,
                    timeout_ms = self.timeout.as_millis() as u64,
                    reason = %interrupted,
                    "Request interrupted before a response was written"
                );
                return interrupted.into_response();
            }

            // Downstream already committed its response; let it finish.
            downstream.await
        })
    }
}
