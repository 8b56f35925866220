//! Panic containment.
//!
//! Catches a panic unwinding out of any later stage or the endpoint and turns
//! it into a generic 500. The connection task keeps running.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use axum::response::{IntoResponse, Response};
use futures_util::FutureExt;

use crate::error::GatewayError;
use crate::http::context::RequestContext;
use crate::http::pipeline::{BoxFuture, Next, Stage};

#[derive(Debug, Clone, Copy, Default)]
pub struct Recovery;

impl Stage for Recovery {
    fn name(&self) -> &'static str {
        "recovery"
    }

    fn handle<'a>(&'a self, ctx: &'a mut RequestContext, next: Next<'a>) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let outcome = AssertUnwindSafe(next.run(&mut *ctx)).catch_unwind().await;
            match outcome {
                Ok(response) => response,
                Err(panic) => {
                    let request_id = ctx.ensure_request_id().to_string();
                    tracing::error!(
                        request_id = %request_id,
                        method = %ctx.method,
                        path = %ctx.path(),
                        panic = %panic_message(panic.as_ref()),
                        "Request handler panicked"
                    );
                    GatewayError::Fault.into_response()
                }
            }
        })
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
