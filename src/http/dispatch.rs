//! Final pipeline step: answer locally or call the route's backend.

use std::sync::Arc;

use axum::response::{IntoResponse, Response};
use serde_json::Value;

use crate::backend::Dispatcher;
use crate::error::GatewayError;
use crate::http::context::RequestContext;
use crate::http::pipeline::{BoxFuture, Endpoint};
use crate::http::request::{merge_params, merge_query, parse_body};
use crate::http::response;
use crate::lifecycle::LifecycleState;
use crate::routing::RouteTarget;

pub struct DispatchEndpoint {
    dispatcher: Arc<Dispatcher>,
    lifecycle: LifecycleState,
    max_body_bytes: usize,
}

impl DispatchEndpoint {
    pub fn new(dispatcher: Arc<Dispatcher>, lifecycle: LifecycleState, max_body_bytes: usize) -> Self {
        Self {
            dispatcher,
            lifecycle,
            max_body_bytes,
        }
    }

    async fn respond(&self, ctx: &mut RequestContext) -> Result<Response, GatewayError> {
        let Some(matched) = ctx.route.clone() else {
            return Err(GatewayError::NotFound("route not found".into()));
        };
        let entry = &matched.entry;

        if entry.target == RouteTarget::Health {
            if self.lifecycle.is_draining() {
                return Err(GatewayError::Unavailable("draining".into()));
            }
            return Ok(response::health());
        }

        let body = ctx.take_body();
        let bytes = axum::body::to_bytes(body, self.max_body_bytes)
            .await
            .map_err(|e| {
                tracing::debug!(error = %e, limit = self.max_body_bytes, "Request body rejected");
                GatewayError::PayloadTooLarge
            })?;

        let mut payload = parse_body(&bytes).map_err(|e| GatewayError::BadRequest(e.to_string()))?;
        merge_query(&mut payload, ctx.query());
        merge_params(&mut payload, &matched.params);

        if let Some(field) = &entry.bind_subject {
            let claims = ctx
                .claims()
                .ok_or_else(|| GatewayError::Unauthenticated("unauthorized".into()))?;
            payload.insert(field.clone(), Value::from(claims.subject()));
        }

        let result = self
            .dispatcher
            .dispatch(&entry.target, ctx, Value::Object(payload))
            .await?;

        Ok(response::json(entry.success_status, result))
    }
}

impl Endpoint for DispatchEndpoint {
    fn call<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let response = match self.respond(ctx).await {
                Ok(response) => response,
                Err(err) => {
                    if let GatewayError::Backend(backend) = &err {
                        tracing::warn!(
                            request_id = ctx.request_id().unwrap_or_default(),
                            route = %ctx.route_name(),
                            kind = backend.kind.as_str(),
                            error = %backend.message,
                            "Backend call failed"
                        );
                    }
                    err.into_response()
                }
            };
            ctx.finish(response)
        })
    }
}
