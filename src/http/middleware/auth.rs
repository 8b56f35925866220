//! Authentication and authorization stages.
//!
//! Both stages consult the matched route. Unmatched requests and public
//! routes pass straight through; the endpoint answers 404 for the former.

use std::sync::Arc;

use axum::response::{IntoResponse, Response};

use crate::error::GatewayError;
use crate::http::context::RequestContext;
use crate::http::pipeline::{BoxFuture, Next, Stage};
use crate::routing::AuthLevel;
use crate::security::claims::{ClaimsError, ClaimsVerifier};

/// Verifies the bearer credential for routes that demand one and attaches
/// the resulting Claims to the context.
#[derive(Debug, Clone)]
pub struct Authenticate {
    verifier: Arc<ClaimsVerifier>,
}

impl Authenticate {
    pub fn new(verifier: Arc<ClaimsVerifier>) -> Self {
        Self { verifier }
    }
}

fn unauthenticated_message(err: &ClaimsError) -> &'static str {
    match err {
        ClaimsError::MissingHeader => "missing authorization header",
        ClaimsError::BadScheme => "invalid authorization header format",
        _ => "invalid or expired token",
    }
}

impl Stage for Authenticate {
    fn name(&self) -> &'static str {
        "authenticate"
    }

    fn handle<'a>(&'a self, ctx: &'a mut RequestContext, next: Next<'a>) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let level = ctx.route.as_ref().map(|m| m.entry.auth.clone());

            let claims = match level {
                Some(AuthLevel::Optional) => self.verifier.verify_optional(&ctx.headers),
                Some(level) if level.requires_credential() => {
                    match self.verifier.verify_headers(&ctx.headers) {
                        Ok(claims) => Some(claims),
                        Err(err) => {
                            let request_id = ctx.ensure_request_id().to_string();
                            tracing::debug!(
                                request_id = %request_id,
                                route = %ctx.route_name(),
                                error = %err,
                                "Authentication failed"
                            );
                            let message = unauthenticated_message(&err).to_string();
                            return ctx.finish(GatewayError::Unauthenticated(message).into_response());
                        }
                    }
                }
                _ => None,
            };

            if let Some(claims) = claims {
                if let Err(err) = ctx.attach_claims(claims) {
                    tracing::error!(error = %err, "Claims attached twice");
                    return ctx.finish(GatewayError::Fault.into_response());
                }
            }

            next.run(ctx).await
        })
    }
}

/// Enforces the route's role set against the attached Claims.
#[derive(Debug, Clone, Copy, Default)]
pub struct Authorize;

impl Stage for Authorize {
    fn name(&self) -> &'static str {
        "authorize"
    }

    fn handle<'a>(&'a self, ctx: &'a mut RequestContext, next: Next<'a>) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let allowed = ctx
                .route
                .as_ref()
                .and_then(|m| m.entry.auth.allowed_roles().map(<[String]>::to_vec));

            if let Some(allowed) = allowed {
                let Some(claims) = ctx.claims() else {
                    return ctx.finish(GatewayError::Unauthenticated("unauthorized".into()).into_response());
                };

                if !claims.has_role(&allowed) {
                    tracing::warn!(
                        request_id = ctx.request_id().unwrap_or_default(),
                        route = %ctx.route_name(),
                        user_id = claims.user_id,
                        role = %claims.role,
                        "Access denied: insufficient permissions"
                    );
                    return ctx.finish(GatewayError::Forbidden("insufficient permissions".into()).into_response());
                }

                tracing::debug!(
                    route = %ctx.route_name(),
                    user_id = claims.user_id,
                    role = %claims.role,
                    "Access granted"
                );
            }

            next.run(ctx).await
        })
    }
}
