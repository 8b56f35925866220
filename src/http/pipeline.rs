//! Ordered request pipeline.
//!
//! # Responsibilities
//! - Define the [`Stage`] and [`Endpoint`] contracts
//! - Compose stages in their fixed order around the dispatch endpoint
//! - Build the [`RequestContext`] for each inbound request and run it through
//!
//! # Data Flow
//! ```text
//! Request
//!     → cors → recovery → request_id → access_log → deadline
//!     → rate_limit → authenticate → authorize
//!     → DispatchEndpoint (health | backend call)
//! Response flows back out through the same stages in reverse.
//! ```
//!
//! # Design Decisions
//! - Stages are plain trait objects in a `Vec`; the continuation is a slice
//!   of the remaining stages, so there is no per-request allocation for the
//!   chain itself
//! - Any stage may short-circuit by returning without calling `next`
//! - Route lookup happens once, before the stages, so authentication knows
//!   what the matched route demands

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderValue, Request};
use axum::response::Response;
use tokio_util::sync::CancellationToken;

use crate::backend::Dispatcher;
use crate::config::GatewayConfig;
use crate::http::context::{RequestContext, X_REQUEST_ID};
use crate::http::dispatch::DispatchEndpoint;
use crate::http::middleware::{
    access_log::AccessLog,
    auth::{Authenticate, Authorize},
    cors::Cors,
    deadline::Deadline,
    rate_limit::RateLimit,
    recovery::Recovery,
    request_id::RequestId,
};
use crate::http::request::client_key;
use crate::lifecycle::{InflightTracker, LifecycleState};
use crate::routing::RouteTable;
use crate::security::{ClaimsVerifier, RateLimiter};

/// A boxed future that returns a response.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One filter in the pipeline.
///
/// A stage either calls `next.run(ctx)` (at most once) and may inspect or
/// rewrite the response, or returns its own response without calling it.
pub trait Stage: Send + Sync + 'static {
    /// Stable name used in logs and tests.
    fn name(&self) -> &'static str;

    fn handle<'a>(&'a self, ctx: &'a mut RequestContext, next: Next<'a>) -> BoxFuture<'a, Response>;
}

/// The final step behind all stages.
pub trait Endpoint: Send + Sync + 'static {
    fn call<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, Response>;
}

/// The rest of the chain.
pub struct Next<'a> {
    stages: &'a [Arc<dyn Stage>],
    endpoint: &'a dyn Endpoint,
}

impl<'a> Next<'a> {
    /// Run the remaining stages and the endpoint. Consumes `self`, so a stage
    /// cannot continue twice.
    pub fn run<'c>(self, ctx: &'c mut RequestContext) -> BoxFuture<'c, Response>
    where
        'a: 'c,
    {
        match self.stages.split_first() {
            Some((stage, rest)) => stage.handle(
                ctx,
                Next {
                    stages: rest,
                    endpoint: self.endpoint,
                },
            ),
            None => self.endpoint.call(ctx),
        }
    }
}

/// Shared services the standard pipeline is built from.
#[derive(Clone)]
pub struct GatewayServices {
    pub routes: Arc<RouteTable>,
    pub limiter: Arc<RateLimiter>,
    pub verifier: Arc<ClaimsVerifier>,
    pub dispatcher: Arc<Dispatcher>,
    pub lifecycle: LifecycleState,
    pub inflight: InflightTracker,
    pub request_root: CancellationToken,
}

pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
    endpoint: Arc<dyn Endpoint>,
    routes: Arc<RouteTable>,
    request_root: CancellationToken,
    inflight: InflightTracker,
    trust_forwarded_for: bool,
}

impl Pipeline {
    pub fn new(
        stages: Vec<Arc<dyn Stage>>,
        endpoint: Arc<dyn Endpoint>,
        routes: Arc<RouteTable>,
        request_root: CancellationToken,
    ) -> Self {
        Self {
            stages,
            endpoint,
            routes,
            request_root,
            inflight: InflightTracker::new(),
            trust_forwarded_for: false,
        }
    }

    /// The gateway's fixed stage order around the dispatch endpoint.
    pub fn standard(config: &GatewayConfig, services: &GatewayServices) -> Self {
        let mut stages: Vec<Arc<dyn Stage>> = vec![
            Arc::new(Cors::from_config(&config.cors)),
            Arc::new(Recovery),
            Arc::new(RequestId),
            Arc::new(AccessLog),
            Arc::new(Deadline::new(config.timeouts.request())),
        ];
        if config.rate_limit.enabled {
            stages.push(Arc::new(RateLimit::new(services.limiter.clone())));
        }
        stages.push(Arc::new(Authenticate::new(services.verifier.clone())));
        stages.push(Arc::new(Authorize));

        let endpoint = DispatchEndpoint::new(
            services.dispatcher.clone(),
            services.lifecycle.clone(),
            config.listener.max_body_bytes,
        );

        let mut pipeline = Self::new(
            stages,
            Arc::new(endpoint),
            services.routes.clone(),
            services.request_root.clone(),
        );
        pipeline.inflight = services.inflight.clone();
        pipeline.trust_forwarded_for = config.rate_limit.trust_forwarded_for;
        pipeline
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn inflight(&self) -> &InflightTracker {
        &self.inflight
    }

    /// Run one request through the pipeline.
    pub async fn handle(&self, request: Request<Body>, remote_addr: SocketAddr) -> Response {
        let _guard = self.inflight.track();

        let key = client_key(request.headers(), remote_addr, self.trust_forwarded_for);
        let mut ctx = RequestContext::new(request, remote_addr, key, self.request_root.child_token());
        ctx.route = self.routes.lookup(&ctx.method, ctx.path());

        let next = Next {
            stages: &self.stages,
            endpoint: self.endpoint.as_ref(),
        };
        let mut response = next.run(&mut ctx).await;

        // Stages that answer before request identification (CORS preflight)
        // still get an id.
        if !response.headers().contains_key(&X_REQUEST_ID) {
            if let Ok(value) = HeaderValue::from_str(ctx.ensure_request_id()) {
                response.headers_mut().insert(X_REQUEST_ID, value);
            }
        }
        response
    }
}
