//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use serde_json::{json, Value};

use edge_gateway::backend::{BackendCall, BackendError, BackendTransport, Dispatcher};
use edge_gateway::config::GatewayConfig;
use edge_gateway::http::{BoxFuture, GatewayServices, Pipeline};
use edge_gateway::lifecycle::{InflightTracker, LifecycleState};
use edge_gateway::routing::table::effective_routes;
use edge_gateway::routing::RouteTable;
use edge_gateway::security::{ClaimsVerifier, RateLimiter};
use tokio_util::sync::CancellationToken;

pub const SECRET: &str = "integration-test-secret";

/// What a scripted backend saw.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub operation: String,
    pub payload: Value,
    pub request_id: String,
    pub timeout: Option<Duration>,
}

/// In-process stand-in for a backend service.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    delay: Duration,
    failure: Option<BackendError>,
    panics: bool,
    started: AtomicUsize,
    completed: AtomicUsize,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedBackend {
    /// Answers `{"operation": ..., "echo": <payload>}`.
    pub fn ok() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            ..Self::default()
        })
    }

    pub fn failing(error: BackendError) -> Arc<Self> {
        Arc::new(Self {
            failure: Some(error),
            ..Self::default()
        })
    }

    pub fn panicking() -> Arc<Self> {
        Arc::new(Self {
            panics: true,
            ..Self::default()
        })
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn last_call(&self) -> Option<RecordedCall> {
        self.calls.lock().unwrap().last().cloned()
    }
}

impl BackendTransport for ScriptedBackend {
    fn call<'a>(&'a self, call: BackendCall<'a>) -> BoxFuture<'a, Result<Value, BackendError>> {
        Box::pin(async move {
            self.started.fetch_add(1, Ordering::SeqCst);
            self.calls.lock().unwrap().push(RecordedCall {
                operation: call.operation.to_string(),
                payload: call.payload.clone(),
                request_id: call.request_id.to_string(),
                timeout: call.timeout,
            });

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.panics {
                panic!("scripted backend blew up");
            }
            self.completed.fetch_add(1, Ordering::SeqCst);

            match &self.failure {
                Some(err) => Err(err.clone()),
                None => Ok(json!({"operation": call.operation, "echo": call.payload})),
            }
        })
    }
}

/// Defaults with a known secret and an ephemeral port.
pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.auth.jwt_secret = SECRET.to_string();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config
}

/// Every default backend name served by the same scripted transport.
pub fn dispatcher_with(backend: Arc<ScriptedBackend>) -> Dispatcher {
    ["user", "product", "cart", "order"]
        .into_iter()
        .fold(Dispatcher::default(), |d, name| d.with_transport(name, backend.clone()))
}

pub struct Harness {
    pub pipeline: Pipeline,
    pub lifecycle: LifecycleState,
    pub request_root: CancellationToken,
}

/// The standard pipeline over a scripted backend.
pub fn harness(config: &GatewayConfig, backend: Arc<ScriptedBackend>) -> Harness {
    let lifecycle = LifecycleState::new();
    let request_root = CancellationToken::new();
    let services = GatewayServices {
        routes: Arc::new(RouteTable::from_config(&effective_routes(config)).unwrap()),
        limiter: Arc::new(RateLimiter::from_config(&config.rate_limit)),
        verifier: Arc::new(ClaimsVerifier::from_config(&config.auth)),
        dispatcher: Arc::new(dispatcher_with(backend)),
        lifecycle: lifecycle.clone(),
        inflight: InflightTracker::new(),
        request_root: request_root.clone(),
    };

    Harness {
        pipeline: Pipeline::standard(config, &services),
        lifecycle,
        request_root,
    }
}

pub fn token(subject: u64, role: &str) -> String {
    ClaimsVerifier::new(SECRET, 0)
        .issue(subject, role, Duration::from_secs(300))
        .unwrap()
}

pub fn peer() -> SocketAddr {
    "192.0.2.10:40000".parse().unwrap()
}

pub fn get(path: &str) -> Request<Body> {
    Request::builder().uri(path).body(Body::empty()).unwrap()
}

pub fn authed(method: Method, path: &str, token: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(path)
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
