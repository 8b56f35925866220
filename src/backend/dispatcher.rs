//! Backend dispatcher.
//!
//! # Responsibilities
//! - Hold one transport per backend, created once at startup
//! - Invoke a route's operation with the request's deadline and metadata
//! - Abandon the call when the deadline passes or the request is cancelled
//!
//! # Design Decisions
//! - Exactly one call per request; nothing is retried
//! - An unknown backend name is reported as `unavailable`, the same as a
//!   backend that cannot be reached

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tokio::time::{sleep_until, Instant};

use crate::backend::error::{BackendError, BackendErrorKind};
use crate::backend::grpc::GrpcTransport;
use crate::backend::transport::{BackendCall, BackendTransport};
use crate::config::GatewayConfig;
use crate::http::context::RequestContext;
use crate::observability::metrics;
use crate::routing::RouteTarget;

#[derive(Debug, Error)]
pub enum DispatcherError {
    #[error("backend {name}: invalid address {address:?}: {source}")]
    Address {
        name: String,
        address: String,
        #[source]
        source: tonic::transport::Error,
    },
}

#[derive(Debug, Default)]
pub struct Dispatcher {
    transports: HashMap<String, Arc<dyn BackendTransport>>,
}

impl Dispatcher {
    pub fn new(transports: HashMap<String, Arc<dyn BackendTransport>>) -> Self {
        Self { transports }
    }

    /// One lazily-connected gRPC channel per configured backend.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, DispatcherError> {
        let mut transports: HashMap<String, Arc<dyn BackendTransport>> = HashMap::new();

        for backend in config.effective_backends() {
            let transport = GrpcTransport::connect_lazy(
                &backend.name,
                &backend.address,
                config.timeouts.backend_connect(),
                &config.internal_auth.token,
            )
            .map_err(|source| DispatcherError::Address {
                name: backend.name.clone(),
                address: backend.address.clone(),
                source,
            })?;

            tracing::info!(backend = %backend.name, address = %backend.address, "Backend registered");
            transports.insert(backend.name, Arc::new(transport));
        }

        Ok(Self { transports })
    }

    pub fn with_transport(mut self, name: impl Into<String>, transport: Arc<dyn BackendTransport>) -> Self {
        self.transports.insert(name.into(), transport);
        self
    }

    pub fn backends(&self) -> impl Iterator<Item = &str> {
        self.transports.keys().map(String::as_str)
    }

    /// Call the operation behind `target`.
    pub async fn dispatch(
        &self,
        target: &RouteTarget,
        ctx: &RequestContext,
        payload: Value,
    ) -> Result<Value, BackendError> {
        let RouteTarget::Backend { backend, operation } = target else {
            return Err(BackendError::new(
                BackendErrorKind::Unimplemented,
                "route has no backend operation",
            ));
        };

        let result = self.call(backend, operation, ctx, payload).await;

        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.kind.as_str(),
        };
        metrics::record_backend_call(backend, outcome);
        tracing::debug!(
            request_id = ctx.request_id().unwrap_or_default(),
            backend = %backend,
            operation = %operation,
            outcome,
            "Backend call finished"
        );

        result
    }

    async fn call(
        &self,
        backend: &str,
        operation: &str,
        ctx: &RequestContext,
        payload: Value,
    ) -> Result<Value, BackendError> {
        let Some(transport) = self.transports.get(backend) else {
            return Err(BackendError::unavailable(format!("unknown backend {}", backend)));
        };

        let now = Instant::now();
        let timeout = ctx.deadline.map(|d| d.saturating_duration_since(now));
        if timeout.is_some_and(|t| t.is_zero()) {
            return Err(BackendError::new(BackendErrorKind::DeadlineExceeded, "deadline passed before call"));
        }

        let call = BackendCall {
            operation,
            payload,
            request_id: ctx.request_id().unwrap_or_default(),
            timeout,
        };

        let deadline = async {
            match ctx.deadline {
                Some(deadline) => sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => {
                Err(BackendError::new(BackendErrorKind::Canceled, "request canceled"))
            }
            _ = deadline => {
                Err(BackendError::new(BackendErrorKind::DeadlineExceeded, "deadline exceeded"))
            }
            result = transport.call(call) => result,
        }
    }
}
