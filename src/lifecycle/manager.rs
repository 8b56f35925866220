//! Startup, serving and drain orchestration.
//!
//! # Responsibilities
//! - Build every shared service from configuration, failing fast
//! - Bind the listener, start the pipeline and the limiter sweep
//! - On termination: stop accepting, wait for in-flight work up to the drain
//!   timeout, force the rest, join background tasks
//!
//! # Design Decisions
//! - Listeners start last (traffic only when everything else is ready)
//! - Draining cancels the graceful token only; in-flight requests keep
//!   running until the drain timeout, and only then is the request root
//!   cancelled so they answer 503
//! - Any exit other than a clean drain is non-zero

use std::future::Future;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::backend::{Dispatcher, DispatcherError};
use crate::config::GatewayConfig;
use crate::http::{GatewayServices, HttpServer, Pipeline};
use crate::lifecycle::inflight::InflightTracker;
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::state::{LifecycleState, Phase};
use crate::routing::router::RouteError;
use crate::routing::table::effective_routes;
use crate::routing::RouteTable;
use crate::security::{ClaimsVerifier, RateLimiter};

/// Time allowed for cancelled requests to write their 503 before the server
/// task is aborted.
const FORCE_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid route table: {0}")]
    Routes(#[from] RouteError),

    #[error(transparent)]
    Backends(#[from] DispatcherError),
}

/// How the process came to a stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Every in-flight request finished within the drain timeout.
    Clean,
    /// The drain timeout elapsed and remaining requests were cancelled.
    Forced,
    /// The listener failed while serving.
    ListenerFailed,
}

impl DrainOutcome {
    pub fn exit_code(self) -> ExitCode {
        match self {
            DrainOutcome::Clean => ExitCode::SUCCESS,
            DrainOutcome::Forced | DrainOutcome::ListenerFailed => ExitCode::FAILURE,
        }
    }
}

pub struct LifecycleManager {
    config: GatewayConfig,
    services: GatewayServices,
    shutdown: Shutdown,
    state: LifecycleState,
}

impl LifecycleManager {
    /// Build all services, with one gRPC channel per configured backend.
    ///
    /// Must run inside a Tokio runtime.
    pub fn new(config: GatewayConfig) -> Result<Self, LifecycleError> {
        let dispatcher = Dispatcher::from_config(&config)?;
        Self::with_dispatcher(config, dispatcher)
    }

    /// Build all services around a ready-made dispatcher.
    pub fn with_dispatcher(config: GatewayConfig, dispatcher: Dispatcher) -> Result<Self, LifecycleError> {
        if config.auth.uses_placeholder_secret() {
            tracing::warn!(
                "auth.jwt_secret is the built-in placeholder; set JWT_SECRET before exposing the gateway"
            );
        }

        let routes = RouteTable::from_config(&effective_routes(&config))?;
        let shutdown = Shutdown::new();
        let state = LifecycleState::new();

        let services = GatewayServices {
            routes: Arc::new(routes),
            limiter: Arc::new(RateLimiter::from_config(&config.rate_limit)),
            verifier: Arc::new(ClaimsVerifier::from_config(&config.auth)),
            dispatcher: Arc::new(dispatcher),
            lifecycle: state.clone(),
            inflight: InflightTracker::new(),
            request_root: shutdown.request_root(),
        };

        tracing::info!(
            routes = services.routes.len(),
            backends = services.dispatcher.backends().count(),
            "Gateway services initialized"
        );

        Ok(Self {
            config,
            services,
            shutdown,
            state,
        })
    }

    pub fn shutdown(&self) -> Shutdown {
        self.shutdown.clone()
    }

    pub fn state(&self) -> LifecycleState {
        self.state.clone()
    }

    pub fn services(&self) -> &GatewayServices {
        &self.services
    }

    /// Bind the configured address.
    pub async fn bind(&self) -> Result<TcpListener, LifecycleError> {
        let address = &self.config.listener.bind_address;
        TcpListener::bind(address)
            .await
            .map_err(|source| LifecycleError::Bind {
                address: address.clone(),
                source,
            })
    }

    /// Serve on `listener` until `termination` resolves, [`Shutdown::trigger`]
    /// is called, or the listener fails; then drain.
    pub async fn run<F>(self, listener: TcpListener, termination: F) -> DrainOutcome
    where
        F: Future<Output = ()>,
    {
        let pipeline = Arc::new(Pipeline::standard(&self.config, &self.services));
        let server = HttpServer::new(pipeline);
        let graceful = self.shutdown.subscribe();
        let mut serve = tokio::spawn(server.run(listener, graceful.cancelled_owned()));

        let sweeper = self.config.rate_limit.enabled.then(|| {
            tokio::spawn(
                self.services
                    .limiter
                    .clone()
                    .run_sweeper(self.config.rate_limit.sweep_interval(), self.shutdown.subscribe()),
            )
        });

        self.state.advance(Phase::Running);

        let mut finished = None;
        tokio::select! {
            _ = termination => {}
            _ = self.shutdown.triggered() => {}
            result = &mut serve => finished = Some(result),
        }

        self.state.advance(Phase::Draining);
        self.shutdown.trigger();

        let drain = self.config.timeouts.drain();
        tracing::info!(
            inflight = self.services.inflight.active_count(),
            drain_timeout_secs = drain.as_secs(),
            "Draining"
        );

        let outcome = match finished {
            Some(result) => {
                report_listener(result);
                DrainOutcome::ListenerFailed
            }
            None => match tokio::time::timeout(drain, self.drain_inflight(&mut serve)).await {
                Ok(result) => {
                    if report_listener(result) {
                        DrainOutcome::ListenerFailed
                    } else {
                        DrainOutcome::Clean
                    }
                }
                Err(_) => {
                    self.force(&mut serve).await;
                    DrainOutcome::Forced
                }
            },
        };

        if let Some(sweeper) = sweeper {
            if let Err(e) = sweeper.await {
                tracing::error!(error = %e, "Rate limiter sweeper panicked");
            }
        }

        self.state.advance(Phase::Stopped);
        tracing::info!(outcome = ?outcome, "Shutdown complete");
        outcome
    }

    /// Wait for the pipeline to empty, then for the server task to close its
    /// connections.
    async fn drain_inflight(
        &self,
        serve: &mut JoinHandle<Result<(), std::io::Error>>,
    ) -> Result<Result<(), std::io::Error>, tokio::task::JoinError> {
        self.services.inflight.wait_idle().await;
        tracing::info!("In-flight requests finished");
        serve.await
    }

    async fn force(&self, serve: &mut JoinHandle<Result<(), std::io::Error>>) {
        tracing::warn!(
            inflight = self.services.inflight.active_count(),
            "Drain timeout elapsed; cancelling in-flight requests"
        );
        self.shutdown.force();

        if tokio::time::timeout(FORCE_GRACE, &mut *serve).await.is_err() {
            tracing::warn!("Connections still open after grace period; aborting server");
            serve.abort();
            let _ = serve.await;
        }
    }
}

/// Log how the server task ended. True if it failed.
fn report_listener(result: Result<Result<(), std::io::Error>, tokio::task::JoinError>) -> bool {
    match result {
        Ok(Ok(())) => false,
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Listener failed");
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "Server task ended abnormally");
            true
        }
    }
}
