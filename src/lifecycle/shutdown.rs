//! Shutdown coordination for the gateway.

use tokio_util::sync::CancellationToken;

/// Coordinator for graceful shutdown.
///
/// Two tokens:
/// - the graceful token, cancelled when draining starts; observed by the
///   listener and background tasks such as the limiter sweep
/// - the request root, parent of every request's token; cancelled only when
///   the drain timeout runs out, so in-flight requests answer 503
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    graceful: CancellationToken,
    requests: CancellationToken,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Token observed by long-running tasks.
    pub fn subscribe(&self) -> CancellationToken {
        self.graceful.child_token()
    }

    /// Parent token for per-request cancellation.
    pub fn request_root(&self) -> CancellationToken {
        self.requests.clone()
    }

    /// Begin draining.
    pub fn trigger(&self) {
        if !self.graceful.is_cancelled() {
            tracing::info!("Shutdown triggered");
        }
        self.graceful.cancel();
    }

    /// Resolve when draining has been requested.
    pub async fn triggered(&self) {
        self.graceful.cancelled().await
    }

    /// Cancel every in-flight request.
    pub fn force(&self) {
        self.trigger();
        self.requests.cancel();
    }
}
