//! In-flight request tracking.
//!
//! # Responsibilities
//! - Count requests currently inside the pipeline
//! - Let the drain sequence report and wait for outstanding work
//! - Publish the count as a gauge

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

use crate::observability::metrics;

/// Global counter for request sequence numbers.
/// Relaxed ordering is enough; only uniqueness matters.
static REQUEST_SEQ: AtomicU64 = AtomicU64::new(1);

/// Tracks in-flight requests for graceful shutdown.
///
/// A watch channel carries the current count so waiters wake on change
/// instead of polling.
#[derive(Debug, Clone)]
pub struct InflightTracker {
    active: Arc<watch::Sender<u64>>,
}

impl InflightTracker {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self { active: Arc::new(tx) }
    }

    /// Record a new in-flight request. The guard decrements on drop.
    pub fn track(&self) -> InflightGuard {
        let mut now = 0;
        self.active.send_modify(|count| {
            *count += 1;
            now = *count;
        });
        metrics::set_inflight(now as usize);

        InflightGuard {
            active: Arc::clone(&self.active),
            seq: REQUEST_SEQ.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn active_count(&self) -> u64 {
        *self.active.borrow()
    }

    /// Resolve once no request is in flight.
    pub async fn wait_idle(&self) {
        let mut rx = self.active.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|count| *count == 0).await;
    }
}

impl Default for InflightTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrements the in-flight count when dropped.
#[derive(Debug)]
pub struct InflightGuard {
    active: Arc<watch::Sender<u64>>,
    seq: u64,
}

impl InflightGuard {
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        let mut now = 0;
        self.active.send_modify(|count| {
            *count = count.saturating_sub(1);
            now = *count;
        });
        metrics::set_inflight(now as usize);
        tracing::trace!(seq = self.seq, "Request left pipeline");
    }
}
