//! Fixed-window rate limiting keyed by client.
//!
//! # Responsibilities
//! - Count requests per client key inside a fixed window
//! - Admit or reject, reporting the remaining quota or a retry hint
//! - Periodically evict visitors that have gone quiet
//!
//! # Design Decisions
//! - `DashMap` shards the visitor table; each check holds only its key's
//!   shard lock for the read-modify-write, so concurrent requests from one
//!   client never lose updates and unrelated clients rarely contend.
//! - A key's window only resets when that key is seen again. Idle keys keep
//!   their stale window until the next access or the sweep.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::schema::RateLimitConfig;

/// Counter for one client key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisitorRecord {
    pub window_start: Instant,
    pub last_seen: Instant,
    pub count: u32,
}

impl VisitorRecord {
    fn new(now: Instant) -> Self {
        Self {
            window_start: now,
            last_seen: now,
            count: 0,
        }
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed { limit: u32, remaining: u32 },
    Limited { limit: u32, retry_after: Duration },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed { .. })
    }
}

/// Sharded map of visitor records.
#[derive(Debug, Default)]
pub struct VisitorStore {
    visitors: DashMap<String, VisitorRecord>,
}

impl VisitorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` against the record for `key` while holding its shard lock,
    /// creating the record if needed.
    pub fn with_record<R>(&self, key: &str, now: Instant, f: impl FnOnce(&mut VisitorRecord) -> R) -> R {
        let mut entry = self
            .visitors
            .entry(key.to_string())
            .or_insert_with(|| VisitorRecord::new(now));
        f(entry.value_mut())
    }

    pub fn get(&self, key: &str) -> Option<VisitorRecord> {
        self.visitors.get(key).map(|r| *r.value())
    }

    /// Drop records not seen for longer than `idle`. Returns how many were removed.
    pub fn evict_idle(&self, now: Instant, idle: Duration) -> usize {
        let before = self.visitors.len();
        self.visitors
            .retain(|_, record| now.saturating_duration_since(record.last_seen) <= idle);
        before.saturating_sub(self.visitors.len())
    }

    pub fn len(&self) -> usize {
        self.visitors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visitors.is_empty()
    }
}

/// Fixed-window admission policy over a [`VisitorStore`].
#[derive(Debug)]
pub struct RateLimiter {
    store: VisitorStore,
    limit: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            store: VisitorStore::new(),
            limit,
            window,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.requests, config.window())
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn store(&self) -> &VisitorStore {
        &self.store
    }

    pub fn check(&self, key: &str) -> Decision {
        self.check_at(key, Instant::now())
    }

    pub fn check_at(&self, key: &str, now: Instant) -> Decision {
        let (limit, window) = (self.limit, self.window);

        self.store.with_record(key, now, |record| {
            record.last_seen = now;

            let elapsed = now.saturating_duration_since(record.window_start);
            if elapsed > window {
                record.count = 0;
                record.window_start = now;
            }

            if record.count >= limit {
                let elapsed = now.saturating_duration_since(record.window_start);
                return Decision::Limited {
                    limit,
                    retry_after: window.saturating_sub(elapsed),
                };
            }

            record.count += 1;
            Decision::Allowed {
                limit,
                remaining: limit - record.count,
            }
        })
    }

    /// Remove visitors idle for longer than one window.
    pub fn sweep(&self, now: Instant) -> usize {
        self.store.evict_idle(now, self.window)
    }

    /// Sweep every `interval` until `shutdown` fires.
    pub async fn run_sweeper(self: Arc<Self>, interval: Duration, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let removed = self.sweep(Instant::now());
                    if removed > 0 {
                        tracing::debug!(removed, remaining = self.store.len(), "Swept idle visitors");
                    }
                }
            }
        }

        tracing::debug!("Rate limiter sweeper stopped");
    }
}

/// Whole seconds for a `Retry-After` header: rounded up, at least 1.
pub fn retry_after_secs(retry_after: Duration) -> u64 {
    let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
    secs.max(1)
}
