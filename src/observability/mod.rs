//! Logs and metrics.
//!
//! `logging` installs the global subscriber once at startup; `metrics` wraps
//! the `metrics` facade with the gateway's metric names and, when enabled,
//! serves them for Prometheus to scrape. Every access log line and backend
//! call log carries the request id.

pub mod logging;
pub mod metrics;
