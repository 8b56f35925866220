//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (manager.rs):
//!     Config → Routes, limiter, verifier, backend channels → Bind listener
//!
//! Running:
//!     Pipeline serves; limiter sweep runs; inflight.rs counts requests
//!
//! Drain (manager.rs, shutdown.rs):
//!     Signal received → Stop accepting → Wait for in-flight (bounded)
//!     → Force-cancel leftovers → Join background tasks → Stopped
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then services, then listeners
//! - Ordered shutdown: stop accept, drain, close
//! - Shutdown has timeout: forced cancellation after the deadline

pub mod inflight;
pub mod manager;
pub mod shutdown;
pub mod signals;
pub mod state;

pub use inflight::{InflightGuard, InflightTracker};
pub use manager::{DrainOutcome, LifecycleError, LifecycleManager};
pub use shutdown::Shutdown;
pub use signals::wait_for_termination;
pub use state::{LifecycleState, Phase};
