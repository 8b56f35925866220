//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (admit or reject per client key)
//!     → claims.rs (verify bearer credential, yield Claims)
//!     → Pass to authorization / dispatch
//! ```
//!
//! # Design Decisions
//! - Reject abusive clients before doing any token work
//! - Fail closed: a credential that cannot be verified never yields Claims
//! - No trust in client input

pub mod claims;
pub mod rate_limit;

pub use claims::{Claims, ClaimsError, ClaimsVerifier};
pub use rate_limit::{Decision, RateLimiter, VisitorRecord, VisitorStore};
