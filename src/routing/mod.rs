//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path)
//!     → router.rs (route lookup)
//!     → matcher.rs (evaluate path pattern, capture params)
//!     → Return: RouteMatch or None
//!
//! Route Compilation (at startup):
//!     RouteConfig[] (configured or table.rs built-ins)
//!     → Parse patterns, resolve auth level and target
//!     → Sort by specificity
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path
//! - Deterministic: same input always matches same route
//! - First match wins (literal segments before captures)

pub mod matcher;
pub mod router;
pub mod table;

pub use router::{AuthLevel, RouteEntry, RouteMatch, RouteTable, RouteTarget};
