//! Route lookup.
//!
//! # Responsibilities
//! - Store compiled route entries
//! - Look up the entry for a method and path
//! - Return the match with captured path parameters, or an explicit no-match
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) scan ordered by specificity (acceptable for typical route counts)

use std::sync::Arc;

use axum::http::{Method, StatusCode};
use thiserror::Error;

use crate::config::schema::{AuthMode, RouteConfig};
use crate::routing::matcher::PathPattern;
use crate::routing::table::LOCAL_BACKEND;

/// Error compiling the route table.
#[derive(Debug, Error)]
#[error("route {route:?}: {reason}")]
pub struct RouteError {
    pub route: String,
    pub reason: String,
}

/// Credential requirement of a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthLevel {
    /// No credential looked at.
    Public,
    /// Claims attached when a valid credential is present; never rejects.
    Optional,
    /// A valid credential is required.
    Authenticated,
    /// A valid credential whose role is in the set is required.
    Roles(Vec<String>),
}

impl AuthLevel {
    /// True when the authentication stage must reject requests without valid claims.
    pub fn requires_credential(&self) -> bool {
        matches!(self, AuthLevel::Authenticated | AuthLevel::Roles(_))
    }

    /// The allowed role set, when the route is role-gated.
    pub fn allowed_roles(&self) -> Option<&[String]> {
        match self {
            AuthLevel::Roles(roles) => Some(roles),
            _ => None,
        }
    }
}

/// What answers a matched route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteTarget {
    /// The gateway's own health endpoint.
    Health,
    /// A unary operation on a named backend.
    Backend { backend: String, operation: String },
}

/// A compiled route.
#[derive(Debug, Clone)]
pub struct RouteEntry {
    pub name: String,
    pub method: Method,
    pub pattern: PathPattern,
    pub auth: AuthLevel,
    pub target: RouteTarget,
    pub success_status: StatusCode,
    pub bind_subject: Option<String>,
}

impl RouteEntry {
    /// Compile one configured route.
    pub fn from_config(config: &RouteConfig) -> Result<Self, RouteError> {
        let error = |reason: String| RouteError {
            route: config.name.clone(),
            reason,
        };

        let method = Method::from_bytes(config.method.to_ascii_uppercase().as_bytes())
            .map_err(|_| error(format!("invalid method {:?}", config.method)))?;
        let pattern = PathPattern::parse(&config.path).map_err(error)?;
        let success_status = StatusCode::from_u16(config.success_status)
            .map_err(|_| error(format!("invalid status {}", config.success_status)))?;

        let auth = if !config.roles.is_empty() {
            AuthLevel::Roles(config.roles.clone())
        } else {
            match config.auth {
                AuthMode::Public => AuthLevel::Public,
                AuthMode::Optional => AuthLevel::Optional,
                AuthMode::Authenticated => AuthLevel::Authenticated,
            }
        };

        let target = if config.backend == LOCAL_BACKEND {
            RouteTarget::Health
        } else {
            RouteTarget::Backend {
                backend: config.backend.clone(),
                operation: config.operation.clone(),
            }
        };

        Ok(Self {
            name: config.name.clone(),
            method,
            pattern,
            auth,
            target,
            success_status,
            bind_subject: config.bind_subject.clone(),
        })
    }
}

/// A successful lookup.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub entry: Arc<RouteEntry>,
    pub params: Vec<(String, String)>,
}

/// Immutable table of compiled routes.
#[derive(Debug, Default)]
pub struct RouteTable {
    entries: Vec<Arc<RouteEntry>>,
}

impl RouteTable {
    /// Compile the configured routes.
    pub fn from_config(configs: &[RouteConfig]) -> Result<Self, RouteError> {
        let mut entries = configs
            .iter()
            .map(|c| RouteEntry::from_config(c).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;

        // Stable: equal specificity keeps configuration order.
        entries.sort_by(|a, b| b.pattern.specificity().cmp(&a.pattern.specificity()));

        tracing::debug!(routes = entries.len(), "Route table compiled");
        Ok(Self { entries })
    }

    /// Find the route for a method and path.
    pub fn lookup(&self, method: &Method, path: &str) -> Option<RouteMatch> {
        self.entries
            .iter()
            .filter(|entry| entry.method == *method)
            .find_map(|entry| {
                entry.pattern.captures(path).map(|params| RouteMatch {
                    entry: Arc::clone(entry),
                    params,
                })
            })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<RouteEntry>> {
        self.entries.iter()
    }
}
