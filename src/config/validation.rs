//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (routes reference existing backends)
//! - Validate value ranges (timeouts > 0, limits > 0, valid URLs)
//! - Detect conflicting routes
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use axum::http::Method;
use thiserror::Error;
use url::Url;

use crate::config::schema::GatewayConfig;
use crate::routing::matcher::PathPattern;
use crate::routing::table::{effective_routes, LOCAL_BACKEND};

/// Longest per-request deadline accepted: one hour.
pub const MAX_REQUEST_MS: u64 = 60 * 60 * 1000;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address {0:?} is not a socket address")]
    BindAddress(String),

    #[error("{0} must be greater than zero")]
    NotPositive(&'static str),

    #[error("{field} must be at most {max}")]
    TooLarge { field: &'static str, max: u64 },

    #[error("auth.jwt_secret must not be empty")]
    EmptySecret,

    #[error("backend {name:?} has invalid address {address:?}")]
    BackendAddress { name: String, address: String },

    #[error("backend {0:?} is defined more than once")]
    DuplicateBackend(String),

    #[error("route {route:?}: {reason}")]
    Route { route: String, reason: String },
}

fn route_error(route: &str, reason: impl Into<String>) -> ValidationError {
    ValidationError::Route {
        route: route.to_string(),
        reason: reason.into(),
    }
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }
    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::NotPositive("listener.max_body_bytes"));
    }
    if config.timeouts.request_ms == 0 {
        errors.push(ValidationError::NotPositive("timeouts.request_ms"));
    } else if config.timeouts.request_ms > MAX_REQUEST_MS {
        errors.push(ValidationError::TooLarge {
            field: "timeouts.request_ms",
            max: MAX_REQUEST_MS,
        });
    }
    if config.rate_limit.enabled {
        if config.rate_limit.requests == 0 {
            errors.push(ValidationError::NotPositive("rate_limit.requests"));
        }
        if config.rate_limit.window_secs == 0 {
            errors.push(ValidationError::NotPositive("rate_limit.window_secs"));
        }
        if config.rate_limit.sweep_interval_secs == 0 {
            errors.push(ValidationError::NotPositive("rate_limit.sweep_interval_secs"));
        }
    }
    if config.auth.jwt_secret.is_empty() {
        errors.push(ValidationError::EmptySecret);
    }

    let backends = config.effective_backends();
    let mut backend_names = HashSet::new();
    for backend in &backends {
        if !backend_names.insert(backend.name.as_str()) {
            errors.push(ValidationError::DuplicateBackend(backend.name.clone()));
        }
        let valid = Url::parse(&backend.address)
            .map(|url| matches!(url.scheme(), "http" | "https") && url.host().is_some())
            .unwrap_or(false);
        if !valid {
            errors.push(ValidationError::BackendAddress {
                name: backend.name.clone(),
                address: backend.address.clone(),
            });
        }
    }

    let mut seen = HashSet::new();
    for route in effective_routes(config) {
        let method = match Method::from_bytes(route.method.to_ascii_uppercase().as_bytes()) {
            Ok(method) => method,
            Err(_) => {
                errors.push(route_error(&route.name, format!("invalid method {:?}", route.method)));
                continue;
            }
        };
        if let Err(reason) = PathPattern::parse(&route.path) {
            errors.push(route_error(&route.name, reason));
        }
        if !seen.insert((method.clone(), route.path.clone())) {
            errors.push(route_error(&route.name, format!("duplicate {} {}", method, route.path)));
        }
        if route.backend != LOCAL_BACKEND {
            if !backend_names.contains(route.backend.as_str()) {
                errors.push(route_error(&route.name, format!("unknown backend {:?}", route.backend)));
            }
            if !route.operation.starts_with('/') || route.operation.matches('/').count() != 2 {
                errors.push(route_error(
                    &route.name,
                    format!("operation {:?} is not of the form /package.Service/Method", route.operation),
                ));
            }
        }
        if !(200..300).contains(&route.success_status) {
            errors.push(route_error(&route.name, "success_status must be 2xx"));
        }
        if route.roles.iter().any(|r| r.trim().is_empty()) {
            errors.push(route_error(&route.name, "roles must not contain empty names"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{AuthMode, BackendConfig, RouteConfig};

    fn route(name: &str, backend: &str) -> RouteConfig {
        RouteConfig {
            name: name.into(),
            method: "GET".into(),
            path: "/api/v1/things".into(),
            auth: AuthMode::Public,
            roles: Vec::new(),
            backend: backend.into(),
            operation: "/things.v1.ThingService/List".into(),
            success_status: 200,
            bind_subject: None,
        }
    }

    #[test]
    fn defaults_are_valid() {
        assert_eq!(validate_config(&GatewayConfig::default()), Ok(()));
    }

    #[test]
    fn request_timeout_is_bounded() {
        let mut config = GatewayConfig::default();
        config.timeouts.request_ms = u64::MAX;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::TooLarge {
                field: "timeouts.request_ms",
                max: MAX_REQUEST_MS,
            }]
        );

        config.timeouts.request_ms = MAX_REQUEST_MS;
        assert_eq!(validate_config(&config), Ok(()));
    }

    #[test]
    fn reports_every_problem() {
        let mut config = GatewayConfig::default();
        config.listener.bind_address = "nowhere".into();
        config.rate_limit.requests = 0;
        config.auth.jwt_secret.clear();
        config.backends = vec![
            BackendConfig::new("things", "not a url"),
            BackendConfig::new("things", "http://127.0.0.1:1"),
        ];
        config.routes = vec![route("a", "things"), route("b", "missing")];

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::BindAddress("nowhere".into())));
        assert!(errors.contains(&ValidationError::NotPositive("rate_limit.requests")));
        assert!(errors.contains(&ValidationError::EmptySecret));
        assert!(errors.contains(&ValidationError::DuplicateBackend("things".into())));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::BackendAddress { address, .. } if address == "not a url")));
        // "b" is both a duplicate of "a" and points at an unknown backend
        assert_eq!(
            errors
                .iter()
                .filter(|e| matches!(e, ValidationError::Route { route, .. } if route == "b"))
                .count(),
            2
        );
    }

    #[test]
    fn builtin_routes_need_default_backends() {
        let mut config = GatewayConfig::default();
        config.backends = vec![BackendConfig::new("user", "http://127.0.0.1:50051")];
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::Route { reason, .. } if reason.contains("\"product\""))));
    }
}
