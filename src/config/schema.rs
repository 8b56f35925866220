//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the edge gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, body limit).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Bearer credential verification.
    pub auth: AuthConfig,

    /// Token shared between the gateway and its backends.
    pub internal_auth: InternalAuthConfig,

    /// Cross-origin policy.
    pub cors: CorsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Backend service definitions.
    pub backends: Vec<BackendConfig>,

    /// Route definitions. Empty means the built-in route table.
    pub routes: Vec<RouteConfig>,
}

impl GatewayConfig {
    /// Backends to connect, falling back to the four default services.
    pub fn effective_backends(&self) -> Vec<BackendConfig> {
        if self.backends.is_empty() {
            BackendConfig::defaults()
        } else {
            self.backends.clone()
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Largest request body accepted, in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_bytes: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Per-request deadline in milliseconds.
    pub request_ms: u64,

    /// How long in-flight requests may run after a shutdown signal.
    pub drain_secs: u64,

    /// Backend connection establishment timeout in seconds.
    pub backend_connect_secs: u64,
}

impl TimeoutConfig {
    pub fn request(&self) -> Duration {
        Duration::from_millis(self.request_ms)
    }

    pub fn drain(&self) -> Duration {
        Duration::from_secs(self.drain_secs)
    }

    pub fn backend_connect(&self) -> Duration {
        Duration::from_secs(self.backend_connect_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_ms: 30_000,
            drain_secs: 30,
            backend_connect_secs: 5,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Requests admitted per client within one window.
    pub requests: u32,

    /// Window length in seconds.
    pub window_secs: u64,

    /// How often idle visitor records are swept, in seconds.
    pub sweep_interval_secs: u64,

    /// Key clients by the first `X-Forwarded-For` entry instead of the peer address.
    pub trust_forwarded_for: bool,
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests: 100,
            window_secs: 60,
            sweep_interval_secs: 60,
            trust_forwarded_for: false,
        }
    }
}

/// Shipped default for `auth.jwt_secret`; only fit for local development.
pub const PLACEHOLDER_JWT_SECRET: &str = "your-secret-key-change-in-production";

/// Bearer token verification settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC secret used to verify HS256 tokens.
    pub jwt_secret: String,

    /// Clock skew tolerated on `exp`, in seconds.
    pub leeway_secs: u64,
}

impl AuthConfig {
    /// True while the shipped placeholder secret is still in use.
    pub fn uses_placeholder_secret(&self) -> bool {
        self.jwt_secret == PLACEHOLDER_JWT_SECRET
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: PLACEHOLDER_JWT_SECRET.to_string(),
            leeway_secs: 0,
        }
    }
}

/// Internal gateway-to-backend authentication.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct InternalAuthConfig {
    /// Sent as `x-internal-token` on every backend call. Empty disables the header.
    pub token: String,
}

/// Cross-origin resource sharing policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
    pub allow_credentials: bool,
    pub max_age_secs: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
            allowed_methods: ["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"]
                .iter()
                .map(|m| m.to_string())
                .collect(),
            allowed_headers: ["Accept", "Authorization", "Content-Type", "X-Request-ID"]
                .iter()
                .map(|h| h.to_string())
                .collect(),
            allow_credentials: true,
            max_age_secs: 86_400, // 24 hours
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human-readable or JSON log lines.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Backend service definition.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Unique backend identifier referenced by routes.
    pub name: String,

    /// Backend endpoint URL (e.g., "http://127.0.0.1:50051").
    pub address: String,
}

impl BackendConfig {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }

    /// The user, product, cart and order services on their conventional ports.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("user", "http://localhost:50051"),
            Self::new("product", "http://localhost:50052"),
            Self::new("cart", "http://localhost:50053"),
            Self::new("order", "http://localhost:50054"),
        ]
    }
}

/// Authentication level demanded by a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    #[default]
    Public,
    Optional,
    Authenticated,
}

/// Route configuration mapping an HTTP method and path to a backend operation.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Route identifier for logging/metrics.
    pub name: String,

    /// HTTP method (GET, POST, ...).
    pub method: String,

    /// Path pattern; `{name}` segments capture parameters.
    pub path: String,

    /// Credential requirement.
    #[serde(default)]
    pub auth: AuthMode,

    /// Roles allowed to call the route. Non-empty implies authentication.
    #[serde(default)]
    pub roles: Vec<String>,

    /// Backend name, or "local" for the built-in health endpoint.
    pub backend: String,

    /// Fully-qualified RPC path, e.g. "/user.v1.UserService/GetProfile".
    #[serde(default)]
    pub operation: String,

    /// Status returned on success.
    #[serde(default = "default_success_status")]
    pub success_status: u16,

    /// Payload field that receives the verified subject id.
    #[serde(default)]
    pub bind_subject: Option<String>,
}

fn default_success_status() -> u16 {
    200
}
