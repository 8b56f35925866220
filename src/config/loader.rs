//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::{BackendConfig, GatewayConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {value:?}")]
    Env { key: &'static str, value: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: GatewayConfig = toml::from_str(&content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Resolve the effective configuration: file (or defaults), then process
/// environment overrides, then validation.
pub fn load(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => GatewayConfig::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    tracing::debug!(path = ?path, "Configuration resolved");
    Ok(config)
}

/// Apply the environment variables the deployment manifests set.
///
/// `lookup` is injected so tests need not touch the process environment.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(port) = get("APP_PORT") {
        let port: u16 = parse_env("APP_PORT", &port)?;
        let host = config
            .listener
            .bind_address
            .rsplit_once(':')
            .map(|(host, _)| host.to_string())
            .unwrap_or_else(|| "0.0.0.0".to_string());
        config.listener.bind_address = format!("{}:{}", host, port);
    }
    if let Some(secret) = get("JWT_SECRET") {
        config.auth.jwt_secret = secret;
    }
    if let Some(token) = get("INTERNAL_AUTH_TOKEN") {
        config.internal_auth.token = token;
    }
    if let Some(requests) = get("RATE_LIMIT_REQUESTS") {
        config.rate_limit.requests = parse_env("RATE_LIMIT_REQUESTS", &requests)?;
    }
    if let Some(window) = get("RATE_LIMIT_WINDOW_SECONDS") {
        config.rate_limit.window_secs = parse_env("RATE_LIMIT_WINDOW_SECONDS", &window)?;
    }
    if let Some(timeout) = get("REQUEST_TIMEOUT_MS") {
        config.timeouts.request_ms = parse_env("REQUEST_TIMEOUT_MS", &timeout)?;
    }

    let service_urls = [
        ("user", "USER_SERVICE_URL"),
        ("product", "PRODUCT_SERVICE_URL"),
        ("cart", "CART_SERVICE_URL"),
        ("order", "ORDER_SERVICE_URL"),
    ];
    for (name, key) in service_urls {
        if let Some(url) = get(key) {
            if config.backends.is_empty() {
                config.backends = BackendConfig::defaults();
            }
            let address = if url.contains("://") { url } else { format!("http://{}", url) };
            match config.backends.iter_mut().find(|b| b.name == name) {
                Some(backend) => backend.address = address,
                None => config.backends.push(BackendConfig::new(name, address)),
            }
        }
    }

    Ok(())
}

fn parse_env<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Env {
        key,
        value: value.to_string(),
    })
}
