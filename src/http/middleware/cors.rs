//! Cross-origin policy.
//!
//! Preflight `OPTIONS` requests are answered here with 204 before any
//! authentication or logging work; browsers send them without credentials.
//! Every other response is decorated on the way out.

use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::config::schema::CorsConfig;
use crate::http::context::RequestContext;
use crate::http::pipeline::{BoxFuture, Next, Stage};

#[derive(Debug, Clone)]
pub struct Cors {
    any_origin: bool,
    origins: Vec<String>,
    methods: Option<HeaderValue>,
    headers: Option<HeaderValue>,
    allow_credentials: bool,
    max_age: HeaderValue,
}

impl Cors {
    pub fn from_config(config: &CorsConfig) -> Self {
        Self {
            any_origin: config.allowed_origins.iter().any(|o| o == "*"),
            origins: config.allowed_origins.clone(),
            methods: join_header(&config.allowed_methods),
            headers: join_header(&config.allowed_headers),
            allow_credentials: config.allow_credentials,
            max_age: HeaderValue::from(config.max_age_secs),
        }
    }

    /// The `Access-Control-Allow-Origin` value for a request, if any.
    ///
    /// Listed origins are echoed back. A wildcard policy answers a literal
    /// `*`, which never carries credentials.
    fn allow_origin(&self, origin: Option<&HeaderValue>) -> Option<HeaderValue> {
        match origin {
            Some(origin) if self.is_listed(origin) => Some(origin.clone()),
            _ if self.any_origin => Some(HeaderValue::from_static("*")),
            _ => None,
        }
    }

    fn is_listed(&self, origin: &HeaderValue) -> bool {
        let Ok(value) = origin.to_str() else {
            return false;
        };
        self.origins
            .iter()
            .any(|allowed| allowed != "*" && allowed.eq_ignore_ascii_case(value))
    }

    fn decorate(&self, headers: &mut HeaderMap, origin: Option<&HeaderValue>) {
        let Some(allow) = self.allow_origin(origin) else {
            return;
        };
        let echoed = allow != "*";

        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, allow);
        if echoed {
            headers.append(header::VARY, HeaderValue::from_static("Origin"));
        }
        if self.allow_credentials && echoed {
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
        }
        if let Some(methods) = &self.methods {
            headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, methods.clone());
        }
        if let Some(allowed) = &self.headers {
            headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, allowed.clone());
        }
        headers.insert(header::ACCESS_CONTROL_MAX_AGE, self.max_age.clone());
    }
}

fn join_header(values: &[String]) -> Option<HeaderValue> {
    if values.is_empty() {
        return None;
    }
    HeaderValue::from_str(&values.join(", ")).ok()
}

impl Stage for Cors {
    fn name(&self) -> &'static str {
        "cors"
    }

    fn handle<'a>(&'a self, ctx: &'a mut RequestContext, next: Next<'a>) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let origin = ctx.headers.get(header::ORIGIN).cloned();

            if ctx.method == Method::OPTIONS {
                let mut response = StatusCode::NO_CONTENT.into_response();
                self.decorate(response.headers_mut(), origin.as_ref());
                return response;
            }

            let mut response = next.run(ctx).await;
            self.decorate(response.headers_mut(), origin.as_ref());
            response
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cors(origins: &[&str]) -> Cors {
        Cors::from_config(&CorsConfig {
            allowed_origins: origins.iter().map(|o| o.to_string()).collect(),
            ..CorsConfig::default()
        })
    }

    fn decorated(cors: &Cors, origin: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let origin = origin.map(|o| HeaderValue::from_str(o).unwrap());
        cors.decorate(&mut headers, origin.as_ref());
        headers
    }

    #[test]
    fn test_wildcard_never_grants_credentials() {
        let headers = decorated(&cors(&["*"]), Some("https://shop.example"));
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert!(headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).is_none());
        assert!(headers.get(header::VARY).is_none());
        assert_eq!(headers[header::ACCESS_CONTROL_MAX_AGE], "86400");
        assert_eq!(
            headers[header::ACCESS_CONTROL_ALLOW_METHODS],
            "GET, POST, PUT, PATCH, DELETE, OPTIONS"
        );

        let headers = decorated(&cors(&["*"]), None);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert!(headers.get(header::VARY).is_none());
    }

    #[test]
    fn test_listed_origins_only() {
        let policy = cors(&["https://shop.example"]);
        let headers = decorated(&policy, Some("https://shop.example"));
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "https://shop.example");
        assert_eq!(headers[header::VARY], "Origin");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");

        let headers = decorated(&policy, Some("https://evil.example"));
        assert!(headers.is_empty());
    }

    #[test]
    fn test_listed_origin_wins_over_wildcard() {
        let policy = cors(&["*", "https://shop.example"]);
        let headers = decorated(&policy, Some("https://shop.example"));
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "https://shop.example");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");

        let headers = decorated(&policy, Some("https://other.example"));
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert!(headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).is_none());
    }
}
