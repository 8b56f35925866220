//! Request handling and translation.
//!
//! # Responsibilities
//! - Derive the client key used by the rate limiter
//! - Translate an HTTP request (body, query, path captures, subject) into the
//!   JSON document sent to a backend
//!
//! # Design Decisions
//! - `X-Forwarded-For` is only trusted when configured; otherwise any client
//!   could pick its own rate-limit key
//! - Path captures and the verified subject override client-supplied fields

use std::net::SocketAddr;

use axum::http::HeaderMap;
use serde_json::{Map, Number, Value};
use thiserror::Error;

const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Rate-limit key for a request: the peer IP, or the first forwarded hop
/// when the gateway sits behind a trusted proxy.
pub fn client_key(headers: &HeaderMap, remote_addr: SocketAddr, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = headers
            .get(X_FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(first) = forwarded {
            return first.to_string();
        }
    }
    remote_addr.ip().to_string()
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid request body")]
pub struct InvalidBody;

/// Parse a request body into a JSON object. Empty bodies become `{}`.
pub fn parse_body(body: &[u8]) -> Result<Map<String, Value>, InvalidBody> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        _ => Err(InvalidBody),
    }
}

/// Integers and booleans travel typed; everything else stays a string.
pub fn typed_value(raw: &str) -> Value {
    if let Ok(n) = raw.parse::<i64>() {
        return Value::Number(Number::from(n));
    }
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(raw.to_string()),
    }
}

/// Fill fields from the query string that the body did not set.
pub fn merge_query(payload: &mut Map<String, Value>, query: Option<&str>) {
    let Some(query) = query else {
        return;
    };
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        if key.is_empty() {
            continue;
        }
        payload
            .entry(key.into_owned())
            .or_insert_with(|| typed_value(&value));
    }
}

/// Path captures always win over body and query.
pub fn merge_params(payload: &mut Map<String, Value>, params: &[(String, String)]) {
    for (name, value) in params {
        payload.insert(name.clone(), typed_value(value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use serde_json::json;

    #[test]
    fn test_client_key() {
        let peer: SocketAddr = "10.1.2.3:5000".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static("203.0.113.9, 10.0.0.1"));

        assert_eq!(client_key(&headers, peer, false), "10.1.2.3");
        assert_eq!(client_key(&headers, peer, true), "203.0.113.9");
        assert_eq!(client_key(&HeaderMap::new(), peer, true), "10.1.2.3");
    }

    #[test]
    fn test_parse_body() {
        assert_eq!(parse_body(b"").unwrap(), Map::new());
        assert_eq!(parse_body(b"  \n").unwrap(), Map::new());
        assert_eq!(parse_body(br#"{"a":1}"#).unwrap()["a"], json!(1));
        assert_eq!(parse_body(b"[1,2]"), Err(InvalidBody));
        assert_eq!(parse_body(b"{nope"), Err(InvalidBody));
    }

    #[test]
    fn test_merge_order() {
        let mut payload = parse_body(br#"{"name":"body","id":99}"#).unwrap();
        merge_query(&mut payload, Some("name=query&page=2&active=true&q=red%20shoes"));
        merge_params(&mut payload, &[("id".into(), "7".into())]);

        assert_eq!(
            Value::Object(payload),
            json!({"name": "body", "id": 7, "page": 2, "active": true, "q": "red shoes"})
        );
    }
}
