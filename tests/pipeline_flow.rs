//! End-to-end behavior of the standard pipeline over scripted backends.

use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::json;

use edge_gateway::backend::{BackendError, BackendErrorKind};
use edge_gateway::config::{AuthMode, RouteConfig};
use edge_gateway::lifecycle::Phase;

mod common;
use common::*;

#[tokio::test]
async fn test_every_response_carries_request_id() {
    let h = harness(&test_config(), ScriptedBackend::ok());

    let responses = vec![
        h.pipeline.handle(get("/health"), peer()).await,
        h.pipeline.handle(get("/no/such/route"), peer()).await,
        h.pipeline.handle(get("/api/v1/cart"), peer()).await,
        h.pipeline
            .handle(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/api/v1/cart")
                    .body(Body::empty())
                    .unwrap(),
                peer(),
            )
            .await,
    ];
    for response in responses {
        let id = response.headers()["x-request-id"].to_str().unwrap();
        assert!(!id.is_empty(), "status {}", response.status());
    }

    let supplied = Request::builder()
        .uri("/health")
        .header("x-request-id", "client-chosen-id")
        .body(Body::empty())
        .unwrap();
    let response = h.pipeline.handle(supplied, peer()).await;
    assert_eq!(response.headers()["x-request-id"], "client-chosen-id");
}

#[tokio::test]
async fn test_health_route() {
    let h = harness(&test_config(), ScriptedBackend::ok());

    let response = h.pipeline.handle(get("/api/v1/health"), peer()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({"status": "healthy", "service": "api-gateway"})
    );

    h.lifecycle.advance(Phase::Running);
    h.lifecycle.advance(Phase::Draining);
    let response = h.pipeline.handle(get("/health"), peer()).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(response).await["message"], "draining");
}

#[tokio::test]
async fn test_role_gated_route_401_before_403() {
    let backend = ScriptedBackend::ok();
    let h = harness(&test_config(), backend.clone());

    let response = h.pipeline.handle(get("/api/v1/users/search"), peer()).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_json(response).await,
        json!({"error": "Unauthorized", "message": "missing authorization header", "code": 401})
    );

    let customer = token(7, "customer");
    let response = h
        .pipeline
        .handle(authed(Method::GET, "/api/v1/users/search", &customer, ""), peer())
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["message"], "insufficient permissions");

    let admin = token(1, "admin");
    let response = h
        .pipeline
        .handle(authed(Method::GET, "/api/v1/users/search?q=ann", &admin, ""), peer())
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(backend.started(), 1);
}

#[tokio::test]
async fn test_bad_credentials_are_401() {
    let h = harness(&test_config(), ScriptedBackend::ok());

    let bad_scheme = Request::builder()
        .uri("/api/v1/cart")
        .header("authorization", "Basic abc")
        .body(Body::empty())
        .unwrap();
    let response = h.pipeline.handle(bad_scheme, peer()).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["message"], "invalid authorization header format");

    let response = h
        .pipeline
        .handle(authed(Method::GET, "/api/v1/cart", "not.a.jwt", ""), peer())
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["message"], "invalid or expired token");
}

#[tokio::test(start_paused = true)]
async fn test_timeout_yields_single_504_and_abandons_backend() {
    let mut config = test_config();
    config.timeouts.request_ms = 1;
    let backend = ScriptedBackend::slow(Duration::from_millis(50));
    let h = harness(&config, backend.clone());

    let response = h.pipeline.handle(get("/api/v1/products"), peer()).await;
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body_json(response).await["code"], 504);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(backend.started(), 1);
    assert_eq!(backend.completed(), 0);
}

#[tokio::test]
async fn test_backend_not_found_is_404_with_safe_message() {
    let backend = ScriptedBackend::failing(BackendError::new(
        BackendErrorKind::NotFound,
        "sql: no rows in result set (products.id=42)",
    ));
    let h = harness(&test_config(), backend);

    let response = h.pipeline.handle(get("/api/v1/products/by-id?id=42"), peer()).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["message"], "resource not found");
    assert!(!body.to_string().contains("sql"));
}

#[tokio::test]
async fn test_backend_unauthenticated_is_normalized() {
    let backend = ScriptedBackend::failing(BackendError::new(
        BackendErrorKind::Unauthenticated,
        "x-internal-token mismatch",
    ));
    let h = harness(&test_config(), backend);

    let response = h.pipeline.handle(get("/api/v1/products"), peer()).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["message"], "authentication required");
}

#[tokio::test]
async fn test_rate_limit_headers_and_429() {
    let mut config = test_config();
    config.rate_limit.requests = 3;
    config.rate_limit.window_secs = 60;
    let h = harness(&config, ScriptedBackend::ok());

    for remaining in ["2", "1", "0"] {
        let response = h.pipeline.handle(get("/api/v1/products"), peer()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-ratelimit-limit"], "3");
        assert_eq!(response.headers()["x-ratelimit-remaining"], remaining);
    }

    let response = h.pipeline.handle(get("/api/v1/products"), peer()).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()["x-ratelimit-remaining"], "0");
    let retry_after: u64 = response.headers()["retry-after"].to_str().unwrap().parse().unwrap();
    assert!((1..=60).contains(&retry_after));
    assert!(response.headers().contains_key("x-request-id"));

    // Another client is unaffected.
    let other = "198.51.100.1:1234".parse().unwrap();
    let response = h.pipeline.handle(get("/api/v1/products"), other).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_rate_limit_precedes_authentication() {
    let mut config = test_config();
    config.rate_limit.requests = 1;
    let h = harness(&config, ScriptedBackend::ok());

    let first = h.pipeline.handle(get("/api/v1/cart"), peer()).await;
    assert_eq!(first.status(), StatusCode::UNAUTHORIZED);
    let second = h.pipeline.handle(get("/api/v1/cart"), peer()).await;
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_cors_preflight_skips_auth() {
    let h = harness(&test_config(), ScriptedBackend::ok());

    let preflight = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/v1/users/search")
        .header("origin", "https://shop.example")
        .header("access-control-request-method", "GET")
        .body(Body::empty())
        .unwrap();
    let response = h.pipeline.handle(preflight, peer()).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
    assert!(!response.headers().contains_key("access-control-allow-credentials"));
    assert_eq!(response.headers()["access-control-max-age"], "86400");

    let mut config = test_config();
    config.cors.allowed_origins = vec!["https://shop.example".into()];
    let h = harness(&config, ScriptedBackend::ok());
    let response = h
        .pipeline
        .handle(
            Request::builder()
                .uri("/health")
                .header("origin", "https://shop.example")
                .body(Body::empty())
                .unwrap(),
            peer(),
        )
        .await;
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "https://shop.example"
    );
    assert_eq!(response.headers()["access-control-allow-credentials"], "true");
}

#[tokio::test]
async fn test_panic_is_contained() {
    let h = harness(&test_config(), ScriptedBackend::panicking());

    let response = h.pipeline.handle(get("/api/v1/products"), peer()).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.headers().contains_key("x-request-id"));
    let body = body_json(response).await;
    assert_eq!(body["message"], "an unexpected error occurred");
    assert!(!body.to_string().contains("blew up"));

    // The pipeline keeps serving.
    let response = h.pipeline.handle(get("/health"), peer()).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_invalid_body_is_400() {
    let backend = ScriptedBackend::ok();
    let h = harness(&test_config(), backend.clone());

    for body in ["{not json", "[1, 2, 3]", "\"text\""] {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/users/login")
            .body(Body::from(body))
            .unwrap();
        let response = h.pipeline.handle(request, peer()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", body);
        assert_eq!(body_json(response).await["message"], "invalid request body");
    }
    assert_eq!(backend.started(), 0);
}

#[tokio::test]
async fn test_oversized_body_is_413() {
    let mut config = test_config();
    config.listener.max_body_bytes = 16;
    let h = harness(&config, ScriptedBackend::ok());

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/users/login")
        .body(Body::from(format!(r#"{{"email":"{}"}}"#, "a".repeat(64))))
        .unwrap();
    let response = h.pipeline.handle(request, peer()).await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let h = harness(&test_config(), ScriptedBackend::ok());
    let response = h.pipeline.handle(get("/api/v2/anything"), peer()).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["message"], "route not found");
}

#[tokio::test]
async fn test_subject_binding_and_created_status() {
    let backend = ScriptedBackend::ok();
    let h = harness(&test_config(), backend.clone());
    let customer = token(42, "customer");

    let response = h
        .pipeline
        .handle(
            authed(
                Method::POST,
                "/api/v1/orders/create",
                &customer,
                r#"{"user_id": 1, "items": [{"product_id": 3, "quantity": 2}]}"#,
            ),
            peer(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let call = backend.last_call().unwrap();
    assert_eq!(call.operation, "/order.v1.OrderService/CreateOrder");
    assert_eq!(call.payload["user_id"], 42);
    assert_eq!(call.payload["items"][0]["quantity"], 2);
    assert!(!call.request_id.is_empty());
    assert!(call.timeout.is_some());
}

fn configured_route(name: &str, path: &str, auth: AuthMode, bind_subject: Option<&str>) -> RouteConfig {
    RouteConfig {
        name: name.into(),
        method: "GET".into(),
        path: path.into(),
        auth,
        roles: Vec::new(),
        backend: "product".into(),
        operation: "/product.v1.ProductService/GetProductByID".into(),
        success_status: 200,
        bind_subject: bind_subject.map(str::to_string),
    }
}

#[tokio::test]
async fn test_optional_route_ignores_bad_credentials() {
    let mut config = test_config();
    config.routes = vec![configured_route("product", "/v2/products/{id}", AuthMode::Optional, None)];
    let backend = ScriptedBackend::ok();
    let h = harness(&config, backend.clone());

    let response = h.pipeline.handle(get("/v2/products/17"), peer()).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = h
        .pipeline
        .handle(authed(Method::GET, "/v2/products/17", "garbage", ""), peer())
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(backend.started(), 2);
}

#[tokio::test]
async fn test_path_params_override_query_and_subject_is_bound() {
    let mut config = test_config();
    config.routes = vec![configured_route(
        "my-product",
        "/v2/me/products/{id}",
        AuthMode::Authenticated,
        Some("viewer_id"),
    )];
    let backend = ScriptedBackend::ok();
    let h = harness(&config, backend.clone());

    let viewer = token(5, "customer");
    let response = h
        .pipeline
        .handle(
            authed(
                Method::GET,
                "/v2/me/products/17?id=99&currency=EUR&viewer_id=1",
                &viewer,
                "",
            ),
            peer(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let call = backend.last_call().unwrap();
    assert_eq!(call.payload, json!({"id": 17, "currency": "EUR", "viewer_id": 5}));
    assert_eq!(body_json(response).await["echo"]["id"], 17);
}
