//! Drain behavior over real sockets.

use std::net::SocketAddr;
use std::time::Duration;

use edge_gateway::lifecycle::{DrainOutcome, LifecycleManager, Phase};
use tokio::net::TcpStream;

mod common;
use common::*;

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

async fn wait_for_start(backend: &ScriptedBackend) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while backend.started() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("request never reached the backend");
}

struct Running {
    addr: SocketAddr,
    manager_shutdown: edge_gateway::Shutdown,
    state: edge_gateway::lifecycle::LifecycleState,
    run: tokio::task::JoinHandle<DrainOutcome>,
}

async fn start(drain_secs: u64, backend: std::sync::Arc<ScriptedBackend>) -> Running {
    let mut config = test_config();
    config.timeouts.drain_secs = drain_secs;
    let manager = LifecycleManager::with_dispatcher(config, dispatcher_with(backend)).unwrap();
    let listener = manager.bind().await.unwrap();
    let addr = listener.local_addr().unwrap();
    let manager_shutdown = manager.shutdown();
    let state = manager.state();
    let run = tokio::spawn(manager.run(listener, std::future::pending()));

    Running {
        addr,
        manager_shutdown,
        state,
        run,
    }
}

#[tokio::test]
async fn test_serves_over_the_socket() {
    let gateway = start(5, ScriptedBackend::ok()).await;

    let response = client()
        .get(format!("http://{}/health", gateway.addr))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(gateway.state.phase(), Phase::Running);

    gateway.manager_shutdown.trigger();
    let outcome = gateway.run.await.unwrap();
    assert_eq!(outcome, DrainOutcome::Clean);
}

#[tokio::test]
async fn test_in_flight_request_finishes_during_drain() {
    let backend = ScriptedBackend::slow(Duration::from_millis(300));
    let gateway = start(5, backend.clone()).await;

    let url = format!("http://{}/api/v1/products", gateway.addr);
    let in_flight = tokio::spawn(async move { client().get(url).send().await });
    wait_for_start(&backend).await;

    gateway.manager_shutdown.trigger();

    // New connections are refused once draining has begun.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(TcpStream::connect(gateway.addr).await.is_err());
    assert_eq!(gateway.state.phase(), Phase::Draining);

    let response = in_flight.await.unwrap().unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["operation"], "/product.v1.ProductService/ListProducts");

    let outcome = tokio::time::timeout(Duration::from_secs(5), gateway.run)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(outcome, DrainOutcome::Clean);
    assert_eq!(backend.completed(), 1);
    assert_eq!(gateway.state.phase(), Phase::Stopped);
}

#[tokio::test]
async fn test_drain_timeout_cancels_stragglers() {
    let backend = ScriptedBackend::slow(Duration::from_secs(30));
    let gateway = start(0, backend.clone()).await;

    let url = format!("http://{}/api/v1/products", gateway.addr);
    let in_flight = tokio::spawn(async move { client().get(url).send().await });
    wait_for_start(&backend).await;

    gateway.manager_shutdown.trigger();

    let response = in_flight.await.unwrap().unwrap();
    assert_eq!(response.status(), 503);
    assert!(response.headers().contains_key("x-request-id"));

    let outcome = tokio::time::timeout(Duration::from_secs(5), gateway.run)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(outcome, DrainOutcome::Forced);
    assert_eq!(backend.completed(), 0);
}
