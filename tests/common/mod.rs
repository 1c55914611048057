//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, Response};
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use serde_json::{json, Value};
use site_guard::config::GuardConfig;
use site_guard::http::security_middleware;
use site_guard::store::{CounterStore, MemoryStore, StoreError};
use site_guard::SecurityGuard;
use tokio::net::TcpListener;
use tower::ServiceExt;

pub const ALLOWED_ORIGIN: &str = "https://site.example";

/// Config with proxy headers trusted so tests can choose client IPs.
pub fn test_config() -> GuardConfig {
    let mut config = GuardConfig::default();
    config.security.trust_proxy = true;
    config.cors.allowed_origins = vec![ALLOWED_ORIGIN.to_string()];
    config.observability.metrics_enabled = false;
    config
}

pub fn guard_with_store(config: GuardConfig, store: Arc<dyn CounterStore>) -> Arc<SecurityGuard> {
    Arc::new(SecurityGuard::new(config, store).unwrap())
}

pub fn guard(config: GuardConfig) -> Arc<SecurityGuard> {
    guard_with_store(config, Arc::new(MemoryStore::new()))
}

/// Site stand-in behind the guard. Pages echo what the guard forwarded.
pub fn app(guard: Arc<SecurityGuard>) -> Router {
    Router::new()
        .route("/", get(echo))
        .route("/dashboard", get(echo))
        .route("/api/contact", post(echo))
        .route("/api/data", get(echo))
        .route("/_next/static/app.js", get(|| async { "console.log(1)" }))
        .layer(middleware::from_fn_with_state(guard, security_middleware))
}

async fn echo(headers: HeaderMap, body: String) -> Json<Value> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    Json(json!({
        "nonce": header("x-nonce"),
        "request_id": header("x-request-id"),
        "body": body,
    }))
}

pub fn request(method: Method, uri: &str, client_ip: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("x-forwarded-for", client_ip)
        .body(Body::empty())
        .unwrap()
}

pub fn post_body(uri: &str, client_ip: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("x-forwarded-for", client_ip)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Blocks are written off the request path; wait for one to land.
pub async fn wait_until_blocked(guard: &SecurityGuard, identifier: &str) {
    for _ in 0..100 {
        if guard.detector().is_blocked(identifier).await.unwrap() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("{identifier} was never blocked");
}

/// A store whose every call fails.
pub struct FailingStore;

#[async_trait]
impl CounterStore for FailingStore {
    async fn incr(&self, _key: &str, _ttl: Duration) -> Result<u64, StoreError> {
        Err(StoreError::Backend("connection refused".into()))
    }

    async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::Backend("connection refused".into()))
    }

    async fn set_ex(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), StoreError> {
        Err(StoreError::Backend("connection refused".into()))
    }

    async fn del(&self, _key: &str) -> Result<bool, StoreError> {
        Err(StoreError::Backend("connection refused".into()))
    }
}

/// A store that never answers.
pub struct StalledStore;

#[async_trait]
impl CounterStore for StalledStore {
    async fn incr(&self, _key: &str, _ttl: Duration) -> Result<u64, StoreError> {
        std::future::pending().await
    }

    async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        std::future::pending().await
    }

    async fn set_ex(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), StoreError> {
        std::future::pending().await
    }

    async fn del(&self, _key: &str) -> Result<bool, StoreError> {
        std::future::pending().await
    }
}

/// Start an upstream site on an ephemeral port that echoes the headers it
/// received.
pub async fn start_echo_upstream() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().fallback(|headers: HeaderMap, body: String| async move {
        let headers: serde_json::Map<String, Value> = headers
            .iter()
            .map(|(k, v)| (k.to_string(), json!(v.to_str().unwrap_or_default())))
            .collect();
        Json(json!({ "headers": headers, "body": body }))
    });
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// An address with nothing listening on it.
pub async fn dead_address() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}
