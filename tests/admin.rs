//! Admin API: auth and block management.

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::json;
use site_guard::admin::{setup_admin_router, AdminState};

mod common;
use common::*;

const KEY: &str = "test-admin-key";

fn admin_app() -> (Router, std::sync::Arc<site_guard::SecurityGuard>) {
    let mut config = test_config();
    config.admin.api_key = KEY.to_string();
    let guard = guard(config);
    (setup_admin_router(AdminState::new(guard.clone())), guard)
}

fn admin_request(method: Method, uri: &str, body: Option<serde_json::Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {KEY}"));
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

#[tokio::test]
async fn test_requires_bearer_key() {
    let (app, _) = admin_app();

    let response = send(
        &app,
        Request::builder().uri("/admin/status").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = send(
        &app,
        Request::builder()
            .uri("/admin/status")
            .header("authorization", "Bearer wrong")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = send(&app, admin_request(Method::GET, "/admin/status", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["mode"], "secure");
    assert_eq!(body["signatures"][0], "sql_injection");
}

#[tokio::test]
async fn test_block_lifecycle() {
    let (app, guard) = admin_app();
    let uri = "/admin/blocks/203.0.113.99";

    let body = body_json(send(&app, admin_request(Method::GET, uri, None)).await).await;
    assert_eq!(body["blocked"], false);

    let response = send(
        &app,
        admin_request(
            Method::POST,
            uri,
            Some(json!({ "duration_secs": 600, "reason": "scraping" })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert!(guard.detector().is_blocked("203.0.113.99").await.unwrap());

    let body = body_json(send(&app, admin_request(Method::GET, uri, None)).await).await;
    assert_eq!(body["blocked"], true);
    assert_eq!(body["entry"]["reason"], "scraping");

    let body = body_json(send(&app, admin_request(Method::DELETE, uri, None)).await).await;
    assert_eq!(body["removed"], true);
    assert!(!guard.detector().is_blocked("203.0.113.99").await.unwrap());
}

#[tokio::test]
async fn test_zero_duration_rejected() {
    let (app, _) = admin_app();
    let response = send(
        &app,
        admin_request(
            Method::POST,
            "/admin/blocks/203.0.113.98",
            Some(json!({ "duration_secs": 0 })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
