//! Integration tests for the gateway's HTTP surface.
//!
//! Tests use Axum's `Router` directly via `tower::ServiceExt` without
//! starting a TCP server.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use serde_json::Value;
use tavern_db::MemoryStore;
use tavern_server::{AppState, build_router};
use tavern_session::TokenResolver;
use tower::ServiceExt;

fn make_state() -> Arc<AppState<MemoryStore>> {
    Arc::new(AppState::new(
        Arc::new(MemoryStore::new()),
        TokenResolver::new(b"api-test-secret"),
    ))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_reports_ok() {
    let app = build_router(make_state());
    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["connections"], 0);
}

#[tokio::test]
async fn health_counts_open_connections() {
    let state = make_state();
    let (_conn, _outbox) = state.gateway.connect().await;
    let app = build_router(Arc::clone(&state));

    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(body_json(response).await["connections"], 1);
}

#[tokio::test]
async fn ws_without_upgrade_is_rejected() {
    let app = build_router(make_state());
    let response = app
        .oneshot(Request::get("/ws").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let app = build_router(make_state());
    let response = app
        .oneshot(Request::get("/api/lobbies").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cors_preflight_allows_any_origin() {
    let app = build_router(make_state());
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/health")
        .header(header::ORIGIN, "http://localhost:3000")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "*"
    );
}
