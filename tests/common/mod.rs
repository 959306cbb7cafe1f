//! Shared setup for integration tests

#![allow(dead_code)]

use axum::body::Body;
use axum::Router;
use dispatch::eta::EtaClient;
use dispatch::AppState;
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use tower::ServiceExt;

pub async fn setup_state(eta: Option<EtaClient>) -> Arc<AppState> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    AppState::with_eta(pool, eta)
}

pub async fn setup_app(eta: Option<EtaClient>) -> (Router, Arc<AppState>) {
    let state = setup_state(eta).await;
    (dispatch::api::router(state.clone()), state)
}

/// Send a request and return the status with the JSON body (Null when empty)
pub async fn send(
    app: &Router,
    request: hyper::Request<Body>,
) -> (hyper::StatusCode, serde_json::Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, body)
}

pub fn announce(body: serde_json::Value) -> hyper::Request<Body> {
    hyper::Request::builder()
        .method("POST")
        .uri("/announce-delay")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get(uri: &str) -> hyper::Request<Body> {
    hyper::Request::builder()
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}
