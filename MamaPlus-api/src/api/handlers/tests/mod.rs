// Handler tests driving the full router with in-memory storage

mod clinical_flow_test;

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Duration;
use serde_json::{json, Value};
use tower::ServiceExt;

use mama_plus_domain::auth::TokenConfig;
use mama_plus_domain::scheduler::NoopReminderScheduler;
use mama_plus_domain::testing::in_memory_storage;

use crate::api::create_app;
use crate::config::AppVariant;
use crate::state::AppState;

pub(crate) async fn test_state() -> AppState {
    AppState::new(
        AppVariant::Database,
        in_memory_storage().await.unwrap(),
        TokenConfig::new("test-secret", "mama-plus-api", Duration::minutes(60)),
        Arc::new(NoopReminderScheduler),
    )
}

pub(crate) async fn test_app() -> Router {
    create_app(test_state().await).unwrap()
}

/// Send a request and decode the JSON body (Null when empty)
pub(crate) async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

/// Register an account and return its access token
pub(crate) async fn token_for(app: &Router, telephone: &str, role: &str) -> String {
    let (status, _) = send(
        app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({ "telephone": telephone, "password": "secret123", "role": role })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "telephone": telephone, "password": "secret123" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["access_token"].as_str().unwrap().to_string()
}
