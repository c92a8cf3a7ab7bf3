use std::time::Duration as StdDuration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use chrono::Duration;
use serde_json::{json, Value};
use tower::ServiceExt;

use mama_plus_api::{build_state, create_app, lifecycle, AppConfig, StorageKind};
use mama_plus_domain::auth::TokenConfig;
use mama_plus_domain::scheduler::SchedulerConfig;

// Initialize tracing once for all tests
static INIT: std::sync::Once = std::sync::Once::new();
fn initialize() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("info")
            .with_test_writer()
            .try_init();
    });
}

// Helper function to get body bytes from a response
async fn get_body_bytes(response: axum::response::Response) -> Vec<u8> {
    let body = response.into_body();
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    bytes.to_vec()
}

fn csv_config(dir: &std::path::Path, scheduler_enabled: bool) -> AppConfig {
    AppConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        storage: StorageKind::Csv { dir: dir.to_path_buf() },
        scheduler: SchedulerConfig {
            enabled: scheduler_enabled,
            interval: StdDuration::from_secs(3600),
            lead_hours: 48,
        },
        tokens: TokenConfig::new("test-secret", "mama-plus-api", Duration::minutes(60)),
    }
}

#[tokio::test]
async fn test_csv_variant_root_and_health() {
    initialize();
    let dir = tempfile::tempdir().unwrap();
    let state = build_state(&csv_config(dir.path(), false)).await.unwrap();
    let app = create_app(state).unwrap();

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let root: Value = serde_json::from_slice(&get_body_bytes(response).await).unwrap();
    assert_eq!(root["message"], "Bienvenue sur l'API MAMA+ (Version CSV)");
    assert_eq!(root["version"], "2.0.0");
    assert_eq!(root["storage"], "CSV");
    assert!(root["note"].as_str().unwrap().contains("CSV"));

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let health: Value = serde_json::from_slice(&get_body_bytes(response).await).unwrap();
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["storage"], "CSV");
}

#[tokio::test]
async fn test_csv_variant_serves_domain_routers() {
    initialize();
    let dir = tempfile::tempdir().unwrap();
    let app = create_app(build_state(&csv_config(dir.path(), false)).await.unwrap()).unwrap();

    let register = Request::builder()
        .method("POST")
        .uri("/api/auth/register")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "telephone": "76000001", "password": "secret123", "role": "professionnel" }).to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(register).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let login = Request::builder()
        .method("POST")
        .uri("/api/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "telephone": "76 00 00 01", "password": "secret123" }).to_string()))
        .unwrap();
    let response = app.clone().oneshot(login).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_slice(&get_body_bytes(response).await).unwrap();
    let token = body["access_token"].as_str().unwrap().to_string();
    assert_eq!(body["token_type"], "bearer");

    let stats = Request::builder()
        .uri("/api/dashboard/stats")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(stats).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let stats: Value = serde_json::from_slice(&get_body_bytes(response).await).unwrap();
    assert_eq!(stats["total_patientes"], 0);

    // Accounts are persisted as CSV files in the data directory.
    assert!(dir.path().join("users.csv").exists());
}

#[tokio::test]
async fn test_scheduler_lifecycle_with_real_scheduler() {
    initialize();
    let dir = tempfile::tempdir().unwrap();
    let state = build_state(&csv_config(dir.path(), true)).await.unwrap();

    assert!(lifecycle::on_startup(state.scheduler.as_ref()).await);
    assert!(state.scheduler.status().await.running);

    let app = create_app(state.clone()).unwrap();
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert!(lifecycle::on_shutdown(state.scheduler.as_ref()).await);
    assert!(!state.scheduler.status().await.running);
}

#[tokio::test]
async fn test_unwritable_csv_directory_is_fatal() {
    initialize();
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, "x").unwrap();

    let result = build_state(&csv_config(&blocker.join("csv"), false)).await;
    assert!(result.is_err());
}
