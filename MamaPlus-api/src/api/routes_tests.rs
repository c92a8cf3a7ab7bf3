#[cfg(test)]
mod api_routes_tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
        routing::get,
        Router,
    };
    use chrono::Duration;
    use tower::ServiceExt;

    use mama_plus_domain::auth::TokenConfig;
    use mama_plus_domain::scheduler::ReminderScheduler;
    use mama_plus_domain::testing::{failing_scheduler, in_memory_storage, panicking_scheduler};

    use crate::api::routes::default_registry;
    use crate::api::{create_app, RouterRegistry, ShellError};
    use crate::config::AppVariant;
    use crate::lifecycle;
    use crate::state::AppState;

    const BODY_SIZE_LIMIT: usize = 1024 * 1024;

    async fn state_with(scheduler: Arc<dyn ReminderScheduler>) -> AppState {
        AppState::new(
            AppVariant::Database,
            in_memory_storage().await.unwrap(),
            TokenConfig::new("test-secret", "mama-plus-api", Duration::minutes(60)),
            scheduler,
        )
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::builder().uri(uri).method("GET").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), BODY_SIZE_LIMIT).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[test]
    fn test_default_registry_mounts_every_router() {
        let registry = default_registry().unwrap();
        assert_eq!(
            registry.prefixes(),
            vec![
                "/api/auth",
                "/api/patientes",
                "/api/cpn",
                "/api/consultations",
                "/api/vaccinations",
                "/api/dashboard",
                "/api/chatbot",
                "/api/prediction",
                "/api/scheduler",
            ]
        );
        assert_eq!(registry.tags()[2], "Antenatal Consultations");
        assert_eq!(registry.routes()[8], ("/api/scheduler", "Scheduler"));
    }

    #[test]
    fn test_duplicate_prefix_is_rejected() {
        let result = RouterRegistry::new()
            .mount("/api/cpn", "CPN", Router::new())
            .unwrap()
            .mount("/api/cpn", "Other", Router::new());
        assert_eq!(result.err(), Some(ShellError::DuplicatePrefix("/api/cpn".to_string())));
    }

    #[test]
    fn test_invalid_prefixes_are_rejected() {
        for prefix in ["api/cpn", "/api/cpn/", "/"] {
            let result = RouterRegistry::new().mount(prefix, "CPN", Router::new());
            assert_eq!(result.err(), Some(ShellError::InvalidPrefix(prefix.to_string())));
        }
    }

    #[tokio::test]
    async fn test_custom_registry_router_is_served() {
        let registry = RouterRegistry::new()
            .mount("/api/ping", "Ping", Router::new().route("/", get(|| async { "pong" })))
            .unwrap();
        let state = state_with(Arc::new(mama_plus_domain::scheduler::NoopReminderScheduler)).await;
        let app = crate::api::routes::build_app(state, registry);

        let request = Request::builder().uri("/api/ping").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), BODY_SIZE_LIMIT).await.unwrap();
        assert_eq!(&body[..], b"pong");
    }

    #[tokio::test]
    async fn test_cors_preflight_mirrors_origin_with_credentials() {
        let app = create_app(state_with(Arc::new(failing_scheduler())).await).unwrap();

        let request = Request::builder()
            .uri("/api/patientes")
            .method(Method::OPTIONS)
            .header(header::ORIGIN, "http://localhost:3000")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "authorization,content-type")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert!(response.status().is_success());
        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "http://localhost:3000");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "POST");
    }

    #[tokio::test]
    async fn test_health_survives_failing_scheduler() {
        let scheduler: Arc<dyn ReminderScheduler> = Arc::new(failing_scheduler());
        assert!(!lifecycle::on_startup(scheduler.as_ref()).await);

        let app = create_app(state_with(scheduler.clone()).await).unwrap();
        let (status, health) = get_json(app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(health["status"], "healthy");

        assert!(!lifecycle::on_shutdown(scheduler.as_ref()).await);
    }

    #[tokio::test]
    async fn test_health_survives_panicking_scheduler() {
        let scheduler: Arc<dyn ReminderScheduler> = Arc::new(panicking_scheduler());
        assert!(!lifecycle::on_startup(scheduler.as_ref()).await);

        let app = create_app(state_with(scheduler).await).unwrap();
        let (status, root) = get_json(app, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(root["message"], "Bienvenue sur l'API MAMA+");
        assert_eq!(root["docs"], "/docs");
        assert!(root.get("note").is_none());
    }

    #[tokio::test]
    async fn test_openapi_document_lists_router_tags() {
        let app = create_app(state_with(Arc::new(failing_scheduler())).await).unwrap();
        let (status, doc) = get_json(app, "/openapi.json").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(doc["info"]["title"], "MAMA+ API");

        let tags: Vec<&str> = doc["tags"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|tag| tag["name"].as_str())
            .collect();
        assert_eq!(tags.len(), 10);
        assert!(tags.contains(&"System"));
        assert!(tags.contains(&"Predictions"));
        assert!(doc["paths"]["/api/cpn/generate"].is_object());
        assert!(doc["components"]["schemas"]["ErrorResponse"].is_object());
        assert_eq!(
            doc["paths"]["/api/patientes"]["post"]["responses"]["400"]["content"]["application/json"]["schema"]["$ref"],
            "#/components/schemas/ErrorResponse"
        );
    }
}
