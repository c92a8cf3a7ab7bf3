use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use utoipa::ToSchema;

use crate::config::AppVariant;
use crate::state::AppState;

const CSV_NOTE: &str = "Cette version utilise CSV pour le stockage - plus simple à mettre en place !";

/// Service identification returned at `/`
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RootResponse {
    pub message: String,
    pub version: String,
    pub docs: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Liveness payload returned at `/health`
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Always `healthy`
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<String>,
}

/// Root payload for a variant
pub fn root_payload(variant: AppVariant) -> RootResponse {
    let csv = variant == AppVariant::Csv;
    RootResponse {
        message: variant.welcome().to_string(),
        version: variant.version().to_string(),
        docs: "/docs".to_string(),
        storage: csv.then(|| "CSV".to_string()),
        note: csv.then(|| CSV_NOTE.to_string()),
    }
}

/// Liveness payload for a variant
pub fn health_payload(variant: AppVariant) -> HealthResponse {
    HealthResponse {
        status: "healthy".to_string(),
        storage: (variant == AppVariant::Csv).then(|| "CSV".to_string()),
    }
}

/// Identify the service
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service identification", body = RootResponse)
    ),
    tag = "System"
)]
#[instrument(skip(state))]
pub async fn root(State(state): State<AppState>) -> Json<RootResponse> {
    Json(root_payload(state.variant))
}

/// Liveness check; does not touch storage or the scheduler
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is alive", body = HealthResponse)
    ),
    tag = "System"
)]
#[instrument(skip(state))]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health_payload(state.variant))
}
