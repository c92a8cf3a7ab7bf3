use axum::{extract::State, Json};
use tracing::instrument;

use mama_plus_domain::auth::{require_role, STAFF_ROLES};
use mama_plus_domain::services::{DashboardStats, PatienteOverview};

use crate::api::error::ApiResult;
use crate::api::extract::AuthUser;
use crate::state::AppState;

const RESOURCE: &str = "/api/dashboard";

/// Aggregate counters
#[utoipa::path(
    get,
    path = "/api/dashboard/stats",
    responses(
        (status = 200, description = "Dashboard counters", body = DashboardStats),
        (status = 403, description = "Staff only", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "Dashboard"
)]
#[instrument(skip(state, user))]
pub async fn get_stats(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<DashboardStats>> {
    require_role(&user.0, STAFF_ROLES, RESOURCE)?;
    Ok(Json(state.services.dashboard.stats().await?))
}

/// Patients with their next appointment
#[utoipa::path(
    get,
    path = "/api/dashboard/patientes",
    responses(
        (status = 200, description = "Patients overview", body = [PatienteOverview]),
        (status = 403, description = "Staff only", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "Dashboard"
)]
#[instrument(skip(state, user))]
pub async fn get_patientes(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<Vec<PatienteOverview>>> {
    require_role(&user.0, STAFF_ROLES, RESOURCE)?;
    Ok(Json(state.services.dashboard.patientes().await?))
}
