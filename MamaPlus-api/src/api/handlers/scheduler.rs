use axum::{extract::State, Json};
use tracing::{info, instrument};

use mama_plus_domain::auth::{require_role, STAFF_ROLES};
use mama_plus_domain::scheduler::{RunSummary, SchedulerStatus};

use crate::api::error::ApiResult;
use crate::api::extract::AuthUser;
use crate::state::AppState;

const RESOURCE: &str = "/api/scheduler";

/// Reminder scheduler state
#[utoipa::path(
    get,
    path = "/api/scheduler/status",
    responses(
        (status = 200, description = "Scheduler status", body = SchedulerStatus),
        (status = 403, description = "Staff only", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "Scheduler"
)]
#[instrument(skip(state, user))]
pub async fn get_status(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<SchedulerStatus>> {
    require_role(&user.0, STAFF_ROLES, RESOURCE)?;
    Ok(Json(state.scheduler.status().await))
}

/// Run the reminder jobs now
#[utoipa::path(
    post,
    path = "/api/scheduler/run",
    responses(
        (status = 200, description = "Pass summary", body = RunSummary),
        (status = 403, description = "Staff only", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "Scheduler"
)]
#[instrument(skip(state, user))]
pub async fn run_now(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<RunSummary>> {
    require_role(&user.0, STAFF_ROLES, RESOURCE)?;
    let summary = state.scheduler.run_once().await?;
    info!("Manual reminder pass by user {}", user.0.user_id);
    Ok(Json(summary))
}
