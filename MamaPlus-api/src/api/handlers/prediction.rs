use axum::{extract::State, Json};
use tracing::instrument;

use mama_plus_domain::auth::{require_role, STAFF_ROLES};
use mama_plus_domain::services::{PatientesRisks, RiskPrediction};

use super::patientes::readable_patiente;
use crate::api::error::ApiResult;
use crate::api::extract::{ApiPath, AuthUser};
use crate::state::AppState;

/// Risk of missing follow-up for one patient
#[utoipa::path(
    get,
    path = "/api/prediction/patientes/{id}",
    params(("id" = i64, Path, description = "Patient id")),
    responses(
        (status = 200, description = "Risk prediction", body = RiskPrediction),
        (status = 404, description = "Patient not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "Predictions"
)]
#[instrument(skip(state, user))]
pub async fn predict_patiente(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<RiskPrediction>> {
    readable_patiente(&state, &user, id).await?;
    Ok(Json(state.services.predictions.for_patiente(id).await?))
}

/// Risk of every patient
#[utoipa::path(
    get,
    path = "/api/prediction/patientes/risks",
    responses(
        (status = 200, description = "Risk predictions", body = PatientesRisks),
        (status = 403, description = "Staff only", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "Predictions"
)]
#[instrument(skip(state, user))]
pub async fn predict_all(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<PatientesRisks>> {
    require_role(&user.0, STAFF_ROLES, "/api/prediction")?;
    Ok(Json(state.services.predictions.all().await?))
}
