use axum::{extract::State, http::StatusCode, Json};
use tracing::instrument;

use mama_plus_data::models::Consultation;
use mama_plus_domain::auth::{require_role, STAFF_ROLES};
use mama_plus_domain::services::CreateConsultationRequest;

use super::patientes::readable_patiente;
use super::PatienteQuery;
use crate::api::error::ApiResult;
use crate::api::extract::{ApiJson, ApiPath, ApiQuery, AuthUser};
use crate::state::AppState;

/// List consultations
#[utoipa::path(
    get,
    path = "/api/consultations",
    params(PatienteQuery),
    responses(
        (status = 200, description = "Consultations", body = [Consultation]),
    ),
    security(("bearer" = [])),
    tag = "Consultations"
)]
#[instrument(skip(state, user))]
pub async fn list_consultations(
    State(state): State<AppState>,
    user: AuthUser,
    ApiQuery(query): ApiQuery<PatienteQuery>,
) -> ApiResult<Json<Vec<Consultation>>> {
    require_role(&user.0, STAFF_ROLES, "/api/consultations")?;
    Ok(Json(state.services.consultations.list(query.patiente_id).await?))
}

/// Record a consultation
#[utoipa::path(
    post,
    path = "/api/consultations",
    request_body = CreateConsultationRequest,
    responses(
        (status = 201, description = "Consultation recorded", body = Consultation),
        (status = 400, description = "Invalid measurements", body = ErrorResponse),
        (status = 404, description = "Patient or appointment not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "Consultations"
)]
#[instrument(skip(state, user, request))]
pub async fn create_consultation(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(request): ApiJson<CreateConsultationRequest>,
) -> ApiResult<(StatusCode, Json<Consultation>)> {
    require_role(&user.0, STAFF_ROLES, "/api/consultations")?;
    let consultation = state.services.consultations.create(request).await?;
    Ok((StatusCode::CREATED, Json(consultation)))
}

/// Get one consultation
#[utoipa::path(
    get,
    path = "/api/consultations/{id}",
    params(("id" = i64, Path, description = "Consultation id")),
    responses(
        (status = 200, description = "Consultation found", body = Consultation),
        (status = 404, description = "Consultation not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "Consultations"
)]
#[instrument(skip(state, user))]
pub async fn get_consultation(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Consultation>> {
    let consultation = state.services.consultations.get(id).await?;
    readable_patiente(&state, &user, consultation.patiente_id).await?;
    Ok(Json(consultation))
}
