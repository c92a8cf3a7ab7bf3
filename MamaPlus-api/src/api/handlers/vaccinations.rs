use axum::{extract::State, http::StatusCode, Json};
use tracing::instrument;

use mama_plus_data::models::Vaccination;
use mama_plus_domain::auth::{require_role, STAFF_ROLES};
use mama_plus_domain::services::CreateVaccinationRequest;

use super::patientes::readable_patiente;
use super::PatienteQuery;
use crate::api::error::ApiResult;
use crate::api::extract::{ApiJson, ApiPath, ApiQuery, AuthUser};
use crate::state::AppState;

/// List vaccinations
#[utoipa::path(
    get,
    path = "/api/vaccinations",
    params(PatienteQuery),
    responses(
        (status = 200, description = "Vaccinations", body = [Vaccination]),
    ),
    security(("bearer" = [])),
    tag = "Vaccinations"
)]
#[instrument(skip(state, user))]
pub async fn list_vaccinations(
    State(state): State<AppState>,
    user: AuthUser,
    ApiQuery(query): ApiQuery<PatienteQuery>,
) -> ApiResult<Json<Vec<Vaccination>>> {
    require_role(&user.0, STAFF_ROLES, "/api/vaccinations")?;
    Ok(Json(state.services.vaccinations.list(query.patiente_id).await?))
}

/// Record a vaccination
#[utoipa::path(
    post,
    path = "/api/vaccinations",
    request_body = CreateVaccinationRequest,
    responses(
        (status = 201, description = "Vaccination recorded", body = Vaccination),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 404, description = "Patient not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "Vaccinations"
)]
#[instrument(skip(state, user, request))]
pub async fn create_vaccination(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(request): ApiJson<CreateVaccinationRequest>,
) -> ApiResult<(StatusCode, Json<Vaccination>)> {
    require_role(&user.0, STAFF_ROLES, "/api/vaccinations")?;
    let vaccination = state.services.vaccinations.create(request).await?;
    Ok((StatusCode::CREATED, Json(vaccination)))
}

/// Get one vaccination
#[utoipa::path(
    get,
    path = "/api/vaccinations/{id}",
    params(("id" = i64, Path, description = "Vaccination id")),
    responses(
        (status = 200, description = "Vaccination found", body = Vaccination),
        (status = 404, description = "Vaccination not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "Vaccinations"
)]
#[instrument(skip(state, user))]
pub async fn get_vaccination(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Vaccination>> {
    let vaccination = state.services.vaccinations.get(id).await?;
    readable_patiente(&state, &user, vaccination.patiente_id).await?;
    Ok(Json(vaccination))
}
