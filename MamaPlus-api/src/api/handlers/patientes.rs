use axum::{extract::State, http::StatusCode, Json};
use tracing::{info, instrument};

use mama_plus_data::models::Patiente;
use mama_plus_domain::auth::{require_owner_or_staff, require_role, STAFF_ROLES};
use mama_plus_domain::services::{
    CreatePatienteRequest, Dossier, SyncCode, UpdatePatienteRequest, ValidateSyncCodeRequest,
};

use crate::api::error::ApiResult;
use crate::api::extract::{ApiJson, ApiPath, AuthUser};
use crate::state::AppState;

const RESOURCE: &str = "/api/patientes";

/// Load a patient the caller may read
pub(crate) async fn readable_patiente(state: &AppState, user: &AuthUser, id: i64) -> ApiResult<Patiente> {
    let patiente = state.services.patients.get(id).await?;
    require_owner_or_staff(&user.0, patiente.user_id, RESOURCE)?;
    Ok(patiente)
}

/// List every patient
#[utoipa::path(
    get,
    path = "/api/patientes",
    responses(
        (status = 200, description = "Patients", body = [Patiente]),
        (status = 403, description = "Staff only", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "Patients"
)]
#[instrument(skip(state, user))]
pub async fn list_patientes(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<Vec<Patiente>>> {
    require_role(&user.0, STAFF_ROLES, RESOURCE)?;
    Ok(Json(state.services.patients.list().await?))
}

/// Register a patient, optionally with a linked account
#[utoipa::path(
    post,
    path = "/api/patientes",
    request_body = CreatePatienteRequest,
    responses(
        (status = 201, description = "Patient created", body = Patiente),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 409, description = "Telephone already registered", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "Patients"
)]
#[instrument(skip(state, user, request))]
pub async fn create_patiente(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(request): ApiJson<CreatePatienteRequest>,
) -> ApiResult<(StatusCode, Json<Patiente>)> {
    require_role(&user.0, STAFF_ROLES, RESOURCE)?;
    let patiente = state.services.patients.create(request).await?;
    Ok((StatusCode::CREATED, Json(patiente)))
}

/// Get one patient
#[utoipa::path(
    get,
    path = "/api/patientes/{id}",
    params(("id" = i64, Path, description = "Patient id")),
    responses(
        (status = 200, description = "Patient found", body = Patiente),
        (status = 404, description = "Patient not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "Patients"
)]
#[instrument(skip(state, user))]
pub async fn get_patiente(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Patiente>> {
    Ok(Json(readable_patiente(&state, &user, id).await?))
}

/// Patient record as shown in her own profile
#[utoipa::path(
    get,
    path = "/api/patientes/{id}/profil",
    params(("id" = i64, Path, description = "Patient id")),
    responses(
        (status = 200, description = "Patient profile", body = Patiente),
        (status = 404, description = "Patient not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "Patients"
)]
#[instrument(skip(state, user))]
pub async fn get_profil(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Patiente>> {
    Ok(Json(readable_patiente(&state, &user, id).await?))
}

/// Update the given fields of a patient
#[utoipa::path(
    put,
    path = "/api/patientes/{id}",
    params(("id" = i64, Path, description = "Patient id")),
    request_body = UpdatePatienteRequest,
    responses(
        (status = 200, description = "Patient updated", body = Patiente),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 404, description = "Patient not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "Patients"
)]
#[instrument(skip(state, user, request))]
pub async fn update_patiente(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(request): ApiJson<UpdatePatienteRequest>,
) -> ApiResult<Json<Patiente>> {
    require_role(&user.0, STAFF_ROLES, RESOURCE)?;
    Ok(Json(state.services.patients.update(id, request).await?))
}

/// Delete a patient and her records
#[utoipa::path(
    delete,
    path = "/api/patientes/{id}",
    params(("id" = i64, Path, description = "Patient id")),
    responses(
        (status = 204, description = "Patient deleted"),
        (status = 404, description = "Patient not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "Patients"
)]
#[instrument(skip(state, user))]
pub async fn delete_patiente(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<StatusCode> {
    require_role(&user.0, STAFF_ROLES, RESOURCE)?;
    state.services.patients.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Full medical record with a risk prediction
#[utoipa::path(
    get,
    path = "/api/patientes/{id}/dossier",
    params(("id" = i64, Path, description = "Patient id")),
    responses(
        (status = 200, description = "Medical record", body = Dossier),
        (status = 404, description = "Patient not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "Patients"
)]
#[instrument(skip(state, user))]
pub async fn get_dossier(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Dossier>> {
    readable_patiente(&state, &user, id).await?;
    Ok(Json(state.services.patients.dossier(id).await?))
}

/// Current sync code, issued when missing or expired
#[utoipa::path(
    get,
    path = "/api/patientes/{id}/sync-code",
    params(("id" = i64, Path, description = "Patient id")),
    responses(
        (status = 200, description = "Sync code", body = SyncCode),
        (status = 404, description = "Patient not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "Patients"
)]
#[instrument(skip(state, user))]
pub async fn get_sync_code(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<SyncCode>> {
    require_role(&user.0, STAFF_ROLES, RESOURCE)?;
    Ok(Json(state.services.patients.sync_code(id).await?))
}

/// Replace the sync code
#[utoipa::path(
    post,
    path = "/api/patientes/{id}/sync-code/regenerate",
    params(("id" = i64, Path, description = "Patient id")),
    responses(
        (status = 200, description = "New sync code", body = SyncCode),
        (status = 404, description = "Patient not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "Patients"
)]
#[instrument(skip(state, user))]
pub async fn regenerate_sync_code(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<SyncCode>> {
    require_role(&user.0, STAFF_ROLES, RESOURCE)?;
    Ok(Json(state.services.patients.regenerate_sync_code(id).await?))
}

/// Link an account to the patient holding the code
#[utoipa::path(
    post,
    path = "/api/patientes/sync-code/validate",
    request_body = ValidateSyncCodeRequest,
    responses(
        (status = 200, description = "Account linked", body = Patiente),
        (status = 400, description = "Malformed code", body = ErrorResponse),
        (status = 404, description = "Unknown or expired code", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "Patients"
)]
#[instrument(skip(state, user, request))]
pub async fn validate_sync_code(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(request): ApiJson<ValidateSyncCodeRequest>,
) -> ApiResult<Json<Patiente>> {
    require_owner_or_staff(&user.0, Some(request.user_id), RESOURCE)?;
    let patiente = state.services.patients.validate_sync_code(request).await?;
    info!("Account linked to patiente {}", patiente.id);
    Ok(Json(patiente))
}
