use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::Deserialize;
use tracing::instrument;
use utoipa::IntoParams;

use mama_plus_data::models::{Cpn, CpnStatut, Rappel};
use mama_plus_data::repository::CpnFilter;
use mama_plus_domain::auth::{require_role, STAFF_ROLES};
use mama_plus_domain::services::{
    CpnWithPatiente, CreateCpnRequest, GenerateCalendarRequest, SendRappelsRequest, UpdateCpnRequest,
};

use super::patientes::readable_patiente;
use crate::api::error::ApiResult;
use crate::api::extract::{ApiJson, ApiPath, ApiQuery, AuthUser};
use crate::state::AppState;

const RESOURCE: &str = "/api/cpn";

/// Filters for the appointment listing
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct CpnQuery {
    /// planifie, complete, manquee or annulee
    pub statut: Option<CpnStatut>,
    pub patiente_id: Option<i64>,
}

/// List appointments with their patient
#[utoipa::path(
    get,
    path = "/api/cpn",
    params(CpnQuery),
    responses(
        (status = 200, description = "Appointments", body = [CpnWithPatiente]),
        (status = 400, description = "Invalid filter", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "Antenatal Consultations"
)]
#[instrument(skip(state, user))]
pub async fn list_cpn(
    State(state): State<AppState>,
    user: AuthUser,
    ApiQuery(query): ApiQuery<CpnQuery>,
) -> ApiResult<Json<Vec<CpnWithPatiente>>> {
    require_role(&user.0, STAFF_ROLES, RESOURCE)?;
    let filter = CpnFilter {
        patiente_id: query.patiente_id,
        statut: query.statut,
    };
    Ok(Json(state.services.cpn.list(&filter).await?))
}

/// Plan one appointment
#[utoipa::path(
    post,
    path = "/api/cpn",
    request_body = CreateCpnRequest,
    responses(
        (status = 201, description = "Appointment created", body = Cpn),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 404, description = "Patient not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "Antenatal Consultations"
)]
#[instrument(skip(state, user, request))]
pub async fn create_cpn(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(request): ApiJson<CreateCpnRequest>,
) -> ApiResult<(StatusCode, Json<Cpn>)> {
    require_role(&user.0, STAFF_ROLES, RESOURCE)?;
    Ok((StatusCode::CREATED, Json(state.services.cpn.create(request).await?)))
}

/// Get one appointment
#[utoipa::path(
    get,
    path = "/api/cpn/{id}",
    params(("id" = i64, Path, description = "Appointment id")),
    responses(
        (status = 200, description = "Appointment found", body = Cpn),
        (status = 404, description = "Appointment not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "Antenatal Consultations"
)]
#[instrument(skip(state, user))]
pub async fn get_cpn(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Cpn>> {
    let cpn = state.services.cpn.get(id).await?;
    readable_patiente(&state, &user, cpn.patiente_id).await?;
    Ok(Json(cpn))
}

/// Change status, date, place or notes
#[utoipa::path(
    put,
    path = "/api/cpn/{id}",
    params(("id" = i64, Path, description = "Appointment id")),
    request_body = UpdateCpnRequest,
    responses(
        (status = 200, description = "Appointment updated", body = Cpn),
        (status = 404, description = "Appointment not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "Antenatal Consultations"
)]
#[instrument(skip(state, user, request))]
pub async fn update_cpn(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(request): ApiJson<UpdateCpnRequest>,
) -> ApiResult<Json<Cpn>> {
    require_role(&user.0, STAFF_ROLES, RESOURCE)?;
    Ok(Json(state.services.cpn.update(id, request).await?))
}

/// Create the standard appointment calendar of a patient
#[utoipa::path(
    post,
    path = "/api/cpn/generate",
    request_body = GenerateCalendarRequest,
    responses(
        (status = 201, description = "Appointments created", body = [Cpn]),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 404, description = "Patient not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "Antenatal Consultations"
)]
#[instrument(skip(state, user, request))]
pub async fn generate_calendar(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(request): ApiJson<GenerateCalendarRequest>,
) -> ApiResult<(StatusCode, Json<Vec<Cpn>>)> {
    require_role(&user.0, STAFF_ROLES, RESOURCE)?;
    let created = state
        .services
        .cpn
        .generate_calendar(request, Utc::now().date_naive())
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Send reminders for an appointment on the given channels
#[utoipa::path(
    post,
    path = "/api/cpn/{id}/rappels",
    params(("id" = i64, Path, description = "Appointment id")),
    request_body = SendRappelsRequest,
    responses(
        (status = 201, description = "Reminders recorded", body = [Rappel]),
        (status = 404, description = "Appointment not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "Antenatal Consultations"
)]
#[instrument(skip(state, user, request))]
pub async fn send_rappels(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(request): ApiJson<SendRappelsRequest>,
) -> ApiResult<(StatusCode, Json<Vec<Rappel>>)> {
    require_role(&user.0, STAFF_ROLES, RESOURCE)?;
    let rappels = state.services.cpn.send_rappels(id, request).await?;
    Ok((StatusCode::CREATED, Json(rappels)))
}

/// Reminders sent for an appointment
#[utoipa::path(
    get,
    path = "/api/cpn/{id}/rappels",
    params(("id" = i64, Path, description = "Appointment id")),
    responses(
        (status = 200, description = "Reminders", body = [Rappel]),
        (status = 404, description = "Appointment not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "Antenatal Consultations"
)]
#[instrument(skip(state, user))]
pub async fn list_rappels(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Vec<Rappel>>> {
    let cpn = state.services.cpn.get(id).await?;
    readable_patiente(&state, &user, cpn.patiente_id).await?;
    Ok(Json(state.services.cpn.list_rappels(id).await?))
}
