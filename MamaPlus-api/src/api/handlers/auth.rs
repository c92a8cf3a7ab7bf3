use axum::{extract::State, http::StatusCode, Json};
use tracing::{info, instrument};

use mama_plus_domain::auth::{LoginRequest, LoginResponse, RegisterRequest, UserProfile};

use crate::api::error::ApiResult;
use crate::api::extract::{ApiJson, AuthUser};
use crate::state::AppState;

/// Register a patient or professional account
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = UserProfile),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 403, description = "Role cannot self-register", body = ErrorResponse),
        (status = 409, description = "Telephone already registered", body = ErrorResponse),
    ),
    tag = "Authentication"
)]
#[instrument(skip(state, request))]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<UserProfile>)> {
    let user = state.auth.register(request).await?;
    info!("Registered account {}", user.id);
    Ok((StatusCode::CREATED, Json(user)))
}

/// Exchange telephone and password for an access token
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 401, description = "Bad credentials", body = ErrorResponse),
    ),
    tag = "Authentication"
)]
#[instrument(skip(state, request))]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    Ok(Json(state.auth.login(request).await?))
}

/// Current account
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current account", body = UserProfile),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "Authentication"
)]
#[instrument(skip(state, user))]
pub async fn me(State(state): State<AppState>, AuthUser(user): AuthUser) -> ApiResult<Json<UserProfile>> {
    Ok(Json(state.auth.current_user(&user).await?))
}
