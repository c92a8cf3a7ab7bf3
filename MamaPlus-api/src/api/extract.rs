//! Request extractors whose rejections use the API error format

use async_trait::async_trait;
use axum::{
    extract::{FromRequest, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::debug;

use mama_plus_domain::auth::AuthenticatedUser;

use super::error::ApiError;
use crate::state::AppState;

/// JSON body; malformed payloads are 400
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Path parameters; malformed ids are 400
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

/// Query string; malformed filters are 400
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

/// Account resolved from the `Authorization: Bearer` header
#[derive(Debug, Clone)]
pub struct AuthUser(pub AuthenticatedUser);

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    scheme.eq_ignore_ascii_case("bearer").then(|| token.trim())
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or_else(|| {
            debug!("Request to {} without bearer token", parts.uri.path());
            ApiError::Unauthorized("Missing bearer token".to_string())
        })?;

        let user = state.auth.authenticate(token).await?;
        Ok(AuthUser(user))
    }
}
