use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};
use utoipa::ToSchema;

use mama_plus_domain::scheduler::SchedulerError;
use mama_plus_domain::DomainError;

/// Error response format for API
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error type/code - machine-readable identifier
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    fn new(error: &str, message: impl Into<String>) -> Self {
        Self {
            error: error.to_string(),
            message: message.into(),
            details: None,
        }
    }
}

/// Request failure mapped to an HTTP status in one place
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Validation(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) => ApiError::Validation(msg),
            DomainError::NotFound(msg) => ApiError::NotFound(msg),
            DomainError::Conflict(msg) => ApiError::Conflict(msg),
            DomainError::Unauthorized(msg) => ApiError::Unauthorized(msg),
            DomainError::Forbidden(msg) => ApiError::Forbidden(msg),
            DomainError::Security(e) => ApiError::Unauthorized(e.to_string()),
            DomainError::Repository(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<SchedulerError> for ApiError {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::Job(e) => e.into(),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// Turn `field: message; field: message` into a details object
fn validation_details(message: &str) -> Option<serde_json::Value> {
    let fields: serde_json::Map<String, serde_json::Value> = message
        .split("; ")
        .filter_map(|part| part.split_once(": "))
        .map(|(field, msg)| (field.to_string(), serde_json::Value::String(msg.to_string())))
        .collect();
    (!fields.is_empty()).then(|| serde_json::Value::Object(fields))
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ErrorResponse::new("bad_request", msg)),
            ApiError::Validation(msg) => {
                warn!("Validation failed: {}", msg);
                let details = validation_details(&msg);
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse {
                        details,
                        ..ErrorResponse::new("validation_error", msg)
                    },
                )
            }
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, ErrorResponse::new("unauthorized", msg)),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, ErrorResponse::new("forbidden", msg)),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, ErrorResponse::new("not_found", msg)),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, ErrorResponse::new("conflict", msg)),
            ApiError::Internal(msg) => {
                error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("internal_error", "An unexpected error occurred"),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
