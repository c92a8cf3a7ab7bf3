use thiserror::Error;
use validator::ValidationErrors;

use mama_plus_data::repository::RepositoryError;
use crate::auth::SecurityError;

/// Errors raised by domain services
#[derive(Debug, Error)]
pub enum DomainError {
    /// Input rejected by a business rule or field validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Referenced record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Record clashes with an existing one
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Missing or wrong credentials
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not allowed
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Token handling failure
    #[error(transparent)]
    Security(#[from] SecurityError),

    /// Storage failure
    #[error("Repository error: {0}")]
    Repository(RepositoryError),
}

impl DomainError {
    pub fn not_found(kind: &str, id: i64) -> Self {
        DomainError::NotFound(format!("{} {}", kind, id))
    }
}

impl From<RepositoryError> for DomainError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(msg) => DomainError::NotFound(msg),
            RepositoryError::Conflict(msg) => DomainError::Conflict(msg),
            RepositoryError::Validation(msg) => DomainError::Validation(msg),
            other => DomainError::Repository(other),
        }
    }
}

impl From<ValidationErrors> for DomainError {
    fn from(errors: ValidationErrors) -> Self {
        DomainError::Validation(validation_message(&errors))
    }
}

/// Flatten validator errors into `field: message; field: message`
pub fn validation_message(errors: &ValidationErrors) -> String {
    let mut parts: Vec<String> = errors
        .field_errors()
        .iter()
        .map(|(field, errors)| {
            let messages: Vec<String> = errors
                .iter()
                .map(|err| match &err.message {
                    Some(msg) => msg.to_string(),
                    None => format!("Invalid {}", field),
                })
                .collect();
            format!("{}: {}", field, messages.join(", "))
        })
        .collect();
    parts.sort();
    parts.join("; ")
}
