use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Types of authentication events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthEventType {
    /// Successful login
    Login,
    /// Failed login attempt
    FailedLogin,
    /// Account registration
    Registration,
    /// Mobile account linked to a patient record through a sync code
    AccountLink,
    /// Token validation
    TokenValidation,
    /// Access denied to resource
    AccessDenied,
}

impl std::fmt::Display for AuthEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthEventType::Login => write!(f, "LOGIN"),
            AuthEventType::FailedLogin => write!(f, "FAILED_LOGIN"),
            AuthEventType::Registration => write!(f, "REGISTRATION"),
            AuthEventType::AccountLink => write!(f, "ACCOUNT_LINK"),
            AuthEventType::TokenValidation => write!(f, "TOKEN_VALIDATION"),
            AuthEventType::AccessDenied => write!(f, "ACCESS_DENIED"),
        }
    }
}

/// Authentication event record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthEvent {
    /// Type of authentication event
    pub event_type: AuthEventType,
    /// Account id or telephone (if available)
    pub subject: Option<String>,
    /// Timestamp when the event occurred
    pub timestamp: DateTime<Utc>,
    /// Whether the event was successful
    pub success: bool,
    /// Additional details about the event
    pub details: Option<String>,
    /// The resource being accessed (if applicable)
    pub resource: Option<String>,
    /// Authentication method used (password, token, sync code)
    pub auth_method: Option<String>,
}

impl AuthEvent {
    /// Create a new authentication event
    pub fn new(event_type: AuthEventType, subject: Option<&str>, success: bool) -> Self {
        Self {
            event_type,
            subject: subject.map(String::from),
            timestamp: Utc::now(),
            success,
            details: None,
            resource: None,
            auth_method: None,
        }
    }

    /// Set the details
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Set the resource
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Set the authentication method
    pub fn with_auth_method(mut self, auth_method: impl Into<String>) -> Self {
        self.auth_method = Some(auth_method.into());
        self
    }
}

/// Log an authentication event
pub fn log_auth_event(event: AuthEvent) {
    let subject = event.subject.as_deref().unwrap_or("anonymous");
    let details = event.details.as_deref().unwrap_or("");
    let resource = event.resource.as_deref().unwrap_or("-");
    let method = event.auth_method.as_deref().unwrap_or("-");

    if event.success {
        info!(
            "AUTH-LOG [{}] [{}] [SUCCESS] [{}] [{}] {}",
            event.event_type, subject, method, resource, details
        );
    } else {
        warn!(
            "AUTH-LOG [{}] [{}] [FAILURE] [{}] [{}] {}",
            event.event_type, subject, method, resource, details
        );
    }
}

/// Log a successful login
pub fn log_successful_login(user_id: i64) {
    let event = AuthEvent::new(AuthEventType::Login, Some(&user_id.to_string()), true)
        .with_auth_method("password");
    log_auth_event(event);
}

/// Log a failed login attempt
pub fn log_failed_login(telephone: &str, reason: &str) {
    let event = AuthEvent::new(AuthEventType::FailedLogin, Some(telephone), false)
        .with_details(reason)
        .with_auth_method("password");
    log_auth_event(event);
}

/// Log an access denied event
pub fn log_access_denied(user_id: i64, resource: &str, required_roles: &[&str]) {
    let event = AuthEvent::new(AuthEventType::AccessDenied, Some(&user_id.to_string()), false)
        .with_resource(resource)
        .with_details(format!("Required roles: {}", required_roles.join(", ")));
    log_auth_event(event);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_auth_event() {
        let event = AuthEvent::new(AuthEventType::Login, Some("12"), true)
            .with_details("Login from dashboard")
            .with_resource("/api/auth/login")
            .with_auth_method("password");

        assert_eq!(event.event_type, AuthEventType::Login);
        assert_eq!(event.subject, Some("12".to_string()));
        assert!(event.success);
        assert_eq!(event.details, Some("Login from dashboard".to_string()));
        assert_eq!(event.resource, Some("/api/auth/login".to_string()));
        assert_eq!(event.auth_method, Some("password".to_string()));
    }

    #[test]
    fn test_event_type_display() {
        assert_eq!(AuthEventType::Login.to_string(), "LOGIN");
        assert_eq!(AuthEventType::AccountLink.to_string(), "ACCOUNT_LINK");
        assert_eq!(AuthEventType::FailedLogin.to_string(), "FAILED_LOGIN");
    }
}
