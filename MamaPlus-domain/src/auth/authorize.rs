//! Role checks applied by the HTTP layer before calling a service

use tracing::debug;

use mama_plus_data::models::Role;

use crate::error::DomainError;
use super::logging::log_access_denied;
use super::AuthenticatedUser;

/// Roles allowed to manage every patient record
pub const STAFF_ROLES: &[Role] = &[Role::Professionnel, Role::Admin];

/// Require one of `allowed` for `resource`
pub fn require_role(user: &AuthenticatedUser, allowed: &[Role], resource: &str) -> Result<(), DomainError> {
    if allowed.contains(&user.role) {
        debug!("User {} has required role for resource access: {}", user.user_id, resource);
        return Ok(());
    }

    let names: Vec<&str> = allowed.iter().map(Role::as_str).collect();
    log_access_denied(user.user_id, resource, &names);
    Err(DomainError::Forbidden(
        "You don't have the required permissions to access this resource".to_string(),
    ))
}

/// Allow staff, or the patient account that owns the record
pub fn require_owner_or_staff(
    user: &AuthenticatedUser,
    owner_user_id: Option<i64>,
    resource: &str,
) -> Result<(), DomainError> {
    if user.is_staff() || owner_user_id == Some(user.user_id) {
        return Ok(());
    }
    require_role(user, STAFF_ROLES, resource)
}
