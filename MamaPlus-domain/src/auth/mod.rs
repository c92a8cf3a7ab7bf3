//! Authentication for the MAMA+ API
//!
//! Accounts log in with their telephone number and a password. A successful
//! login yields an HS256 access token carrying the account id and role.

pub mod authorize;
pub mod logging;
pub mod password;
pub mod service;
pub mod token;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "with-api")]
use utoipa::ToSchema;

use mama_plus_data::models::{Role, User};

pub use authorize::{require_owner_or_staff, require_role, STAFF_ROLES};
pub use service::{AuthService, LoginRequest, LoginResponse, RegisterRequest};
pub use token::{Claims, SecurityError, TokenConfig};

/// Identity attached to an authenticated request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: i64,
    pub role: Role,
}

impl AuthenticatedUser {
    pub fn is_staff(&self) -> bool {
        STAFF_ROLES.contains(&self.role)
    }
}

/// Public view of an account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct UserProfile {
    pub id: i64,
    pub telephone: String,
    pub role: Role,
    pub nom: Option<String>,
    pub prenom: Option<String>,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            telephone: user.telephone,
            role: user.role,
            nom: user.nom,
            prenom: user.prenom,
            email: user.email,
            created_at: user.created_at,
        }
    }
}
