use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::UnknownVariant;

/// Role attached to an account
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Pregnant patient using the mobile client
    #[default]
    Patiente,
    /// Health professional following patients
    Professionnel,
    /// Administrator
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Patiente => "patiente",
            Role::Professionnel => "professionnel",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "patiente" => Ok(Role::Patiente),
            "professionnel" => Ok(Role::Professionnel),
            "admin" => Ok(Role::Admin),
            other => Err(UnknownVariant::new("role", other)),
        }
    }
}

/// Storage model for an account
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,

    /// Login identifier, unique across accounts
    pub telephone: String,

    /// Argon2 PHC string, never the clear password
    pub password_hash: String,

    pub role: Role,
    pub nom: Option<String>,
    pub prenom: Option<String>,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}
