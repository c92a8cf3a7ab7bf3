use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
#[cfg(feature = "with-api")]
use utoipa::ToSchema;
use validator::Validate;

use mama_plus_data::models::{Role, User};

use crate::error::DomainError;
use crate::SharedStorage;
use super::logging::{log_auth_event, log_failed_login, log_successful_login, AuthEvent, AuthEventType};
use super::password::{hash_password, verify_password};
use super::token::TokenConfig;
use super::{AuthenticatedUser, UserProfile};

const INVALID_CREDENTIALS: &str = "Numéro de téléphone ou mot de passe incorrect";

/// Account creation payload
#[derive(Debug, Clone, Deserialize, Validate)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct RegisterRequest {
    #[validate(length(min = 6, max = 20, message = "telephone must contain 6 to 20 characters"))]
    pub telephone: String,

    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    pub password: String,

    #[serde(default)]
    pub role: Role,

    pub nom: Option<String>,
    pub prenom: Option<String>,

    #[validate(email(message = "email is not valid"))]
    pub email: Option<String>,
}

/// Login payload
#[derive(Debug, Clone, Deserialize, Validate)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "telephone is required"))]
    pub telephone: String,

    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

/// Successful login
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct LoginResponse {
    pub access_token: String,
    /// Always `bearer`
    pub token_type: String,
    /// Token lifetime in seconds
    pub expires_in: i64,
    pub user: UserProfile,
}

/// Phone numbers are compared without surrounding or inner whitespace
pub(crate) fn normalize_telephone(raw: &str) -> String {
    raw.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Hash the password and store a new account
pub(crate) async fn create_account(
    storage: &SharedStorage,
    telephone: &str,
    password: &str,
    role: Role,
    nom: Option<String>,
    prenom: Option<String>,
    email: Option<String>,
) -> Result<User, DomainError> {
    if password.chars().count() < 6 {
        return Err(DomainError::Validation(
            "password: password must be at least 6 characters".to_string(),
        ));
    }

    let user = User {
        id: 0,
        telephone: normalize_telephone(telephone),
        password_hash: hash_password(password)?,
        role,
        nom,
        prenom,
        email,
        created_at: Utc::now(),
    };
    let user = storage.create_user(user).await?;

    let event = AuthEvent::new(AuthEventType::Registration, Some(&user.id.to_string()), true)
        .with_details(format!("role={}", user.role));
    log_auth_event(event);

    Ok(user)
}

/// Account registration, login and token checks
#[derive(Clone)]
pub struct AuthService {
    storage: SharedStorage,
    tokens: TokenConfig,
}

impl AuthService {
    pub fn new(storage: SharedStorage, tokens: TokenConfig) -> Self {
        Self { storage, tokens }
    }

    pub fn tokens(&self) -> &TokenConfig {
        &self.tokens
    }

    /// Register a patient or professional account
    #[instrument(skip(self, request), fields(telephone = %request.telephone))]
    pub async fn register(&self, request: RegisterRequest) -> Result<UserProfile, DomainError> {
        request.validate()?;

        if request.role == Role::Admin {
            return Err(DomainError::Forbidden(
                "admin accounts cannot be self-registered".to_string(),
            ));
        }

        let user = create_account(
            &self.storage,
            &request.telephone,
            &request.password,
            request.role,
            request.nom,
            request.prenom,
            request.email,
        )
        .await?;

        info!("Registered {} account {}", user.role, user.id);
        Ok(user.into())
    }

    /// Check credentials and issue an access token
    #[instrument(skip(self, request), fields(telephone = %request.telephone))]
    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse, DomainError> {
        request.validate()?;

        let telephone = normalize_telephone(&request.telephone);
        let user = match self.storage.find_user_by_telephone(&telephone).await? {
            Some(user) => user,
            None => {
                log_failed_login(&telephone, "unknown telephone");
                return Err(DomainError::Unauthorized(INVALID_CREDENTIALS.to_string()));
            }
        };

        if !verify_password(&request.password, &user.password_hash) {
            log_failed_login(&telephone, "wrong password");
            return Err(DomainError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        }

        let access_token = self.tokens.generate_token(user.id, user.role)?;
        log_successful_login(user.id);

        Ok(LoginResponse {
            access_token,
            token_type: "bearer".to_string(),
            expires_in: self.tokens.access_ttl.num_seconds(),
            user: user.into(),
        })
    }

    /// Resolve a bearer token into the account it was issued for
    pub async fn authenticate(&self, token: &str) -> Result<AuthenticatedUser, DomainError> {
        let claims = self.tokens.validate_token(token).map_err(|e| {
            log_auth_event(
                AuthEvent::new(AuthEventType::TokenValidation, None, false)
                    .with_details(e.to_string())
                    .with_auth_method("bearer"),
            );
            DomainError::Unauthorized(e.to_string())
        })?;

        let user_id = claims
            .user_id()
            .map_err(|e| DomainError::Unauthorized(e.to_string()))?;

        // The account may have been removed since the token was issued.
        let user = self
            .storage
            .get_user(user_id)
            .await?
            .ok_or_else(|| DomainError::Unauthorized("account no longer exists".to_string()))?;

        Ok(AuthenticatedUser {
            user_id: user.id,
            role: user.role,
        })
    }

    /// Profile of the authenticated account
    pub async fn current_user(&self, user: &AuthenticatedUser) -> Result<UserProfile, DomainError> {
        self.storage
            .get_user(user.user_id)
            .await?
            .map(UserProfile::from)
            .ok_or_else(|| DomainError::not_found("user", user.user_id))
    }
}
