use std::env;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use mama_plus_data::models::Role;

/// Secret used when `JWT_SECRET` is not set; only suitable for local development
const DEVELOPMENT_SECRET: &str = "mama-plus-development-secret-change-me";

/// Security errors for authentication and token operations
#[derive(Debug, Error)]
pub enum SecurityError {
    /// JWT validation error
    #[error("Token validation error: {0}")]
    TokenValidation(String),

    /// Expired token
    #[error("Token has expired")]
    TokenExpired,

    /// Invalid token structure
    #[error("Invalid token format")]
    InvalidToken,

    /// Invalid issuer
    #[error("Invalid token issuer")]
    InvalidIssuer,

    /// Configuration error
    #[error("Security configuration error: {0}")]
    ConfigError(String),

    /// Password hashing failure
    #[error("Password hashing error: {0}")]
    PasswordHash(String),
}

/// JWT claims issued at login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (account id)
    pub sub: String,
    /// Role of the account when the token was issued
    pub role: Role,
    /// Issuer
    pub iss: String,
    /// Issued at (as timestamp)
    pub iat: i64,
    /// Expiration timestamp
    pub exp: i64,
    /// Unique token id
    pub jti: String,
}

impl Claims {
    /// Account id carried in `sub`
    pub fn user_id(&self) -> Result<i64, SecurityError> {
        self.sub.parse().map_err(|_| SecurityError::InvalidToken)
    }
}

/// Signing configuration for access tokens
#[derive(Debug, Clone)]
pub struct TokenConfig {
    secret: String,
    pub issuer: String,
    pub access_ttl: Duration,
}

impl TokenConfig {
    pub fn new(secret: impl Into<String>, issuer: impl Into<String>, access_ttl: Duration) -> Self {
        Self {
            secret: secret.into(),
            issuer: issuer.into(),
            access_ttl,
        }
    }

    /// Read `JWT_SECRET`, `JWT_ISSUER` and `ACCESS_TOKEN_EXPIRATION_MINUTES`
    pub fn from_env() -> Result<Self, SecurityError> {
        let secret = match env::var("JWT_SECRET") {
            Ok(secret) if !secret.trim().is_empty() => secret,
            _ => {
                warn!("JWT_SECRET is not set, using the development secret");
                DEVELOPMENT_SECRET.to_string()
            }
        };

        let issuer = env::var("JWT_ISSUER").unwrap_or_else(|_| "mama-plus-api".to_string());

        let minutes = match env::var("ACCESS_TOKEN_EXPIRATION_MINUTES") {
            Ok(raw) => raw.trim().parse::<i64>().map_err(|_| {
                SecurityError::ConfigError(format!(
                    "ACCESS_TOKEN_EXPIRATION_MINUTES must be a number, got {:?}",
                    raw
                ))
            })?,
            Err(_) => 24 * 60,
        };

        if minutes <= 0 {
            return Err(SecurityError::ConfigError(
                "ACCESS_TOKEN_EXPIRATION_MINUTES must be positive".to_string(),
            ));
        }

        Ok(Self::new(secret, issuer, Duration::minutes(minutes)))
    }

    /// Generate a new access token
    pub fn generate_token(&self, user_id: i64, role: Role) -> Result<String, SecurityError> {
        let now = Utc::now();
        let expiration = now + self.access_ttl;

        let claims = Claims {
            sub: user_id.to_string(),
            role,
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: expiration.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| {
            error!("Failed to encode JWT token: {}", e);
            SecurityError::TokenValidation(e.to_string())
        })?;

        // Log token generation (but not the token itself)
        info!("Generated access token for user {}", user_id);
        debug!("Token expiration: {}", expiration);

        Ok(token)
    }

    /// Validate a JWT token and return the decoded claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, SecurityError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.set_issuer(&[self.issuer.as_str()]);

        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => SecurityError::TokenExpired,
            jsonwebtoken::errors::ErrorKind::InvalidToken => SecurityError::InvalidToken,
            jsonwebtoken::errors::ErrorKind::InvalidIssuer => SecurityError::InvalidIssuer,
            jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                SecurityError::TokenValidation("Invalid signature".to_string())
            }
            _ => SecurityError::TokenValidation(e.to_string()),
        })?;

        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TokenConfig {
        TokenConfig::new("test_secret_key_for_testing_only", "test-issuer", Duration::minutes(15))
    }

    #[test]
    fn test_generate_and_validate_token() {
        let config = config();
        let token = config.generate_token(42, Role::Professionnel).unwrap();
        assert!(!token.is_empty());

        let claims = config.validate_token(&token).unwrap();
        assert_eq!(claims.user_id().unwrap(), 42);
        assert_eq!(claims.role, Role::Professionnel);
        assert_eq!(claims.iss, "test-issuer");
    }

    #[test]
    fn test_token_expiration() {
        let config = config();
        let claims = Claims {
            sub: "7".to_string(),
            role: Role::Patiente,
            iss: "test-issuer".to_string(),
            iat: Utc::now().timestamp() - 7200,
            exp: Utc::now().timestamp() - 3600, // 1 hour in the past
            jti: Uuid::new_v4().to_string(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret("test_secret_key_for_testing_only".as_bytes()),
        )
        .unwrap();

        assert!(matches!(config.validate_token(&token), Err(SecurityError::TokenExpired)));
    }

    #[test]
    fn test_token_from_other_secret_is_rejected() {
        let other = TokenConfig::new("another-secret", "test-issuer", Duration::minutes(15));
        let token = other.generate_token(1, Role::Admin).unwrap();
        assert!(config().validate_token(&token).is_err());
    }

    #[test]
    fn test_token_from_other_issuer_is_rejected() {
        let other = TokenConfig::new("test_secret_key_for_testing_only", "someone-else", Duration::minutes(15));
        let token = other.generate_token(1, Role::Admin).unwrap();
        assert!(matches!(config().validate_token(&token), Err(SecurityError::InvalidIssuer)));
    }

    #[test]
    fn test_garbage_token_is_rejected() {
        assert!(config().validate_token("not-a-jwt").is_err());
    }
}
