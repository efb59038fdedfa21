//! Bearer-token authentication.
//!
//! HS256 tokens signed with the configured secret. Three roles: `user`
//! (clients), `worker` (fleet callbacks), `admin` (operators).

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Caller role carried in the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Worker,
    Admin,
}

/// Token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: user id (users/admins) or worker id (workers)
    pub sub: String,
    pub role: Role,
    pub exp: i64,
}

/// Authenticated caller, extracted from the Authorization header.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub subject: String,
    pub role: Role,
}

impl AuthUser {
    /// The subject parsed as a user id. Worker tokens carry worker ids, not
    /// UUIDs, so this errors for them.
    pub fn user_id(&self) -> Result<Uuid, ApiError> {
        self.subject
            .parse()
            .map_err(|_| ApiError::unauthorized("subject is not a user id"))
    }

    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(ApiError::forbidden("admin role required"))
        }
    }

    /// Worker callbacks accept workers and admins (for manual poking).
    pub fn require_worker(&self) -> Result<(), ApiError> {
        match self.role {
            Role::Worker | Role::Admin => Ok(()),
            Role::User => Err(ApiError::forbidden("worker role required")),
        }
    }
}

/// Verify a raw token against the signing secret.
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, ApiError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| ApiError::unauthorized(format!("invalid token: {}", e)))
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("missing Authorization header"))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::unauthorized("expected Bearer token"))?;

        let claims = verify_token(token, &state.config.jwt_secret)?;
        Ok(AuthUser {
            subject: claims.sub,
            role: claims.role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token_for(role: Role, secret: &str) -> String {
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            role,
            exp: chrono::Utc::now().timestamp() + 3600,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_round_trip() {
        let token = token_for(Role::Worker, "secret");
        let claims = verify_token(&token, "secret").unwrap();
        assert_eq!(claims.role, Role::Worker);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = token_for(Role::User, "secret");
        assert!(verify_token(&token, "other").is_err());
    }

    #[test]
    fn test_role_gates() {
        let admin = AuthUser {
            subject: "x".into(),
            role: Role::Admin,
        };
        let user = AuthUser {
            subject: "x".into(),
            role: Role::User,
        };
        assert!(admin.require_admin().is_ok());
        assert!(admin.require_worker().is_ok());
        assert!(user.require_admin().is_err());
        assert!(user.require_worker().is_err());
    }
}
