//! Bearer-token authentication.
//!
//! Tokens are HS256 JWTs carrying the user id in `sub`. [`AuthUser`] accepts any
//! existing user with a valid token; [`AdminUser`] additionally requires the
//! `is_admin` flag.

use crate::{
    api::AppState,
    config::AuthConfig,
    core::user::get_user,
    entities::UserModel,
    errors::{Error, Result},
};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

/// JWT payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: i64,
    /// Expiry, seconds since the epoch
    pub exp: usize,
}

/// Mints a token for `user_id` valid for `token_ttl_hours`.
pub fn issue_token(auth: &AuthConfig, user_id: i64) -> Result<String> {
    let expires = Utc::now() + Duration::hours(auth.token_ttl_hours);
    let exp = usize::try_from(expires.timestamp()).map_err(|_| Error::Config {
        message: format!("Token expiry out of range: {expires}"),
    })?;

    encode(
        &Header::default(),
        &Claims { sub: user_id, exp },
        &EncodingKey::from_secret(auth.jwt_secret.as_bytes()),
    )
    .map_err(|e| Error::Config {
        message: format!("Failed to sign token: {e}"),
    })
}

/// Checks signature and expiry and returns the claims.
pub fn verify_token(auth: &AuthConfig, token: &str) -> Result<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(auth.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| Error::Unauthorized {
        message: format!("Invalid token: {e}"),
    })
}

fn bearer_token(parts: &Parts) -> Result<&str> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or_else(|| Error::Unauthorized {
            message: "Missing Authorization header".to_string(),
        })?;
    header
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| Error::Unauthorized {
            message: "Expected 'Authorization: Bearer <token>'".to_string(),
        })
}

/// Any authenticated user.
#[derive(Debug, Clone)]
pub struct AuthUser(pub UserModel);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let token = bearer_token(parts)?;
        let claims = verify_token(&state.config.auth, token)?;
        let user = get_user(&state.db, claims.sub)
            .await?
            .ok_or_else(|| Error::Unauthorized {
                message: format!("User {} no longer exists", claims.sub),
            })?;
        Ok(Self(user))
    }
}

/// An authenticated user with the admin flag.
#[derive(Debug, Clone)]
pub struct AdminUser(pub UserModel);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin {
            tracing::warn!(user_id = user.id, "non-admin tried an admin endpoint");
            return Err(Error::Forbidden);
        }
        Ok(Self(user))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn auth() -> AuthConfig {
        AuthConfig {
            jwt_secret: "test-secret".to_string(),
            token_ttl_hours: 1,
        }
    }

    #[test]
    fn test_token_round_trip() {
        let token = issue_token(&auth(), 42).unwrap();
        assert_eq!(verify_token(&auth(), &token).unwrap().sub, 42);
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let token = issue_token(&auth(), 42).unwrap();
        let other = AuthConfig {
            jwt_secret: "another".to_string(),
            ..auth()
        };
        assert!(matches!(
            verify_token(&other, &token),
            Err(Error::Unauthorized { .. })
        ));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let expired = AuthConfig {
            token_ttl_hours: -2,
            ..auth()
        };
        let token = issue_token(&expired, 42).unwrap();
        assert!(verify_token(&auth(), &token).is_err());
    }
}
