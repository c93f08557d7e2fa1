//! Bearer-token authentication adapter.
//!
//! Accounts and token issuance belong to the platform's auth service; this
//! module only verifies the HS256 token it hands out and resolves the
//! calling account id.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::{errors::AppError, AppState};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Account id
    pub sub: String,
    pub exp: usize,
}

/// The authenticated caller of a request
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub account_id: Uuid,
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(AppError::Unauthenticated)?;
        let account_id = verify_jwt(token, &state.config.jwt_secret).ok_or(AppError::Unauthenticated)?;
        Ok(AuthUser { account_id })
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let header = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

/// Verify a token and return the account id it was issued for
pub fn verify_jwt(token: &str, secret: &str) -> Option<Uuid> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .ok()?;

    Uuid::parse_str(&data.claims.sub).ok()
}

/// Issue a token for an account (tooling and tests)
pub fn create_jwt(account_id: Uuid, secret: &str) -> anyhow::Result<String> {
    let expiration = Utc::now()
        .checked_add_signed(chrono::Duration::hours(24))
        .ok_or_else(|| anyhow::anyhow!("Token expiry overflow"))?
        .timestamp();

    let claims = Claims {
        sub: account_id.to_string(),
        exp: expiration as usize,
    };

    Ok(encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jwt_round_trip() {
        let account_id = Uuid::new_v4();
        let token = create_jwt(account_id, "secret-one").unwrap();

        assert_eq!(verify_jwt(&token, "secret-one"), Some(account_id));
        assert_eq!(verify_jwt(&token, "secret-two"), None);
        assert_eq!(verify_jwt("not-a-token", "secret-one"), None);
    }

    #[test]
    fn test_expired_token_rejected() {
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            exp: (Utc::now().timestamp() - 3600) as usize,
        };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(b"s")).unwrap();
        assert_eq!(verify_jwt(&token, "s"), None);
    }

    #[test]
    fn test_non_uuid_subject_rejected() {
        let claims = Claims {
            sub: "admin".to_string(),
            exp: (Utc::now().timestamp() + 3600) as usize,
        };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(b"s")).unwrap();
        assert_eq!(verify_jwt(&token, "s"), None);
    }

    #[test]
    fn test_bearer_token_parsing() {
        let request = axum::http::Request::builder()
            .header(AUTHORIZATION, "Bearer abc.def")
            .body(())
            .unwrap();
        let (parts, _) = request.into_parts();
        assert_eq!(bearer_token(&parts), Some("abc.def"));

        let request = axum::http::Request::builder()
            .header(AUTHORIZATION, "Basic Zm9vOmJhcg==")
            .body(())
            .unwrap();
        let (parts, _) = request.into_parts();
        assert_eq!(bearer_token(&parts), None);
    }
}
