//! Recruiter identity: bcrypt password hashes, HS256 session tokens, and the
//! `RecruiterIdentity` extractor guarding recruiter-only routes.

pub mod handlers;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;

const TOKEN_TTL_HOURS: i64 = 1;
const TOKEN_COOKIE: &str = "token";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        AppError::Internal(anyhow::Error::new(e))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Recruiter id.
    pub sub: Uuid,
    pub exp: i64,
    pub iat: i64,
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    Ok(bcrypt::hash(password, bcrypt::DEFAULT_COST)?)
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    Ok(bcrypt::verify(password, hash)?)
}

pub fn issue_token(recruiter_id: Uuid, secret: &str) -> Result<String, AuthError> {
    let now = Utc::now();
    let claims = Claims {
        sub: recruiter_id,
        iat: now.timestamp(),
        exp: (now + Duration::hours(TOKEN_TTL_HOURS)).timestamp(),
    };
    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?)
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )?;
    Ok(data.claims)
}

/// Bearer token from `Authorization`, else the `token` cookie.
fn token_from_parts(parts: &Parts) -> Option<&str> {
    if let Some(value) = parts.headers.get(header::AUTHORIZATION) {
        if let Some(token) = value.to_str().ok().and_then(|v| v.strip_prefix("Bearer ")) {
            return Some(token.trim());
        }
    }

    parts
        .headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == TOKEN_COOKIE)
        .map(|(_, value)| value)
}

/// The authenticated recruiter behind a request.
#[derive(Debug, Clone, Copy)]
pub struct RecruiterIdentity {
    pub recruiter_id: Uuid,
}

#[async_trait]
impl FromRequestParts<AppState> for RecruiterIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = token_from_parts(parts).ok_or_else(|| {
            warn!("Missing recruiter token on {}", parts.uri.path());
            AppError::Unauthorized
        })?;

        let claims = verify_token(token, &state.config.jwt_secret).map_err(|e| {
            warn!("Rejected recruiter token: {e}");
            AppError::Unauthorized
        })?;

        Ok(RecruiterIdentity {
            recruiter_id: claims.sub,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    const SECRET: &str = "test-secret";

    fn parts(builder: axum::http::request::Builder) -> Parts {
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_token_round_trip_yields_recruiter_id() {
        let id = Uuid::new_v4();
        let token = issue_token(id, SECRET).unwrap();
        let claims = verify_token(&token, SECRET).unwrap();
        assert_eq!(claims.sub, id);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_token_with_wrong_secret_is_rejected() {
        let token = issue_token(Uuid::new_v4(), SECRET).unwrap();
        assert!(verify_token(&token, "other-secret").is_err());
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let claims = Claims {
            sub: Uuid::new_v4(),
            iat: 1_000,
            exp: 2_000,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();
        assert!(verify_token(&token, SECRET).is_err());
    }

    #[test]
    fn test_password_hash_verifies() {
        let hash = hash_password("hunter22").unwrap();
        assert!(verify_password("hunter22", &hash).unwrap());
        assert!(!verify_password("hunter23", &hash).unwrap());
    }

    #[test]
    fn test_token_from_bearer_header() {
        let p = parts(Request::builder().header("Authorization", "Bearer abc.def"));
        assert_eq!(token_from_parts(&p), Some("abc.def"));
    }

    #[test]
    fn test_token_from_cookie() {
        let p = parts(Request::builder().header("Cookie", "theme=dark; token=xyz"));
        assert_eq!(token_from_parts(&p), Some("xyz"));
    }

    #[test]
    fn test_no_token() {
        let p = parts(Request::builder().header("Authorization", "Basic Zm9v"));
        assert_eq!(token_from_parts(&p), None);
    }
}
