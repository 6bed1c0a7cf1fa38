//! Access and refresh token issuance and verification
//!
//! Both token kinds are HS256-signed JWTs over separate secrets. Access
//! tokens carry the user's id plus display claims; refresh tokens carry the
//! id only. Verification distinguishes an expired token from an invalid one
//! so clients can choose between a silent refresh and a forced re-login.

use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Claims embedded in an access token
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AccessClaims {
    pub sub: i64,
    pub email: Option<String>,
    pub name: Option<String>,
    pub iat: i64,
    pub exp: i64,
}

/// Claims embedded in a refresh token
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RefreshClaims {
    pub sub: i64,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("invalid token")]
    Invalid,
}

/// Access token validity after login
pub fn access_token_ttl() -> Duration {
    Duration::hours(1)
}

/// Registration hands out a longer first token so the fresh account stays
/// signed in through initial setup.
pub fn register_token_ttl() -> Duration {
    Duration::hours(24)
}

/// Refresh token validity
pub fn refresh_token_ttl() -> Duration {
    Duration::days(7)
}

pub fn issue_access_token(
    secret: &str,
    user_id: i64,
    email: Option<String>,
    name: Option<String>,
    ttl: Duration,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let claims = AccessClaims {
        sub: user_id,
        email,
        name,
        iat: now.timestamp(),
        exp: (now + ttl).timestamp(),
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn issue_refresh_token(
    secret: &str,
    user_id: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let claims = RefreshClaims {
        sub: user_id,
        iat: now.timestamp(),
        exp: (now + refresh_token_ttl()).timestamp(),
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn verify_access_token(secret: &str, token: &str) -> Result<AccessClaims, TokenError> {
    decode::<AccessClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map(|data| data.claims)
    .map_err(classify)
}

pub fn verify_refresh_token(secret: &str, token: &str) -> Result<RefreshClaims, TokenError> {
    decode::<RefreshClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map(|data| data.claims)
    .map_err(classify)
}

fn classify(e: jsonwebtoken::errors::Error) -> TokenError {
    match e.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::Invalid,
    }
}
