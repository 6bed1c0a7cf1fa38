//! Authentication extractors for Axum

use async_trait::async_trait;
use axum::{
    extract::{Extension, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::tokens::{verify_access_token, TokenError};
use crate::common::{ApiError, AppState};

/// Authenticated user extractor
///
/// Validates the bearer token from the `Authorization` header and exposes
/// its claims. This is a pure function of the header and the access secret;
/// no database lookup happens here.
#[derive(Debug)]
pub struct AuthedUser {
    pub user_id: i64,
    pub email: Option<String>,
    pub name: Option<String>,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // Extract the Extension containing the AppState
        let Extension(state_lock): Extension<Arc<RwLock<AppState>>> =
            Extension::from_request_parts(parts, state)
                .await
                .map_err(|_| ApiError::InternalServer("missing app state".to_string()))?;

        let jwt_secret = state_lock.read().await.jwt_secret.clone();

        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok());

        let header = match header {
            Some(h) => h,
            None => {
                warn!("Authentication failed: missing Authorization header");
                return Err(ApiError::Unauthorized("no token provided".into()));
            }
        };

        // Require "Bearer <token>" with a non-empty token segment
        let token = match header.strip_prefix("Bearer ") {
            Some(rest) if !rest.trim().is_empty() => rest.trim(),
            _ => {
                warn!("Authentication failed: malformed Authorization header");
                return Err(ApiError::Unauthorized("malformed token".into()));
            }
        };

        let claims = match verify_access_token(&jwt_secret, token) {
            Ok(claims) => claims,
            Err(TokenError::Expired) => {
                debug!("Authentication failed: token expired");
                return Err(ApiError::Unauthorized("token expired".into()));
            }
            Err(TokenError::Invalid) => {
                warn!("Authentication failed: invalid token");
                return Err(ApiError::Forbidden("invalid token".into()));
            }
        };

        debug!(user_id = claims.sub, "Token validated via extractor");

        Ok(AuthedUser {
            user_id: claims.sub,
            email: claims.email,
            name: claims.name,
        })
    }
}
