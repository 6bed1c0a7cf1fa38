//! Authentication handlers

use axum::extract::{ConnectInfo, Extension, Json, Path};
use axum::http::{
    header::{COOKIE, SET_COOKIE},
    HeaderMap, HeaderValue,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::extractors::AuthedUser;
use super::models::{
    LoginPayload, RegisterPayload, ResetLoginLimitPayload, UpdateMePayload, User, UserSettings,
};
use super::tokens::{
    access_token_ttl, issue_access_token, issue_refresh_token, refresh_token_ttl,
    register_token_ttl, verify_refresh_token, TokenError,
};
use crate::common::{safe_email_log, ApiError, AppState};
use crate::services::login_limiter::{LimitDecision, LoginLimiter};
use crate::services::password::{hash_password, verify_password};

const REFRESH_COOKIE_NAME: &str = "refreshToken";
const MIN_PASSWORD_LEN: usize = 6;

/// POST /api/auth/register
/// Creates a new account with a default settings sub-record
///
/// # Request Body
/// ```json
/// {
///   "email": "a@x.com",
///   "password": "pw123456",
///   "name": "Alice"
/// }
/// ```
///
/// # Response
/// ```json
/// {
///   "token": "<jwt token>",
///   "user": { "id": 1, "email": "a@x.com", "name": "Alice" }
/// }
/// ```
pub async fn register(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Json(payload): Json<RegisterPayload>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let state = state_lock.read().await.clone();

    let email = payload
        .email
        .filter(|e| !e.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("email and password are required".to_string()))?;
    let password = payload
        .password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::BadRequest("email and password are required".to_string()))?;

    if password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::ValidationError(
            "password must be at least 6 characters".to_string(),
        ));
    }

    let existing: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE email = ?")
        .bind(&email)
        .fetch_optional(&state.db)
        .await
        .map_err(ApiError::DatabaseError)?;

    if existing.is_some() {
        debug!(email = %safe_email_log(&email), "Registration rejected: email taken");
        return Err(ApiError::BadRequest("email already registered".to_string()));
    }

    let hashed = hash_password(&password)
        .map_err(|_| ApiError::InternalServer("password hashing failed".to_string()))?;

    // User row and settings sub-record land together or not at all
    let mut tx = state.db.begin().await.map_err(ApiError::DatabaseError)?;

    let result = sqlx::query("INSERT INTO users (email, password, name) VALUES (?, ?, ?)")
        .bind(&email)
        .bind(&hashed)
        .bind(payload.name.as_deref())
        .execute(&mut *tx)
        .await
        .map_err(ApiError::DatabaseError)?;
    let user_id = result.last_insert_rowid();

    sqlx::query("INSERT INTO user_settings (user_id) VALUES (?)")
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(ApiError::DatabaseError)?;

    tx.commit().await.map_err(ApiError::DatabaseError)?;

    let token = issue_access_token(
        &state.jwt_secret,
        user_id,
        Some(email.clone()),
        payload.name.clone(),
        register_token_ttl(),
    )
    .map_err(|_| ApiError::InternalServer("jwt error".to_string()))?;

    info!(
        user_id = user_id,
        email = %safe_email_log(&email),
        "New user account registered"
    );

    Ok(Json(serde_json::json!({
        "token": token,
        "user": {
            "id": user_id,
            "email": email,
            "name": payload.name,
        },
    })))
}

/// POST /api/auth/login
/// Verifies credentials behind the login rate limiter and issues both
/// tokens; the refresh token is persisted on the user row and set as an
/// HTTP-only cookie
///
/// # Request Body
/// ```json
/// {
///   "username": "a@x.com",
///   "password": "pw123456"
/// }
/// ```
///
/// # Response
/// ```json
/// {
///   "token": "<jwt token>",
///   "user": { "id": 1, "email": "a@x.com", "name": "Alice" },
///   "settings": { ... }
/// }
/// ```
pub async fn login(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(payload): Json<LoginPayload>,
) -> Result<(HeaderMap, Json<serde_json::Value>), ApiError> {
    let state = state_lock.read().await.clone();

    let email = payload
        .username
        .filter(|e| !e.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("email and password are required".to_string()))?;
    let password = payload
        .password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::BadRequest("email and password are required".to_string()))?;

    let ip = extract_ip_address(&headers, connect_info.as_ref())
        .unwrap_or_else(|| "unknown".to_string());
    let key = LoginLimiter::key(&ip, &email);

    // Every login POST counts as one attempt; blocked keys never reach the
    // credential store.
    let decision = match state.login_limiter.count_attempt(&key).await {
        Ok(decision) => decision,
        Err(e) => {
            warn!(error = %e, key = %key, "Login limiter unavailable, allowing request");
            LimitDecision::Allowed { attempts: 0 }
        }
    };

    let attempts = match decision {
        LimitDecision::Blocked {
            retry_after_secs,
            attempts,
            max_attempts,
        } => {
            warn!(
                email = %safe_email_log(&email),
                ip = %ip,
                attempts = attempts,
                "Login blocked by rate limiter"
            );
            return Err(ApiError::RateLimited {
                retry_after_secs,
                attempts,
                max_attempts,
            });
        }
        LimitDecision::Allowed { attempts } => attempts,
    };

    let user: Option<User> = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
        .bind(&email)
        .fetch_optional(&state.db)
        .await
        .map_err(ApiError::DatabaseError)?;

    let user = match user {
        Some(u) => u,
        None => {
            debug!(email = %safe_email_log(&email), "Login failed: user not found");
            return Err(ApiError::Unauthorized("user not found".to_string()));
        }
    };

    if !verify_password(&password, &user.password) {
        info!(
            email = %safe_email_log(&email),
            ip = %ip,
            attempts = attempts,
            "Login failed: wrong password"
        );
        return Err(ApiError::PasswordMismatch {
            attempts,
            max_attempts: state.login_limiter.max_attempts(),
        });
    }

    // Success wipes the key entirely; the counter is absent, not zero.
    if let Err(e) = state.login_limiter.clear(&key).await {
        warn!(error = %e, key = %key, "Failed to clear login attempt counter");
    }

    let token = issue_access_token(
        &state.jwt_secret,
        user.id,
        Some(user.email.clone()),
        user.name.clone(),
        access_token_ttl(),
    )
    .map_err(|_| ApiError::InternalServer("jwt error".to_string()))?;

    let refresh_token = issue_refresh_token(&state.refresh_secret, user.id)
        .map_err(|_| ApiError::InternalServer("jwt error".to_string()))?;

    // Persisting the raw token enables revocation by overwrite: only the
    // most recently issued refresh token is accepted.
    sqlx::query("UPDATE users SET refresh_token = ? WHERE id = ?")
        .bind(&refresh_token)
        .bind(user.id)
        .execute(&state.db)
        .await
        .map_err(ApiError::DatabaseError)?;

    let settings: Option<UserSettings> =
        sqlx::query_as::<_, UserSettings>("SELECT * FROM user_settings WHERE user_id = ?")
            .bind(user.id)
            .fetch_optional(&state.db)
            .await
            .map_err(ApiError::DatabaseError)?;

    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        SET_COOKIE,
        refresh_cookie(&refresh_token, state.cookie_secure)
            .map_err(|_| ApiError::InternalServer("cookie error".to_string()))?,
    );

    info!(user_id = user.id, email = %safe_email_log(&user.email), "User login successful");

    Ok((
        response_headers,
        Json(serde_json::json!({
            "token": token,
            "user": {
                "id": user.id,
                "email": user.email,
                "name": user.name,
            },
            "settings": settings,
        })),
    ))
}

/// POST /api/auth/refresh-token
/// Exchanges the refresh token cookie for a new access token. The presented
/// token must match the one stored on the user row; the refresh token
/// itself is not rotated.
pub async fn refresh_token(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let state = state_lock.read().await.clone();

    let presented = read_refresh_cookie(&headers)
        .ok_or_else(|| ApiError::Unauthorized("no refresh token".to_string()))?;

    let claims = match verify_refresh_token(&state.refresh_secret, &presented) {
        Ok(claims) => claims,
        Err(TokenError::Expired) => {
            debug!("Refresh rejected: token expired");
            return Err(ApiError::Unauthorized("refresh token expired".to_string()));
        }
        Err(TokenError::Invalid) => {
            warn!("Refresh rejected: invalid token");
            return Err(ApiError::Unauthorized("invalid refresh token".to_string()));
        }
    };

    let user: Option<User> = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(claims.sub)
        .fetch_optional(&state.db)
        .await
        .map_err(ApiError::DatabaseError)?;

    let user = match user {
        Some(u) if u.refresh_token.as_deref() == Some(presented.as_str()) => u,
        _ => {
            warn!(user_id = claims.sub, "Refresh rejected: stored token mismatch");
            return Err(ApiError::Unauthorized("invalid refresh token".to_string()));
        }
    };

    let token = issue_access_token(
        &state.jwt_secret,
        user.id,
        Some(user.email.clone()),
        user.name.clone(),
        access_token_ttl(),
    )
    .map_err(|_| ApiError::InternalServer("jwt error".to_string()))?;

    debug!(user_id = user.id, "Access token refreshed");

    Ok(Json(serde_json::json!({ "token": token })))
}

/// GET /api/auth/me
/// Returns the current user's sanitized projection
pub async fn me_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    authed: AuthedUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let state = state_lock.read().await.clone();

    let user: Option<User> = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(authed.user_id)
        .fetch_optional(&state.db)
        .await
        .map_err(ApiError::DatabaseError)?;

    // The row can vanish between token issuance and lookup
    let user = user.ok_or_else(|| ApiError::NotFound("user not found".to_string()))?;

    let settings: Option<UserSettings> =
        sqlx::query_as::<_, UserSettings>("SELECT * FROM user_settings WHERE user_id = ?")
            .bind(user.id)
            .fetch_optional(&state.db)
            .await
            .map_err(ApiError::DatabaseError)?;

    Ok(Json(serde_json::json!({
        "id": user.id,
        "email": user.email,
        "name": user.name,
        "avatar": user.avatar,
        "settings": settings,
    })))
}

/// PUT /api/auth/me
/// Patches the mutable display fields (name, avatar)
pub async fn update_me_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    authed: AuthedUser,
    Json(payload): Json<UpdateMePayload>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let state = state_lock.read().await.clone();

    sqlx::query(
        "UPDATE users SET name = COALESCE(?, name), avatar = COALESCE(?, avatar) WHERE id = ?",
    )
    .bind(payload.name.as_deref())
    .bind(payload.avatar.as_deref())
    .bind(authed.user_id)
    .execute(&state.db)
    .await
    .map_err(ApiError::DatabaseError)?;

    let user: User = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(authed.user_id)
        .fetch_one(&state.db)
        .await
        .map_err(ApiError::DatabaseError)?;

    debug!(user_id = user.id, "Profile updated");

    Ok(Json(serde_json::json!({
        "id": user.id,
        "email": user.email,
        "name": user.name,
        "avatar": user.avatar,
    })))
}

/// POST /api/auth/reset-login-limit
/// Admin-only: clears every login attempt counter tied to the given email
///
/// # Request Body
/// ```json
/// { "email": "a@x.com" }
/// ```
pub async fn reset_login_limit(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    authed: AuthedUser,
    Json(payload): Json<ResetLoginLimitPayload>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let state = state_lock.read().await.clone();

    require_admin(&state, authed.user_id).await?;

    let email = payload
        .email
        .filter(|e| !e.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("email is required".to_string()))?;

    let cleared = state
        .login_limiter
        .reset_matching(&email)
        .await
        .map_err(|e| ApiError::InternalServer(e.to_string()))?;

    info!(
        admin_id = authed.user_id,
        email = %safe_email_log(&email),
        cleared = cleared,
        "Login limit reset by administrator"
    );

    Ok(Json(serde_json::json!({
        "message": format!("login limit reset for {}", email),
        "cleared": cleared,
    })))
}

/// GET /api/auth/login-attempts/:email
/// Admin-only: inspect the attempt counters tied to an email
pub async fn login_attempts(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    authed: AuthedUser,
    Path(email): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let state = state_lock.read().await.clone();

    require_admin(&state, authed.user_id).await?;

    let statuses = state
        .login_limiter
        .status_for(&email)
        .await
        .map_err(|e| ApiError::InternalServer(e.to_string()))?;

    let max_attempts = state.login_limiter.max_attempts();
    let locked = statuses.iter().any(|s| s.attempts >= max_attempts);
    let total: u32 = statuses.iter().map(|s| s.attempts).sum();

    Ok(Json(serde_json::json!({
        "email": email,
        "login_attempts": statuses,
        "is_locked": locked,
        "total_attempts": total,
    })))
}

// ---- Helper Functions ----

/// Admin status comes from the caller's stored email, not the token claim,
/// so a profile change takes effect without waiting for token expiry.
async fn require_admin(state: &AppState, user_id: i64) -> Result<(), ApiError> {
    let row: Option<(String,)> = sqlx::query_as("SELECT email FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(&state.db)
        .await
        .map_err(ApiError::DatabaseError)?;

    let email = row
        .map(|(email,)| email.to_lowercase())
        .ok_or_else(|| ApiError::Forbidden("admin privileges required".to_string()))?;

    if !state.admin_emails.contains(&email) {
        warn!(
            user_id = user_id,
            email = %safe_email_log(&email),
            "Admin endpoint rejected: not an administrator"
        );
        return Err(ApiError::Forbidden("admin privileges required".to_string()));
    }

    Ok(())
}

/// Extract the client address from proxy headers or the connection
pub(super) fn extract_ip_address(
    headers: &HeaderMap,
    connect_info: Option<&ConnectInfo<SocketAddr>>,
) -> Option<String> {
    // Try X-Forwarded-For header first (for proxied requests)
    if let Some(forwarded) = headers.get("x-forwarded-for") {
        if let Ok(forwarded_str) = forwarded.to_str() {
            // Take the first IP in the chain
            if let Some(first_ip) = forwarded_str.split(',').next() {
                return Some(first_ip.trim().to_string());
            }
        }
    }

    // Try X-Real-IP header
    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(ip_str) = real_ip.to_str() {
            return Some(ip_str.to_string());
        }
    }

    // Fall back to connection info
    connect_info.map(|info| info.0.ip().to_string())
}

/// Build the HTTP-only refresh token cookie
pub(super) fn refresh_cookie(
    token: &str,
    secure: bool,
) -> Result<HeaderValue, axum::http::header::InvalidHeaderValue> {
    let max_age = refresh_token_ttl().num_seconds();
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Strict; Max-Age={}",
        REFRESH_COOKIE_NAME, token, max_age
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Read the refresh token out of the Cookie header
pub(super) fn read_refresh_cookie(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        if name == REFRESH_COOKIE_NAME && !value.is_empty() {
            Some(value.to_string())
        } else {
            None
        }
    })
}
