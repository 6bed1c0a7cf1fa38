//! Authentication routes

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers;

/// Creates and returns the authentication router
///
/// # Routes
/// - `POST /api/auth/register` - Create an account
/// - `POST /api/auth/login` - Rate-limited credential login
/// - `POST /api/auth/refresh-token` - Exchange the refresh cookie for a new access token
/// - `GET /api/auth/me` / `PUT /api/auth/me` - Current user profile
/// - `POST /api/auth/reset-login-limit` - Admin: clear attempt counters
/// - `GET /api/auth/login-attempts/:email` - Admin: inspect attempt counters
pub fn auth_routes() -> Router {
    Router::new()
        .route("/api/auth/register", post(handlers::register))
        .route("/api/auth/login", post(handlers::login))
        .route("/api/auth/refresh-token", post(handlers::refresh_token))
        .route(
            "/api/auth/me",
            get(handlers::me_handler).put(handlers::update_me_handler),
        )
        .route(
            "/api/auth/reset-login-limit",
            post(handlers::reset_login_limit),
        )
        .route(
            "/api/auth/login-attempts/:email",
            get(handlers::login_attempts),
        )
}
