// Application state shared across all modules

use sqlx::SqlitePool;
use std::collections::HashSet;
use std::sync::Arc;

use crate::services::LoginLimiter;

/// Application state containing the database pool, token secrets, and the
/// login rate limiter
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub jwt_secret: String,
    pub refresh_secret: String,
    pub admin_emails: HashSet<String>,
    /// Mark the refresh token cookie `Secure` (production deployments only).
    pub cookie_secure: bool,
    pub login_limiter: Arc<LoginLimiter>,
}
