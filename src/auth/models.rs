//! Authentication data models

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// User database model
///
/// The password hash and stored refresh token never leave the server;
/// responses are built from explicit sanitized projections.
#[derive(FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub name: Option<String>,
    pub avatar: Option<String>,
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    pub created_at: Option<String>,
}

/// Per-user settings sub-record, created with defaults at registration
#[derive(FromRow, Serialize, Debug, Clone)]
pub struct UserSettings {
    pub user_id: i64,
    pub reminder_enabled: bool,
    pub privacy_level: i64,
    pub theme: String,
    pub language: String,
}

#[derive(Deserialize)]
pub struct RegisterPayload {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
}

/// Login body; the client sends the email under `username`
#[derive(Deserialize)]
pub struct LoginPayload {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateMePayload {
    pub name: Option<String>,
    pub avatar: Option<String>,
}

#[derive(Deserialize)]
pub struct ResetLoginLimitPayload {
    pub email: Option<String>,
}
