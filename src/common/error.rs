// Error handling types for the API

use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::fmt;
use tracing::error;

/// API error types
#[derive(Debug)]
pub enum ApiError {
    Unauthorized(String),
    Forbidden(String),
    BadRequest(String),
    NotFound(String),
    InternalServer(String),
    DatabaseError(sqlx::Error),
    ValidationError(String),
    /// Login attempt limit reached for a rate-limiter key.
    RateLimited {
        retry_after_secs: u64,
        attempts: u32,
        max_attempts: u32,
    },
    /// Wrong password for an existing account. Carries the attempt counter so
    /// the client can show how many tries remain before lockout.
    PasswordMismatch { attempts: u32, max_attempts: u32 },
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            ApiError::InternalServer(msg) => write!(f, "Internal Server Error: {}", msg),
            ApiError::DatabaseError(e) => write!(f, "Database Error: {}", e),
            ApiError::ValidationError(msg) => write!(f, "Validation Error: {}", msg),
            ApiError::RateLimited { attempts, .. } => {
                write!(f, "Rate Limited: {} attempts", attempts)
            }
            ApiError::PasswordMismatch { attempts, .. } => {
                write!(f, "Password Mismatch: attempt {}", attempts)
            }
        }
    }
}

/// JSON error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Serialize)]
struct RateLimitBody {
    error: String,
    message: String,
    code: String,
    retry_after: u64,
    attempts: u32,
    max_attempts: u32,
}

#[derive(Serialize)]
struct PasswordMismatchBody {
    error: String,
    code: String,
    attempts: u32,
    max_attempts: u32,
    remaining_attempts: u32,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_message, code) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg, "UNAUTHORIZED"),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg, "FORBIDDEN"),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, "BAD_REQUEST"),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, "NOT_FOUND"),
            ApiError::InternalServer(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                msg,
                "INTERNAL_SERVER_ERROR",
            ),
            ApiError::DatabaseError(e) => {
                error!(error = %e, "Database error occurred");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database operation failed".to_string(),
                    "DATABASE_ERROR",
                )
            }
            ApiError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg, "VALIDATION_ERROR"),
            ApiError::RateLimited {
                retry_after_secs,
                attempts,
                max_attempts,
            } => {
                let body = RateLimitBody {
                    error: "too many login attempts".to_string(),
                    message: format!(
                        "Login is temporarily locked for this account. Try again in {} seconds or contact an administrator.",
                        retry_after_secs
                    ),
                    code: "RATE_LIMIT_EXCEEDED".to_string(),
                    retry_after: retry_after_secs,
                    attempts,
                    max_attempts,
                };
                let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
                if let Ok(retry_header) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                    response.headers_mut().insert(RETRY_AFTER, retry_header);
                }
                return response;
            }
            ApiError::PasswordMismatch {
                attempts,
                max_attempts,
            } => {
                let body = PasswordMismatchBody {
                    error: "incorrect password".to_string(),
                    code: "INVALID_CREDENTIALS".to_string(),
                    attempts,
                    max_attempts,
                    remaining_attempts: max_attempts.saturating_sub(attempts),
                };
                return (StatusCode::UNAUTHORIZED, Json(body)).into_response();
            }
        };

        let error_response = ErrorResponse {
            error: error_message,
            code: code.to_string(),
        };

        (status, Json(error_response)).into_response()
    }
}
