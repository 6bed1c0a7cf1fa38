//! # Auth Module
//!
//! This module handles all authentication-related functionality including:
//! - Registration and rate-limited password login
//! - Access/refresh token issuance and validation
//! - AuthedUser extractor for protected routes
//! - Admin endpoints for the login attempt limiter

pub mod extractors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod tokens;


pub use extractors::AuthedUser;
pub use models::User;
pub use routes::auth_routes;
