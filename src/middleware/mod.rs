//! Middleware for the microlend API
//!
//! This module provides middleware for request tracing, rate limiting,
//! security headers, and admin identity resolution.

pub mod auth;
mod rate_limiter;
mod security;
mod tracing;

pub use auth::AdminAuth;
pub use rate_limiter::{rate_limit_layer, rate_limiter_cleanup, RateLimiter};
pub use security::security_headers;
pub use tracing::request_tracing;
