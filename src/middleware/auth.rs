//! Admin identity resolution
//!
//! The admin console fronts this service; session and permission mechanics
//! live there. Requests arrive with a shared service token and the acting
//! admin's identity, which this extractor resolves and hands to handlers.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use serde::Serialize;
use uuid::Uuid;

/// The acting administrator, resolved from request headers
#[derive(Debug, Clone)]
pub struct AdminAuth {
    pub admin_id: Uuid,
}

/// Error response for identity resolution failures
#[derive(Debug, Serialize)]
struct AuthError {
    error: AuthErrorDetails,
}

#[derive(Debug, Serialize)]
struct AuthErrorDetails {
    code: String,
    message: String,
}

impl AuthError {
    fn new(code: &str, message: &str) -> Self {
        Self {
            error: AuthErrorDetails {
                code: code.to_string(),
                message: message.to_string(),
            },
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (StatusCode::UNAUTHORIZED, Json(self)).into_response()
    }
}

/// Shared token the admin console authenticates with
#[derive(Clone)]
pub struct AdminToken(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for AdminAuth
where
    AdminToken: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| {
                    AuthError::new(
                        "MISSING_TOKEN",
                        "Authorization header with Bearer token required",
                    )
                    .into_response()
                })?;

        let AdminToken(expected) = AdminToken::from_ref(state);
        if bearer.token() != expected {
            return Err(AuthError::new("INVALID_TOKEN", "Invalid service token").into_response());
        }

        // The console states which administrator is acting; audit fields on
        // approvals and disbursements record this identity.
        let admin_id = parts
            .headers
            .get("x-admin-id")
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| {
                AuthError::new("MISSING_ADMIN_ID", "X-Admin-Id header required").into_response()
            })?;

        let admin_id = Uuid::parse_str(admin_id).map_err(|_| {
            AuthError::new("INVALID_ADMIN_ID", "X-Admin-Id must be a UUID").into_response()
        })?;

        Ok(AdminAuth { admin_id })
    }
}
