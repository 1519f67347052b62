//! Request identity.
//!
//! End-user authentication is the identity provider's problem; this layer
//! only trusts the opaque user id and forwards the OAuth token to the
//! provider client. Both arrive as headers on every request.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use docsmith_core::DocsmithError;

use crate::ApiError;

/// The authenticated caller: opaque identity-provider user id plus the
/// provider OAuth token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub token: String,
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .ok_or(ApiError(DocsmithError::Unauthorized))?
            .to_string();

        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .filter(|v| !v.is_empty())
            .ok_or(ApiError(DocsmithError::Unauthorized))?
            .to_string();

        Ok(AuthUser { user_id, token })
    }
}
