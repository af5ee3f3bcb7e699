//! Bearer-token authentication middleware
//!
//! Extracts and verifies the access token from the Authorization header.
//! Verification is a pure signature and expiry check; the store is never
//! consulted. On success the authenticated principal is added to request
//! extensions for handlers to extract.

use super::jwt::{subject_id, verify_access_token, Claims, JwtError};
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Authenticated principal extracted from a verified access token
///
/// Extract in handlers with `Extension<AuthenticatedUser>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    /// Account identifier
    pub account_id: Uuid,
    /// Account username
    pub username: String,
    /// Account display name
    pub display_name: String,
}

impl AuthenticatedUser {
    fn from_claims(claims: Claims) -> Result<Self, JwtError> {
        Ok(Self {
            account_id: subject_id(&claims)?,
            username: claims.username,
            display_name: claims.display_name,
        })
    }
}

/// Authentication middleware errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing Authorization header")]
    MissingAuthHeader,

    #[error("Invalid Authorization header format")]
    InvalidAuthHeader,

    #[error("Invalid token: {0}")]
    InvalidToken(#[from] JwtError),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message = match self {
            AuthError::MissingAuthHeader => "Missing Authorization header",
            AuthError::InvalidAuthHeader => "Invalid Authorization header format",
            AuthError::InvalidToken(_) => "Invalid or expired token",
        };

        let body = serde_json::json!({
            "code": "UNAUTHORIZED",
            "message": message,
        });

        (StatusCode::UNAUTHORIZED, axum::Json(body)).into_response()
    }
}

/// Require a valid bearer access token
///
/// Layered over protected routes with
/// `middleware::from_fn_with_state(state, auth_middleware)`.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidAuthHeader)?;

    let claims = verify_access_token(state.sessions.jwt_config(), token)?;
    let user = AuthenticatedUser::from_claims(claims)?;

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}
