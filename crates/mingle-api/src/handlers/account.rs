//! Account and session API handlers
//!
//! The refresh token travels in an HTTP-only cookie whose lifetime matches
//! the token's own expiry; the access token is returned in the session
//! bundle and presented back as a bearer header.

use crate::auth::{AuthenticatedUser, EstablishedSession, LoginRequest, RegisterRequest, SessionUser};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderName},
    response::{AppendHeaders, IntoResponse},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

/// Name of the refresh token transport cookie
const REFRESH_COOKIE: &str = "refreshToken";

/// Plain message response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct VerifyEmailParams {
    /// URL-safe encoded confirmation secret
    pub token: String,
    /// Email address the secret was issued for
    pub email: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ResendParams {
    pub email: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FacebookLoginParams {
    pub access_token: String,
}

/// Origin for links embedded in outbound email: the request's Origin header
/// when present, the configured client origin otherwise
fn request_origin(headers: &HeaderMap, state: &AppState) -> String {
    headers
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| state.config.server.client_origin.clone())
}

fn refresh_cookie(token: &str, max_age_secs: i64) -> String {
    format!(
        "{REFRESH_COOKIE}={token}; Max-Age={max_age_secs}; Path=/api/v1/account; HttpOnly; SameSite=Strict"
    )
}

fn extract_refresh_cookie(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    raw.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == REFRESH_COOKIE).then(|| value.to_string())
    })
}

/// Session bundle plus the refresh cookie
fn session_response(
    state: &AppState,
    session: EstablishedSession,
) -> (AppendHeaders<[(HeaderName, String); 1]>, Json<SessionUser>) {
    let cookie = refresh_cookie(
        &session.refresh_token.token,
        state.sessions.refresh_lifetime_secs(),
    );
    (
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Json(session.user),
    )
}

/// Register a new account
///
/// No session is issued; the response is a prompt to complete email
/// verification.
#[utoipa::path(
    post,
    path = "/api/v1/account/register",
    tag = "account",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Registered, confirmation email sent", body = MessageResponse),
        (status = 400, description = "Validation failed", body = crate::error::ApiError),
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let origin = request_origin(&headers, &state);
    state.sessions.register(request, &origin).await?;

    Ok(Json(MessageResponse::new(
        "Registration success - please verify your email",
    )))
}

/// Login with email and password
#[utoipa::path(
    post,
    path = "/api/v1/account/login",
    tag = "account",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = SessionUser),
        (status = 401, description = "Invalid credentials or unconfirmed email", body = crate::error::ApiError),
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.sessions.login(request).await?;
    Ok(session_response(&state, session))
}

/// Confirm an email address with a transported secret
#[utoipa::path(
    post,
    path = "/api/v1/account/verify-email",
    tag = "account",
    params(VerifyEmailParams),
    responses(
        (status = 200, description = "Email confirmed", body = MessageResponse),
        (status = 400, description = "Could not verify email address", body = crate::error::ApiError),
        (status = 401, description = "Unknown email", body = crate::error::ApiError),
    )
)]
pub async fn verify_email_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<VerifyEmailParams>,
) -> Result<impl IntoResponse, AppError> {
    state
        .sessions
        .verify_email(&params.email, &params.token)
        .await?;

    Ok(Json(MessageResponse::new(
        "Email confirmed - you can now login",
    )))
}

/// Re-send the email confirmation link
#[utoipa::path(
    get,
    path = "/api/v1/account/resend-email-confirmation-link",
    tag = "account",
    params(ResendParams),
    responses(
        (status = 200, description = "Verification link resent", body = MessageResponse),
        (status = 401, description = "Unknown email", body = crate::error::ApiError),
    )
)]
pub async fn resend_confirmation_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<ResendParams>,
) -> Result<impl IntoResponse, AppError> {
    let origin = request_origin(&headers, &state);
    state
        .sessions
        .resend_confirmation(&params.email, &origin)
        .await?;

    Ok(Json(MessageResponse::new("Email verification link resent")))
}

/// Login through the Facebook identity provider
#[utoipa::path(
    post,
    path = "/api/v1/account/fb-login",
    tag = "account",
    params(FacebookLoginParams),
    responses(
        (status = 200, description = "Login successful", body = SessionUser),
        (status = 401, description = "Provider rejected the token", body = crate::error::ApiError),
        (status = 502, description = "Provider unreachable", body = crate::error::ApiError),
    )
)]
pub async fn fb_login_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FacebookLoginParams>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.sessions.facebook_login(&params.access_token).await?;
    Ok(session_response(&state, session))
}

/// Current user's session bundle
///
/// Also rotates in a fresh refresh cookie, keeping long-lived clients
/// seated without an explicit refresh call.
#[utoipa::path(
    get,
    path = "/api/v1/account",
    tag = "account",
    responses(
        (status = 200, description = "Current session bundle", body = SessionUser),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn current_user_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.sessions.current_user(user.account_id).await?;
    Ok(session_response(&state, session))
}

/// Exchange the refresh cookie for a new session
///
/// The presented token is rotated: revoked and replaced by the successor in
/// the returned cookie. Replaying a spent token is rejected.
#[utoipa::path(
    post,
    path = "/api/v1/account/refresh-token",
    tag = "account",
    responses(
        (status = 200, description = "Session refreshed", body = SessionUser),
        (status = 401, description = "Missing, expired, or revoked refresh token", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn refresh_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let presented = extract_refresh_cookie(&headers)
        .ok_or_else(|| AppError::unauthorized("Unauthorized"))?;

    let session = state.sessions.refresh(user.account_id, &presented).await?;
    Ok(session_response(&state, session))
}
