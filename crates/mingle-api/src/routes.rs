//! API route definitions

use crate::auth::middleware::auth_middleware;
use crate::handlers::account;
use crate::state::AppState;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Create API v1 routes
pub fn api_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/account/register", post(account::register_handler))
        .route("/account/login", post(account::login_handler))
        .route("/account/verify-email", post(account::verify_email_handler))
        .route(
            "/account/resend-email-confirmation-link",
            get(account::resend_confirmation_handler),
        )
        .route("/account/fb-login", post(account::fb_login_handler));

    // Protected routes (valid bearer token required)
    let protected_routes = Router::new()
        .route("/account", get(account::current_user_handler))
        .route("/account/refresh-token", post(account::refresh_handler))
        .layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new().merge(public_routes).merge(protected_routes)
}
