//! Mingle API - credential issuance and session lifecycle service
//!
//! Hosts the HTTP surface over the session subsystem: local login and
//! registration, email verification, refresh token rotation, and federated
//! login.

pub mod auth;
pub mod email;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use crate::state::AppState;
use mingle_core::AppConfig;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health_check,
        handlers::account::register_handler,
        handlers::account::login_handler,
        handlers::account::verify_email_handler,
        handlers::account::resend_confirmation_handler,
        handlers::account::fb_login_handler,
        handlers::account::current_user_handler,
        handlers::account::refresh_handler,
    ),
    components(schemas(
        auth::service::RegisterRequest,
        auth::service::LoginRequest,
        auth::service::SessionUser,
        handlers::account::MessageResponse,
        error::ApiError,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "account", description = "Credential and session lifecycle"),
        (name = "health", description = "Service health"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .server
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    // Credentials are allowed (the refresh cookie), so origins stay explicit.
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

/// Build the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(handlers::health::health_check))
        .nest("/api/v1", routes::api_routes(state.clone()))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(any(test, feature = "test-utils"))]
pub mod test_support {
    //! Helpers for integration tests: an app wired to an in-memory store
    //! and a recording email transport.

    use super::*;
    use crate::auth::MemoryAccountStore;
    use crate::email::RecordingMailer;
    use chrono::Duration;

    pub struct TestApp {
        pub router: Router,
        pub state: Arc<AppState>,
        pub store: Arc<MemoryAccountStore>,
        pub mailer: Arc<RecordingMailer>,
    }

    /// Build a fully wired app over in-memory collaborators
    pub fn build_test_app(config: AppConfig) -> TestApp {
        let store = Arc::new(MemoryAccountStore::new(Duration::hours(
            config.auth.confirmation_expiration_hours,
        )));
        let mailer = Arc::new(RecordingMailer::new());
        let state = Arc::new(AppState::new(config, store.clone(), mailer.clone()));
        let router = create_router(state.clone());

        TestApp {
            router,
            state,
            store,
            mailer,
        }
    }

    /// App with default configuration
    pub fn create_router_for_testing() -> Router {
        build_test_app(AppConfig::default()).router
    }
}
