//! Mingle API Server
//!
//! HTTP server for the credential issuance and session lifecycle service.

use chrono::Duration;
use mingle_api::auth::MemoryAccountStore;
use mingle_api::email::SendGridMailer;
use mingle_api::{create_router, state::AppState};
use mingle_core::AppConfig;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mingle_api=debug,tower_http=debug".into()),
        )
        .init();

    // Load configuration
    let config = AppConfig::from_env().unwrap_or_default();
    let addr = format!("{}:{}", config.server.host, config.server.port);

    // Wire collaborators: in-memory account store, SendGrid email transport
    let store = Arc::new(MemoryAccountStore::new(Duration::hours(
        config.auth.confirmation_expiration_hours,
    )));
    let mailer = Arc::new(SendGridMailer::from_config(&config.email));

    // Create application state and router
    let state = Arc::new(AppState::new(config, store, mailer));
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Mingle API Server starting on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
