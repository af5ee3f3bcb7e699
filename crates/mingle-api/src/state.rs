//! Application state management

use crate::auth::{AccountStore, SessionService};
use crate::email::EmailSender;
use mingle_core::AppConfig;
use std::sync::Arc;

/// Application state shared across handlers
///
/// All durable state lives behind the account store; the state struct
/// itself only wires configuration and collaborators together.
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Session lifecycle service
    pub sessions: SessionService,
}

impl AppState {
    /// Create application state with the given store and email transport
    pub fn new(
        config: AppConfig,
        store: Arc<dyn AccountStore>,
        mailer: Arc<dyn EmailSender>,
    ) -> Self {
        let sessions = SessionService::new(&config, store, mailer);
        Self { config, sessions }
    }
}
