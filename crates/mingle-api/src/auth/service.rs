//! Session service layer
//!
//! Orchestrates login, registration, refresh, and federated login. This is
//! the only component that talks to the account store and the email
//! transport; it holds no state of its own between requests.

use super::federated::FederatedLoginBridge;
use super::jwt::{create_access_token, JwtConfig};
use super::ledger::{RefreshTokenLedger, RotationError};
use super::models::{Account, RefreshToken};
use super::password::{hash_password, validate_password_strength, verify_password};
use super::store::{AccountStore, StoreError};
use super::verification::EmailVerificationFlow;
use crate::email::EmailSender;
use crate::error::AppError;
use chrono::Utc;
use mingle_core::AppConfig;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Bounded retry budget for compare-and-set contention on one account
const MAX_CAS_ATTEMPTS: usize = 3;

/// Local registration request
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(length(min = 2, max = 100, message = "Display name must be 2-100 characters"))]
    pub display_name: String,
    #[validate(length(min = 3, max = 30, message = "Username must be 3-30 characters"))]
    pub username: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    pub password: String,
}

/// Local login request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// User-facing session bundle
///
/// `image` is populated only when the account has a primary image; absent
/// otherwise, never a placeholder.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionUser {
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub token: String,
    pub username: String,
}

/// A freshly established session: the user bundle plus the refresh token
/// destined for the transport cookie
#[derive(Debug, Clone)]
pub struct EstablishedSession {
    pub user: SessionUser,
    pub refresh_token: RefreshToken,
}

/// Orchestrates the credential and session lifecycle
#[derive(Clone)]
pub struct SessionService {
    store: Arc<dyn AccountStore>,
    jwt: JwtConfig,
    ledger: RefreshTokenLedger,
    verification: EmailVerificationFlow,
    bridge: Arc<FederatedLoginBridge>,
}

impl SessionService {
    pub fn new(
        config: &AppConfig,
        store: Arc<dyn AccountStore>,
        mailer: Arc<dyn EmailSender>,
    ) -> Self {
        Self {
            store: store.clone(),
            jwt: JwtConfig::from_auth_config(&config.auth),
            ledger: RefreshTokenLedger::new(config.auth.refresh_expiration_days),
            verification: EmailVerificationFlow::new(store.clone(), mailer),
            bridge: Arc::new(FederatedLoginBridge::new(
                store,
                config.facebook.clone(),
                config.auth.trust_provider_email,
            )),
        }
    }

    /// Signing configuration, shared with the auth middleware
    pub fn jwt_config(&self) -> &JwtConfig {
        &self.jwt
    }

    /// Refresh token lifetime in seconds, for the transport cookie
    pub fn refresh_lifetime_secs(&self) -> i64 {
        self.ledger.lifetime_secs()
    }

    /// Authenticate a local credential and establish a session
    ///
    /// The email must be confirmed before the credential is even checked;
    /// an unconfirmed account is a first-class Unauthorized outcome, not a
    /// fault.
    pub async fn login(&self, request: LoginRequest) -> Result<EstablishedSession, AppError> {
        let account = self
            .store
            .find_by_email(&request.email)
            .await
            .map_err(|_| AppError::unauthorized("Invalid email"))?;

        if !account.email_confirmed {
            return Err(AppError::unauthorized("Email not confirmed"));
        }

        let hash = account
            .password_hash
            .as_deref()
            .ok_or_else(|| AppError::unauthorized("Invalid password"))?;

        let valid = verify_password(&request.password, hash)
            .map_err(|e| AppError::Internal(e.to_string()))?;
        if !valid {
            return Err(AppError::unauthorized("Invalid password"));
        }

        tracing::info!(account_id = %account.id, "local login succeeded");
        self.establish_session(account.id).await
    }

    /// Register a local account and trigger email verification
    ///
    /// Duplicate email or username is field-level validation feedback, not
    /// Unauthorized. No session is issued; the caller waits for the
    /// confirmation flow.
    pub async fn register(&self, request: RegisterRequest, origin: &str) -> Result<(), AppError> {
        request.validate()?;
        validate_password_strength(&request.password)
            .map_err(|msg| AppError::field_error("password", msg))?;

        if self.store.find_by_email(&request.email).await.is_ok() {
            return Err(AppError::field_error("email", "Email taken"));
        }
        if self.store.find_by_username(&request.username).await.is_ok() {
            return Err(AppError::field_error("username", "Username taken"));
        }

        let password_hash =
            hash_password(&request.password).map_err(|e| AppError::Internal(e.to_string()))?;
        let account = Account::local(
            request.display_name,
            request.username,
            request.email,
            password_hash,
        );

        let account = self.store.create(account).await.map_err(|e| match e {
            StoreError::EmailTaken => AppError::field_error("email", "Email taken"),
            StoreError::UsernameTaken => AppError::field_error("username", "Username taken"),
            other => AppError::Persistence(other.to_string()),
        })?;

        tracing::info!(account_id = %account.id, "account registered, pending confirmation");
        self.verification.request(&account, origin).await
    }

    /// Rotate a presented refresh token and establish a fresh session
    ///
    /// Runs under the store's compare-and-set: a concurrent rotation of the
    /// same token makes this attempt reload and observe the token already
    /// revoked, so at most one of the racers succeeds. When reuse of a
    /// stale token is detected, the defensive chain revocation is persisted
    /// before the request is rejected.
    pub async fn refresh(
        &self,
        account_id: Uuid,
        presented: &str,
    ) -> Result<EstablishedSession, AppError> {
        for _ in 0..MAX_CAS_ATTEMPTS {
            let mut account = self
                .store
                .find_by_id(account_id)
                .await
                .map_err(|_| AppError::unauthorized("Unauthorized"))?;

            match self.ledger.rotate(&mut account, presented, Utc::now()) {
                Ok(replacement) => match self.store.save(account).await {
                    Ok(saved) => return self.bundle(saved, replacement),
                    Err(StoreError::VersionConflict) => continue,
                    Err(e) => return Err(AppError::Persistence(e.to_string())),
                },
                Err(RotationError::UnknownToken) => {
                    return Err(AppError::unauthorized("Unauthorized"));
                }
                Err(RotationError::InactiveToken) => {
                    tracing::warn!(
                        account_id = %account_id,
                        "refresh token reuse detected; revoking successor chain"
                    );
                    match self.store.save(account).await {
                        Err(StoreError::VersionConflict) => continue,
                        Ok(_) => return Err(AppError::unauthorized("Unauthorized")),
                        Err(e) => {
                            tracing::error!(error = %e, "failed to persist chain revocation");
                            return Err(AppError::unauthorized("Unauthorized"));
                        }
                    }
                }
            }
        }

        Err(AppError::Persistence(
            "account update contended beyond retry budget".to_string(),
        ))
    }

    /// Authenticate against the identity provider and establish a session
    ///
    /// Identical to the login success branch once the bridge has resolved
    /// the account; no local credential is involved.
    pub async fn facebook_login(
        &self,
        provider_access_token: &str,
    ) -> Result<EstablishedSession, AppError> {
        let account = self.bridge.authenticate(provider_access_token).await?;
        self.establish_session(account.id).await
    }

    /// Re-issue the session bundle for an already-authenticated account
    pub async fn current_user(&self, account_id: Uuid) -> Result<EstablishedSession, AppError> {
        self.establish_session(account_id).await
    }

    /// Validate a transported confirmation secret
    pub async fn verify_email(&self, email: &str, token: &str) -> Result<(), AppError> {
        self.verification.confirm(email, token).await
    }

    /// Re-trigger the confirmation flow for an unconfirmed account
    pub async fn resend_confirmation(&self, email: &str, origin: &str) -> Result<(), AppError> {
        let account = self
            .store
            .find_by_email(email)
            .await
            .map_err(|_| AppError::unauthorized("Unauthorized"))?;

        self.verification.request(&account, origin).await
    }

    /// Issue a fresh refresh token and sign an access token for the account
    async fn establish_session(&self, account_id: Uuid) -> Result<EstablishedSession, AppError> {
        for _ in 0..MAX_CAS_ATTEMPTS {
            let mut account = self
                .store
                .find_by_id(account_id)
                .await
                .map_err(|_| AppError::unauthorized("Unauthorized"))?;

            let refresh = self.ledger.issue(&mut account, Utc::now());
            match self.store.save(account).await {
                Ok(saved) => return self.bundle(saved, refresh),
                Err(StoreError::VersionConflict) => continue,
                Err(e) => return Err(AppError::Persistence(e.to_string())),
            }
        }

        Err(AppError::Persistence(
            "account update contended beyond retry budget".to_string(),
        ))
    }

    fn bundle(
        &self,
        account: Account,
        refresh_token: RefreshToken,
    ) -> Result<EstablishedSession, AppError> {
        let token = create_access_token(&self.jwt, &account)
            .map_err(|e| AppError::Internal(e.to_string()))?;

        Ok(EstablishedSession {
            user: SessionUser {
                display_name: account.display_name,
                image: account.image,
                token,
                username: account.username,
            },
            refresh_token,
        })
    }
}
