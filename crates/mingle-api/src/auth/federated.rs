//! Federated identity bridging
//!
//! Validates a client-supplied provider access token server-to-server,
//! fetches the verified profile, and folds it into a local account. The one
//! place where login and registration collapse into a single find-or-create.

use super::models::Account;
use super::store::{AccountStore, StoreError};
use crate::error::AppError;
use mingle_core::FacebookConfig;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;

/// Profile payload returned by the Graph API
#[derive(Debug, Clone, Deserialize)]
pub struct FederatedProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub picture: Option<ProfilePicture>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProfilePicture {
    pub data: ProfilePictureData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProfilePictureData {
    pub url: String,
}

impl FederatedProfile {
    fn avatar_url(&self) -> Option<String> {
        self.picture.as_ref().map(|p| p.data.url.clone())
    }
}

/// Bridges provider-verified identities into local accounts
pub struct FederatedLoginBridge {
    client: Client,
    store: Arc<dyn AccountStore>,
    config: FacebookConfig,
    trust_provider_email: bool,
}

impl FederatedLoginBridge {
    pub fn new(
        store: Arc<dyn AccountStore>,
        config: FacebookConfig,
        trust_provider_email: bool,
    ) -> Self {
        Self {
            client: Client::new(),
            store,
            config,
            trust_provider_email,
        }
    }

    /// Authenticate a provider access token and resolve the local account
    ///
    /// The token is introspected with the app credential pair before anything
    /// else; a token the provider does not vouch for is rejected outright.
    /// Both provider calls complete before any account mutation, so a
    /// failure on either leaves no trace.
    pub async fn authenticate(&self, provider_access_token: &str) -> Result<Account, AppError> {
        self.verify_token(provider_access_token).await?;
        let profile = self.fetch_profile(provider_access_token).await?;
        self.find_or_create(&profile).await
    }

    /// Introspect the token with the provider using the app credential pair
    async fn verify_token(&self, provider_access_token: &str) -> Result<(), AppError> {
        let verify_keys = format!("{}|{}", self.config.app_id, self.config.app_secret);

        let response = self
            .client
            .get(format!("{}/debug_token", self.config.graph_base_url))
            .query(&[
                ("input_token", provider_access_token),
                ("access_token", &verify_keys),
            ])
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("token verification failed: {e}")))?;

        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "provider rejected access token");
            return Err(AppError::unauthorized("Unauthorized"));
        }

        Ok(())
    }

    /// Fetch the verified profile with the now-trusted token
    async fn fetch_profile(
        &self,
        provider_access_token: &str,
    ) -> Result<FederatedProfile, AppError> {
        let response = self
            .client
            .get(format!("{}/me", self.config.graph_base_url))
            .query(&[
                ("access_token", provider_access_token),
                ("fields", "name,email,picture.width(100).height(100)"),
            ])
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("profile fetch failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::Provider(format!(
                "profile fetch rejected with status {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Provider(format!("profile fetch failed: {e}")))
    }

    /// Resolve the profile to a local account by verified email
    async fn find_or_create(&self, profile: &FederatedProfile) -> Result<Account, AppError> {
        match self.store.find_by_email(&profile.email).await {
            Ok(account) => Ok(account),
            Err(StoreError::NotFound) => {
                let account = Account::federated(
                    profile.name.clone(),
                    profile.email.clone(),
                    profile.avatar_url(),
                    self.trust_provider_email,
                );

                tracing::info!(email = %profile.email, "provisioning account from federated identity");
                self.store.create(account).await.map_err(|e| match e {
                    StoreError::EmailTaken | StoreError::UsernameTaken => {
                        AppError::BadRequest("Problem creating user account".to_string())
                    }
                    other => AppError::Persistence(other.to_string()),
                })
            }
            Err(e) => Err(AppError::Persistence(e.to_string())),
        }
    }
}
