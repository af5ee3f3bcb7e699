//! Account store abstraction and in-memory implementation
//!
//! The store is the subsystem's only shared mutable state. Its contract is
//! per-account read-modify-write: `save` is a compare-and-set on the
//! account's version, so two concurrent writers cannot both win. The
//! confirmation mechanism is owned by the store; callers only ever see the
//! opaque secret bytes.

use super::models::Account;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("account not found")]
    NotFound,

    #[error("email already registered")]
    EmailTaken,

    #[error("username already taken")]
    UsernameTaken,

    #[error("stale account version")]
    VersionConflict,

    #[error("confirmation secret mismatch or expired")]
    SecretMismatch,

    #[error("store backend failure: {0}")]
    Backend(String),
}

/// Keyed account lookup and per-account atomic update
///
/// Implementations must make `save` behave as a compare-and-set on
/// `Account.version`: the write succeeds only if the stored version equals
/// the incoming one, and the stored version is incremented on success.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Insert a new account, enforcing email and username uniqueness
    async fn create(&self, account: Account) -> Result<Account, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Account, StoreError>;

    /// Case-insensitive email lookup
    async fn find_by_email(&self, email: &str) -> Result<Account, StoreError>;

    /// Case-insensitive username lookup
    async fn find_by_username(&self, username: &str) -> Result<Account, StoreError>;

    /// Compare-and-set write of a previously loaded account
    async fn save(&self, account: Account) -> Result<Account, StoreError>;

    /// Mint a fresh email-confirmation secret for the account
    ///
    /// At most one secret is outstanding per account: issuing a new one
    /// supersedes any previous secret.
    async fn issue_confirmation_secret(&self, account_id: Uuid) -> Result<Vec<u8>, StoreError>;

    /// Consume a confirmation secret and mark the email confirmed
    ///
    /// Confirming an already-confirmed account succeeds without touching
    /// any state.
    async fn confirm_email(&self, account_id: Uuid, secret: &[u8]) -> Result<(), StoreError>;
}

struct PendingConfirmation {
    secret_hash: [u8; 32],
    expires_at: DateTime<Utc>,
}

#[derive(Default)]
struct MemoryInner {
    accounts: HashMap<Uuid, Account>,
    by_email: HashMap<String, Uuid>,
    by_username: HashMap<String, Uuid>,
    confirmations: HashMap<Uuid, PendingConfirmation>,
}

/// In-memory account store
///
/// Single-process only. The interior `RwLock` gives each call the atomicity
/// the trait contract requires; durability is out of scope here.
pub struct MemoryAccountStore {
    secret_ttl: Duration,
    inner: RwLock<MemoryInner>,
}

impl MemoryAccountStore {
    pub fn new(secret_ttl: Duration) -> Self {
        Self {
            secret_ttl,
            inner: RwLock::new(MemoryInner::default()),
        }
    }

    /// Number of stored accounts
    pub async fn account_count(&self) -> usize {
        self.inner.read().await.accounts.len()
    }

    fn hash_secret(secret: &[u8]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(secret);
        hasher.finalize().into()
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn create(&self, account: Account) -> Result<Account, StoreError> {
        let mut inner = self.inner.write().await;

        let email_key = account.email.to_lowercase();
        let username_key = account.username.to_lowercase();

        if inner.by_email.contains_key(&email_key) {
            return Err(StoreError::EmailTaken);
        }
        if inner.by_username.contains_key(&username_key) {
            return Err(StoreError::UsernameTaken);
        }

        inner.by_email.insert(email_key, account.id);
        inner.by_username.insert(username_key, account.id);
        inner.accounts.insert(account.id, account.clone());

        Ok(account)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Account, StoreError> {
        self.inner
            .read()
            .await
            .accounts
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn find_by_email(&self, email: &str) -> Result<Account, StoreError> {
        let inner = self.inner.read().await;
        let id = inner
            .by_email
            .get(&email.to_lowercase())
            .ok_or(StoreError::NotFound)?;
        inner.accounts.get(id).cloned().ok_or(StoreError::NotFound)
    }

    async fn find_by_username(&self, username: &str) -> Result<Account, StoreError> {
        let inner = self.inner.read().await;
        let id = inner
            .by_username
            .get(&username.to_lowercase())
            .ok_or(StoreError::NotFound)?;
        inner.accounts.get(id).cloned().ok_or(StoreError::NotFound)
    }

    async fn save(&self, account: Account) -> Result<Account, StoreError> {
        let mut inner = self.inner.write().await;

        let stored_version = inner
            .accounts
            .get(&account.id)
            .ok_or(StoreError::NotFound)?
            .version;

        if stored_version != account.version {
            return Err(StoreError::VersionConflict);
        }

        let mut updated = account;
        updated.version += 1;
        inner.accounts.insert(updated.id, updated.clone());

        Ok(updated)
    }

    async fn issue_confirmation_secret(&self, account_id: Uuid) -> Result<Vec<u8>, StoreError> {
        let mut inner = self.inner.write().await;

        if !inner.accounts.contains_key(&account_id) {
            return Err(StoreError::NotFound);
        }

        let secret: [u8; 32] = rand::thread_rng().gen();
        // Overwriting supersedes any previously outstanding secret.
        inner.confirmations.insert(
            account_id,
            PendingConfirmation {
                secret_hash: Self::hash_secret(&secret),
                expires_at: Utc::now() + self.secret_ttl,
            },
        );

        Ok(secret.to_vec())
    }

    async fn confirm_email(&self, account_id: Uuid, secret: &[u8]) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;

        let already_confirmed = inner
            .accounts
            .get(&account_id)
            .ok_or(StoreError::NotFound)?
            .email_confirmed;
        if already_confirmed {
            return Ok(());
        }

        let (secret_hash, expires_at) = {
            let pending = inner
                .confirmations
                .get(&account_id)
                .ok_or(StoreError::SecretMismatch)?;
            (pending.secret_hash, pending.expires_at)
        };

        if Utc::now() >= expires_at {
            inner.confirmations.remove(&account_id);
            return Err(StoreError::SecretMismatch);
        }
        if secret_hash != Self::hash_secret(secret) {
            return Err(StoreError::SecretMismatch);
        }

        inner.confirmations.remove(&account_id);
        let account = inner
            .accounts
            .get_mut(&account_id)
            .ok_or(StoreError::NotFound)?;
        account.email_confirmed = true;
        account.version += 1;

        Ok(())
    }
}
