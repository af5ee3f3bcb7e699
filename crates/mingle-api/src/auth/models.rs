//! Domain models for accounts and refresh tokens
//!
//! An account owns an append-only list of refresh tokens. Old tokens are
//! never deleted; they are only ever marked revoked. Expiry is a pure
//! function of the stored timestamps, never a stored transition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A local user account
///
/// `password_hash` is `None` for federated-only accounts, which have no
/// usable local credential. `version` backs the store's compare-and-set:
/// every successful save increments it, and a stale save is rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Stable account identifier
    pub id: Uuid,

    /// Unique username
    pub username: String,

    /// Display name shown in session bundles
    pub display_name: String,

    /// Unique email address
    pub email: String,

    /// Argon2id credential hash; absent for federated-only accounts
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,

    /// Whether ownership of the email address has been proven
    pub email_confirmed: bool,

    /// Primary profile image URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Append-only refresh token list
    pub refresh_tokens: Vec<RefreshToken>,

    /// Store compare-and-set version
    pub version: u64,

    /// Account creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Create an account registered with a local credential
    ///
    /// The email starts unconfirmed; a session cannot be established until
    /// the confirmation flow completes.
    pub fn local(
        display_name: String,
        username: String,
        email: String,
        password_hash: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            username,
            display_name,
            email,
            password_hash: Some(password_hash),
            email_confirmed: false,
            image: None,
            refresh_tokens: Vec::new(),
            version: 0,
            created_at: Utc::now(),
        }
    }

    /// Create an account provisioned from a federated identity
    ///
    /// The username is the provider-verified email and there is no local
    /// credential. Whether the email counts as confirmed is the caller's
    /// policy decision.
    pub fn federated(
        display_name: String,
        email: String,
        image: Option<String>,
        email_confirmed: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: email.clone(),
            display_name,
            email,
            password_hash: None,
            email_confirmed,
            image,
            refresh_tokens: Vec::new(),
            version: 0,
            created_at: Utc::now(),
        }
    }

    /// Whether the account can authenticate with a local password
    pub fn has_usable_password(&self) -> bool {
        self.password_hash.is_some()
    }

    /// Find a stored refresh token by its opaque value
    pub fn find_refresh_token(&self, value: &str) -> Option<&RefreshToken> {
        self.refresh_tokens.iter().find(|t| t.token == value)
    }
}

/// A long-lived, revocable refresh token
///
/// `revoked_at`, once set, is never cleared; Active → Revoked is the only
/// stored transition. `replaced_by` links a revoked token to its successor
/// so that reuse of a stale token can take down the whole chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshToken {
    /// Token identifier used for succession links
    pub id: Uuid,

    /// Opaque random token value (URL-safe, cryptographically unguessable)
    pub token: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Creation + fixed lifetime
    pub expires_at: DateTime<Utc>,

    /// Revocation timestamp, if revoked
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<DateTime<Utc>>,

    /// Successor token, set when this token was rotated out
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replaced_by: Option<Uuid>,
}

impl RefreshToken {
    pub fn new(token: String, created_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            token,
            created_at,
            expires_at,
            revoked_at: None,
            replaced_by: None,
        }
    }

    /// Whether the fixed lifetime has elapsed at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Whether the token has been revoked
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    /// Active = not revoked and not expired
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.is_revoked() && !self.is_expired(now)
    }
}
