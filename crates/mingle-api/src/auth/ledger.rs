//! Refresh token issuance, rotation, and revocation
//!
//! The ledger operates on an account's in-memory token list; persisting the
//! mutated account is the caller's job, under the store's compare-and-set.
//! Rotation is the only mutation path on existing tokens and nothing can
//! resurrect a revoked token.

use super::models::{Account, RefreshToken};
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use thiserror::Error;
use uuid::Uuid;

/// Rotation failures
///
/// Both variants must surface to the caller as Unauthorized; the distinction
/// exists so reuse of a once-valid token can be logged as a theft signal.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RotationError {
    #[error("presented refresh token was never issued for this account")]
    UnknownToken,

    #[error("presented refresh token is no longer active")]
    InactiveToken,
}

/// Issues and rotates an account's refresh tokens
#[derive(Debug, Clone)]
pub struct RefreshTokenLedger {
    lifetime: Duration,
}

impl RefreshTokenLedger {
    pub fn new(lifetime_days: i64) -> Self {
        Self {
            lifetime: Duration::days(lifetime_days),
        }
    }

    /// Refresh token lifetime in seconds, for cookie expiry
    pub fn lifetime_secs(&self) -> i64 {
        self.lifetime.num_seconds()
    }

    /// Generate a high-entropy opaque token value
    fn generate_value() -> String {
        let token_bytes: [u8; 32] = rand::thread_rng().gen();
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(token_bytes)
    }

    /// Append a fresh token to the account's list and return it
    pub fn issue(&self, account: &mut Account, now: DateTime<Utc>) -> RefreshToken {
        let token = RefreshToken::new(Self::generate_value(), now, now + self.lifetime);
        account.refresh_tokens.push(token.clone());
        token
    }

    /// Exchange a presented token value for a fresh one
    ///
    /// The presented token must exist and be active. On success it is
    /// revoked, linked to its successor, and the successor is returned.
    ///
    /// A presented token that exists but is no longer active is the reuse
    /// boundary: it may mean the value was stolen and already spent, so in
    /// addition to rejecting, every active successor reachable over
    /// `replaced_by` is revoked. The caller must persist the account even on
    /// that error path.
    pub fn rotate(
        &self,
        account: &mut Account,
        presented: &str,
        now: DateTime<Utc>,
    ) -> Result<RefreshToken, RotationError> {
        let index = account
            .refresh_tokens
            .iter()
            .position(|t| t.token == presented)
            .ok_or(RotationError::UnknownToken)?;

        if !account.refresh_tokens[index].is_active(now) {
            let successor = account.refresh_tokens[index].replaced_by;
            Self::revoke_chain(account, successor, now);
            return Err(RotationError::InactiveToken);
        }

        let replacement = self.issue(account, now);
        let old = &mut account.refresh_tokens[index];
        old.revoked_at = Some(now);
        old.replaced_by = Some(replacement.id);

        Ok(replacement)
    }

    /// Revoke every token reachable over `replaced_by` from `start`
    fn revoke_chain(account: &mut Account, start: Option<Uuid>, now: DateTime<Utc>) {
        let mut next = start;
        while let Some(id) = next {
            let Some(token) = account.refresh_tokens.iter_mut().find(|t| t.id == id) else {
                break;
            };
            if token.revoked_at.is_none() {
                token.revoked_at = Some(now);
            }
            next = token.replaced_by;
        }
    }
}
