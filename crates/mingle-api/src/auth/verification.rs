//! Email ownership verification
//!
//! Issues single-use confirmation secrets through the account store,
//! transports them as URL-safe strings inside a link, and folds successful
//! confirmations back into the account. Resending supersedes the previous
//! secret rather than leaving two valid at once.

use super::store::{AccountStore, StoreError};
use crate::email::EmailSender;
use crate::error::AppError;
use crate::auth::models::Account;
use base64::Engine;
use std::sync::Arc;

/// Drives confirmation-link issuance and validation
#[derive(Clone)]
pub struct EmailVerificationFlow {
    store: Arc<dyn AccountStore>,
    mailer: Arc<dyn EmailSender>,
}

impl EmailVerificationFlow {
    pub fn new(store: Arc<dyn AccountStore>, mailer: Arc<dyn EmailSender>) -> Self {
        Self { store, mailer }
    }

    /// Encode a confirmation secret for transport in a URL
    pub fn encode_secret(secret: &[u8]) -> String {
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(secret)
    }

    /// Decode a transported confirmation secret back to its exact bytes
    pub fn decode_secret(encoded: &str) -> Result<Vec<u8>, base64::DecodeError> {
        base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(encoded)
    }

    /// Issue a fresh secret and hand a verification link to the mailer
    ///
    /// Safe to call repeatedly: each call supersedes the previous secret and
    /// never locks the account. A delivery failure surfaces to the caller
    /// but leaves the account untouched.
    pub async fn request(&self, account: &Account, origin: &str) -> Result<(), AppError> {
        let secret = self
            .store
            .issue_confirmation_secret(account.id)
            .await
            .map_err(|e| AppError::Persistence(e.to_string()))?;

        let token = Self::encode_secret(&secret);
        let verify_url = format!("{origin}/verify?token={token}&email={}", account.email);
        let message = format!(
            "<p>Please click the below link to verify your email address:</p>\
             <p><a href=\"{verify_url}\">Click to verify email</a></p>"
        );

        tracing::info!(account_id = %account.id, "sending email verification link");
        self.mailer
            .send(&account.email, "Please verify email", &message)
            .await
            .map_err(|e| AppError::Provider(e.to_string()))?;

        Ok(())
    }

    /// Validate a transported secret and mark the account's email confirmed
    ///
    /// An unknown email is Unauthorized; a malformed, mismatched, or expired
    /// secret is the recoverable "could not verify" outcome. Confirming an
    /// already-confirmed account succeeds silently.
    pub async fn confirm(&self, email: &str, encoded_token: &str) -> Result<(), AppError> {
        let account = self
            .store
            .find_by_email(email)
            .await
            .map_err(|_| AppError::unauthorized("Unauthorized"))?;

        let secret = Self::decode_secret(encoded_token).map_err(|_| AppError::CouldNotVerify)?;

        match self.store.confirm_email(account.id, &secret).await {
            Ok(()) => Ok(()),
            Err(StoreError::SecretMismatch) => Err(AppError::CouldNotVerify),
            Err(e) => Err(AppError::Persistence(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::store::MemoryAccountStore;
    use crate::email::RecordingMailer;
    use chrono::Duration;
    use proptest::prelude::*;

    fn flow() -> (EmailVerificationFlow, Arc<MemoryAccountStore>, Arc<RecordingMailer>) {
        let store = Arc::new(MemoryAccountStore::new(Duration::hours(24)));
        let mailer = Arc::new(RecordingMailer::new());
        let flow = EmailVerificationFlow::new(store.clone(), mailer.clone());
        (flow, store, mailer)
    }

    fn sample_account() -> Account {
        Account::local(
            "Alice".to_string(),
            "alice".to_string(),
            "a@x.com".to_string(),
            "hash".to_string(),
        )
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let secret = b"\x00\x01\xfe\xffsome-secret-bytes";
        let encoded = EmailVerificationFlow::encode_secret(secret);
        let decoded = EmailVerificationFlow::decode_secret(&encoded).unwrap();
        assert_eq!(decoded, secret);
    }

    proptest! {
        #[test]
        fn prop_encode_decode_round_trips_exactly(secret in proptest::collection::vec(any::<u8>(), 1..64)) {
            let encoded = EmailVerificationFlow::encode_secret(&secret);
            let decoded = EmailVerificationFlow::decode_secret(&encoded).unwrap();
            prop_assert_eq!(decoded, secret);
        }
    }

    #[tokio::test]
    async fn test_request_delivers_link_with_valid_secret() {
        let (flow, store, mailer) = flow();
        let account = store.create(sample_account()).await.unwrap();

        flow.request(&account, "http://localhost:3000").await.unwrap();

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "a@x.com");
        assert!(sent[0]
            .html_body
            .contains("http://localhost:3000/verify?token="));

        // The transported token confirms the account
        let body = &sent[0].html_body;
        let start = body.find("token=").unwrap() + "token=".len();
        let end = body[start..].find('&').unwrap() + start;
        let token = &body[start..end];

        flow.confirm("a@x.com", token).await.unwrap();
        let reloaded = store.find_by_id(account.id).await.unwrap();
        assert!(reloaded.email_confirmed);
    }

    #[tokio::test]
    async fn test_resend_supersedes_previous_secret() {
        let (flow, store, mailer) = flow();
        let account = store.create(sample_account()).await.unwrap();

        flow.request(&account, "http://localhost:3000").await.unwrap();
        flow.request(&account, "http://localhost:3000").await.unwrap();

        let sent = mailer.sent();
        assert_eq!(sent.len(), 2);

        let token_of = |body: &str| {
            let start = body.find("token=").unwrap() + "token=".len();
            let end = body[start..].find('&').unwrap() + start;
            body[start..end].to_string()
        };
        let first = token_of(&sent[0].html_body);
        let second = token_of(&sent[1].html_body);
        assert_ne!(first, second);

        // The superseded secret no longer verifies
        let result = flow.confirm("a@x.com", &first).await;
        assert!(matches!(result, Err(AppError::CouldNotVerify)));

        flow.confirm("a@x.com", &second).await.unwrap();
    }

    #[tokio::test]
    async fn test_confirm_unknown_email_is_unauthorized() {
        let (flow, _store, _mailer) = flow();
        let result = flow.confirm("ghost@x.com", "anything").await;
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_confirm_garbage_token_is_recoverable() {
        let (flow, store, _mailer) = flow();
        store.create(sample_account()).await.unwrap();

        let result = flow.confirm("a@x.com", "!!not-base64!!").await;
        assert!(matches!(result, Err(AppError::CouldNotVerify)));
    }

    #[tokio::test]
    async fn test_confirm_already_confirmed_succeeds() {
        let (flow, store, mailer) = flow();
        let account = store.create(sample_account()).await.unwrap();

        flow.request(&account, "http://localhost:3000").await.unwrap();
        let body = &mailer.sent()[0].html_body;
        let start = body.find("token=").unwrap() + "token=".len();
        let end = body[start..].find('&').unwrap() + start;
        let token = body[start..end].to_string();

        flow.confirm("a@x.com", &token).await.unwrap();
        // Second confirmation with the consumed token still succeeds
        flow.confirm("a@x.com", &token).await.unwrap();

        let reloaded = store.find_by_id(account.id).await.unwrap();
        assert!(reloaded.email_confirmed);
    }
}
