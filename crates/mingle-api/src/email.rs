//! Outbound email delivery
//!
//! The session subsystem only ever hands a finished message to a transport;
//! delivery is fire-and-forget from the caller's perspective. The production
//! transport posts to the SendGrid JSON API. A recording transport backs the
//! tests.

use async_trait::async_trait;
use mingle_core::EmailConfig;
use reqwest::Client;
use serde::Serialize;
use std::sync::Mutex;
use thiserror::Error;

/// Email delivery errors
#[derive(Debug, Error)]
pub enum EmailError {
    #[error("email transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("email delivery rejected with status {status}")]
    Delivery { status: u16 },

    #[error("email delivery is not configured")]
    NotConfigured,
}

/// Outbound email transport
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Deliver a single HTML message to one recipient
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), EmailError>;
}

#[derive(Debug, Serialize)]
struct MailAddress<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct Personalization<'a> {
    to: Vec<MailAddress<'a>>,
}

#[derive(Debug, Serialize)]
struct MailContent<'a> {
    #[serde(rename = "type")]
    content_type: &'a str,
    value: &'a str,
}

#[derive(Debug, Serialize)]
struct MailSendRequest<'a> {
    personalizations: Vec<Personalization<'a>>,
    from: MailAddress<'a>,
    subject: &'a str,
    content: Vec<MailContent<'a>>,
}

/// SendGrid JSON API transport
pub struct SendGridMailer {
    client: Client,
    api_key: Option<String>,
    from_address: String,
    from_name: String,
    base_url: String,
}

impl SendGridMailer {
    /// Create a transport from the email configuration
    pub fn from_config(config: &EmailConfig) -> Self {
        Self {
            client: Client::new(),
            api_key: config.api_key.clone(),
            from_address: config.from_address.clone(),
            from_name: config.from_name.clone(),
            base_url: config.base_url.clone(),
        }
    }
}

#[async_trait]
impl EmailSender for SendGridMailer {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), EmailError> {
        let api_key = self.api_key.as_deref().ok_or(EmailError::NotConfigured)?;

        let request = MailSendRequest {
            personalizations: vec![Personalization {
                to: vec![MailAddress { email: to, name: None }],
            }],
            from: MailAddress {
                email: &self.from_address,
                name: Some(&self.from_name),
            },
            subject,
            content: vec![MailContent {
                content_type: "text/html",
                value: html_body,
            }],
        };

        let response = self
            .client
            .post(format!("{}/v3/mail/send", self.base_url))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(EmailError::Delivery {
                status: response.status().as_u16(),
            });
        }

        tracing::debug!(recipient = %to, subject = %subject, "email accepted for delivery");
        Ok(())
    }
}

/// A message captured by [`RecordingMailer`]
#[derive(Debug, Clone)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

/// In-memory transport that records messages instead of delivering them
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<SentEmail>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every message handed to the transport so far
    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().expect("mailer lock poisoned").clone()
    }
}

#[async_trait]
impl EmailSender for RecordingMailer {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), EmailError> {
        self.sent.lock().expect("mailer lock poisoned").push(SentEmail {
            to: to.to_string(),
            subject: subject.to_string(),
            html_body: html_body.to_string(),
        });
        Ok(())
    }
}
