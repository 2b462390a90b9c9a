//! Transactional email provider client.
//!
//! # Responsibilities
//! - Hand a composed message to the provider in one call
//! - Bound the call with the configured timeout
//! - Translate provider error payloads into `ProviderError`
//!
//! # Design Decisions
//! - Single attempt per message, no retry
//! - The relay only sees the `EmailProvider` trait

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;

use crate::config::EmailConfig;
use crate::relay::email::OutgoingEmail;

/// Identifier the provider assigns to an accepted message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmailId(pub String);

impl fmt::Display for EmailId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors that can occur while handing a message to the provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Connection, TLS or body decoding failure.
    #[error("provider request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The provider did not answer within the configured bound.
    #[error("provider timed out after {0} seconds")]
    Timeout(u64),

    /// The provider answered with an error payload.
    #[error("provider rejected email ({status}): {message}")]
    Rejected {
        status: u16,
        name: Option<String>,
        message: String,
    },

    /// Accepted response without an id.
    #[error("provider response did not include an email id")]
    MissingId,
}

/// The one operation the relay needs from an email provider.
#[async_trait]
pub trait EmailProvider: Send + Sync {
    /// Send `email` once. Returns the provider's id on acceptance.
    async fn send(&self, email: &OutgoingEmail) -> Result<EmailId, ProviderError>;
}

#[derive(Serialize)]
struct ResendRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    reply_to: &'a str,
    subject: &'a str,
    html: &'a str,
}

#[derive(Deserialize)]
struct ResendAccepted {
    id: Option<String>,
}

#[derive(Deserialize)]
struct ResendFailure {
    name: Option<String>,
    message: Option<String>,
}

/// [Resend](https://resend.com) HTTP API client.
#[derive(Clone)]
pub struct ResendProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    timeout_secs: u64,
}

impl ResendProvider {
    /// Build a client from email configuration.
    pub fn new(config: &EmailConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("contact-relay/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/emails", config.provider_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            timeout_secs: config.timeout_secs,
        })
    }
}

impl ResendProvider {
    /// One request/response exchange, body included.
    async fn exchange(&self, email: &OutgoingEmail) -> Result<EmailId, ProviderError> {
        let body = ResendRequest {
            from: &email.from,
            to: [email.to.as_str()],
            reply_to: &email.reply_to,
            subject: &email.subject,
            html: &email.html,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let failure: Option<ResendFailure> = serde_json::from_str(&text).ok();
            let (name, message) = match failure {
                Some(f) => (f.name, f.message.unwrap_or_else(|| text.clone())),
                None => (None, text.clone()),
            };
            return Err(ProviderError::Rejected {
                status: status.as_u16(),
                name,
                message,
            });
        }

        match serde_json::from_str::<ResendAccepted>(&text) {
            Ok(ResendAccepted { id: Some(id) }) if !id.is_empty() => Ok(EmailId(id)),
            _ => Err(ProviderError::MissingId),
        }
    }
}

#[async_trait]
impl EmailProvider for ResendProvider {
    async fn send(&self, email: &OutgoingEmail) -> Result<EmailId, ProviderError> {
        timeout(Duration::from_secs(self.timeout_secs), self.exchange(email))
            .await
            .map_err(|_| ProviderError::Timeout(self.timeout_secs))?
    }
}
