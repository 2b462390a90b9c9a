//! Contact relay subsystem.
//!
//! # Data Flow
//! ```text
//! JSON body
//!     → submission.rs (presence, type, length, shape checks)
//!     → email.rs (address + render the notification)
//!     → provider.rs (one call to the transactional email API)
//!     → EmailId | ProviderError
//! ```

pub mod email;
pub mod provider;
pub mod submission;

use std::sync::Arc;
use thiserror::Error;

use crate::config::EmailConfig;
use crate::observability::metrics;

pub use email::OutgoingEmail;
pub use provider::{EmailId, EmailProvider, ProviderError, ResendProvider};
pub use submission::{ContactSubmission, SubmissionError};

/// Why a validated submission was not delivered.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("failed to render notification: {0}")]
    Render(#[from] tera::Error),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Forwards validated submissions to the email provider.
#[derive(Clone)]
pub struct ContactRelay {
    provider: Arc<dyn EmailProvider>,
    config: EmailConfig,
}

impl ContactRelay {
    pub fn new(provider: Arc<dyn EmailProvider>, config: EmailConfig) -> Self {
        Self { provider, config }
    }

    /// Compose and send the notification for `submission`.
    ///
    /// The submission is consumed; exactly one provider call is made.
    pub async fn relay(&self, submission: ContactSubmission) -> Result<EmailId, DeliveryError> {
        let email = OutgoingEmail::compose(&submission, &self.config).inspect_err(|e| {
            tracing::error!(error = %e, "Failed to render contact email");
        })?;

        match self.provider.send(&email).await {
            Ok(id) => {
                tracing::info!(email_id = %id, "Contact email accepted by provider");
                metrics::record_email("sent");
                Ok(id)
            }
            Err(e) => {
                match &e {
                    ProviderError::Rejected { status, name, message } => tracing::error!(
                        status,
                        name = name.as_deref().unwrap_or("unknown"),
                        message = %message,
                        "Provider rejected contact email"
                    ),
                    other => tracing::error!(error = %other, "Provider call failed"),
                }
                metrics::record_email("failed");
                Err(e.into())
            }
        }
    }
}
