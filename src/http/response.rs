//! Response envelopes and error mapping.
//!
//! # Responsibilities
//! - Define the `{success, emailId | error}` JSON envelope
//! - Map every failure to its status code and client-facing message
//!
//! # Design Decisions
//! - Provider and internal failures surface generic messages only;
//!   details stay in the server log

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::any::Any;
use thiserror::Error;

use crate::relay::{DeliveryError, EmailId, ProviderError, SubmissionError};

/// Body of every send-email response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendEmailResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SendEmailResponse {
    pub fn sent(id: EmailId) -> Self {
        Self {
            success: true,
            email_id: Some(id.0),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            email_id: None,
            error: Some(error.into()),
        }
    }
}

/// Liveness body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}

/// Every way a request can fail. The display text is what the client sees.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    Invalid(#[from] SubmissionError),

    #[error("Invalid JSON payload")]
    MalformedJson,

    #[error("Payload too large")]
    PayloadTooLarge,

    #[error("Not allowed by CORS")]
    OriginNotAllowed,

    #[error("Too many requests from this IP, please try again later.")]
    RateLimited,

    #[error("Failed to send email")]
    Provider(#[from] ProviderError),

    #[error("Internal server error")]
    Internal,
}

impl From<DeliveryError> for RelayError {
    fn from(err: DeliveryError) -> Self {
        match err {
            DeliveryError::Render(_) => RelayError::Internal,
            DeliveryError::Provider(e) => RelayError::Provider(e),
        }
    }
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::Invalid(_) | RelayError::MalformedJson => StatusCode::BAD_REQUEST,
            RelayError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            RelayError::OriginNotAllowed => StatusCode::FORBIDDEN,
            RelayError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            RelayError::Provider(_) | RelayError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        (self.status(), Json(SendEmailResponse::failure(self.to_string()))).into_response()
    }
}

/// Rewrites the bare 408 from `TimeoutLayer` into the envelope.
pub async fn timeout_envelope(response: Response) -> Response {
    if response.status() == StatusCode::REQUEST_TIMEOUT {
        tracing::error!("Request exceeded the configured timeout");
        return RelayError::Internal.into_response();
    }
    response
}

/// `CatchPanicLayer` hook: a panicking handler becomes a generic 500.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("non-string panic payload");
    tracing::error!(panic = %detail, "Handler panicked");
    RelayError::Internal.into_response()
}
