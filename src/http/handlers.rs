//! Route handlers.

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;

use crate::http::response::{HealthResponse, RelayError, SendEmailResponse};
use crate::http::server::AppState;
use crate::relay::ContactSubmission;

/// `POST /api/send-email`
///
/// Reads the raw body so that malformed JSON, oversized bodies and field
/// problems all come back in the same envelope.
pub async fn send_email(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<SendEmailResponse>, RelayError> {
    let body = body.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            RelayError::PayloadTooLarge
        } else {
            tracing::warn!(error = %rejection, "Failed to read request body");
            RelayError::MalformedJson
        }
    })?;

    let payload: Value = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Object(Default::default())
    } else {
        serde_json::from_slice(&body).map_err(|e| {
            tracing::debug!(error = %e, "Rejected malformed JSON");
            RelayError::MalformedJson
        })?
    };

    let submission = ContactSubmission::from_json(&payload).inspect_err(|e| {
        tracing::info!(reason = %e, "Rejected contact submission");
    })?;

    let id = state.relay.relay(submission).await?;
    Ok(Json(SendEmailResponse::sent(id)))
}

/// `GET /api/health`
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
