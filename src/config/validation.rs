//! Configuration validation.
//!
//! Serde handles syntax; this module checks values that would otherwise only
//! fail once traffic arrives (origins, addresses, zero-length windows).
//! Validation is a pure function that reports every problem, not just the
//! first.

use std::net::{IpAddr, SocketAddr};
use thiserror::Error;
use url::Url;

use crate::config::schema::RelayConfig;
use crate::relay::submission::is_valid_email;

/// A single semantic problem with a loaded configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.host '{0}' is not an IP address")]
    InvalidHost(String),

    #[error("listener.max_body_bytes must be greater than zero")]
    ZeroBodyLimit,

    #[error("cors.allowed_origins entry '{0}' is not an http(s) origin")]
    InvalidOrigin(String),

    #[error("rate_limit.window_secs must be greater than zero")]
    ZeroWindow,

    #[error("rate_limit.max_requests must be greater than zero")]
    ZeroMaxRequests,

    #[error("email.api_key is empty (set RESEND_API_KEY)")]
    MissingApiKey,

    #[error("email.provider_url '{0}' is not a valid URL")]
    InvalidProviderUrl(String),

    #[error("email.from_address '{0}' is not a valid address")]
    InvalidFromAddress(String),

    #[error("email.to_address '{0}' is not a valid address")]
    InvalidToAddress(String),

    #[error("email.timeout_secs must be greater than zero")]
    ZeroProviderTimeout,

    #[error("timeouts.request_secs must be greater than zero")]
    ZeroRequestTimeout,

    #[error("observability.metrics_address '{0}' is not a socket address")]
    InvalidMetricsAddress(String),
}

/// Check a configuration, collecting every error found.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.host.parse::<IpAddr>().is_err() {
        errors.push(ValidationError::InvalidHost(config.listener.host.clone()));
    }
    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }

    for origin in &config.cors.allowed_origins {
        if !is_serialized_origin(origin) {
            errors.push(ValidationError::InvalidOrigin(origin.clone()));
        }
    }

    if config.rate_limit.window_secs == 0 {
        errors.push(ValidationError::ZeroWindow);
    }
    if config.rate_limit.max_requests == 0 {
        errors.push(ValidationError::ZeroMaxRequests);
    }

    let email = &config.email;
    if email.api_key.trim().is_empty() {
        errors.push(ValidationError::MissingApiKey);
    }
    if Url::parse(&email.provider_url).is_err() {
        errors.push(ValidationError::InvalidProviderUrl(email.provider_url.clone()));
    }
    if !is_valid_mailbox(&email.from_address) {
        errors.push(ValidationError::InvalidFromAddress(email.from_address.clone()));
    }
    if let Some(to) = &email.to_address {
        if !is_valid_mailbox(to) {
            errors.push(ValidationError::InvalidToAddress(to.clone()));
        }
    }
    if email.timeout_secs == 0 {
        errors.push(ValidationError::ZeroProviderTimeout);
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroRequestTimeout);
    }

    let observability = &config.observability;
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Browsers send `scheme://host[:port]` with no path, so the configured
/// entry must already be in that form to ever match.
fn is_serialized_origin(origin: &str) -> bool {
    match Url::parse(origin) {
        Ok(url) => {
            matches!(url.scheme(), "http" | "https")
                && url.origin().ascii_serialization() == origin
        }
        Err(_) => false,
    }
}

/// Accepts `addr@example.com` or `Display Name <addr@example.com>`.
fn is_valid_mailbox(value: &str) -> bool {
    let value = value.trim();
    let address = match (value.rfind('<'), value.ends_with('>')) {
        (Some(start), true) => &value[start + 1..value.len() - 1],
        (None, false) => value,
        _ => return false,
    };
    is_valid_email(address)
}
