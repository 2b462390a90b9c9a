//! Contact form submissions and their validation.
//!
//! A submission is either fully valid or rejected before the provider is
//! ever called. Checks run in a fixed order and stop at the first failure:
//! presence, type, length, then email shape.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use thiserror::Error;

/// Field limits, in UTF-16 code units (what a browser reports as length).
pub const MAX_NAME_LEN: usize = 100;
pub const MAX_EMAIL_LEN: usize = 100;
pub const MAX_MESSAGE_LEN: usize = 1000;

/// Permissive `local@domain.tld` shape, not RFC 5322.
static EMAIL_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email shape pattern is valid")
});

/// Why a payload was refused. The display text is the client-facing reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubmissionError {
    #[error("Missing required fields: name, email, or message")]
    MissingFields,

    #[error("Invalid data types")]
    InvalidTypes,

    #[error("Input exceeds maximum allowed length")]
    TooLong,

    #[error("Invalid email address")]
    InvalidEmail,
}

/// A validated contact form submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactSubmission {
    pub name: String,
    pub email: String,
    pub message: String,
}

impl ContactSubmission {
    /// Validate a decoded JSON body.
    pub fn from_json(body: &Value) -> Result<Self, SubmissionError> {
        let fields = ["name", "email", "message"].map(|key| body.get(key));

        if !fields.iter().all(|field| is_present(*field)) {
            return Err(SubmissionError::MissingFields);
        }

        let [Some(name), Some(email), Some(message)] = fields.map(|f| f.and_then(Value::as_str))
        else {
            return Err(SubmissionError::InvalidTypes);
        };

        if utf16_len(name) > MAX_NAME_LEN
            || utf16_len(email) > MAX_EMAIL_LEN
            || utf16_len(message) > MAX_MESSAGE_LEN
        {
            return Err(SubmissionError::TooLong);
        }

        if !is_valid_email(email) {
            return Err(SubmissionError::InvalidEmail);
        }

        Ok(Self {
            name: name.to_string(),
            email: email.to_string(),
            message: message.to_string(),
        })
    }
}

fn utf16_len(value: &str) -> usize {
    value.encode_utf16().count()
}

/// Whether `email` has the `local@domain.tld` shape the relay accepts.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_SHAPE.is_match(email)
}

/// Empty strings, zero, `false` and `null` count as absent, the same as a
/// missing key. Arrays and objects are present (and fail the type check).
fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64() != Some(0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}
