use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ORIGIN};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The three form fields, as sent to the relay.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDraft {
    pub name: String,
    pub email: String,
    pub message: String,
}

/// Relay response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendEmailResponse {
    pub success: bool,
    #[serde(default)]
    pub email_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("relay returned status {status}: {}", .error.as_deref().unwrap_or("no details"))]
    Status { status: u16, error: Option<String> },

    #[error("relay reported failure: {0}")]
    Rejected(String),
}

/// Anything that can deliver a draft to the relay.
#[async_trait]
pub trait ContactTransport: Send + Sync {
    /// Returns the provider's email id on success.
    async fn send(&self, draft: &ContactDraft) -> Result<String, ClientError>;
}

#[async_trait]
impl<T: ContactTransport + ?Sized> ContactTransport for std::sync::Arc<T> {
    async fn send(&self, draft: &ContactDraft) -> Result<String, ClientError> {
        (**self).send(draft).await
    }
}

/// HTTP client for the contact relay.
#[derive(Clone)]
pub struct ContactClient {
    client: Client,
    base_url: String,
}

impl ContactClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Send an `Origin` header on every request, as a browser page would.
    pub fn with_origin(base_url: &str, origin: &str) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(origin) {
            headers.insert(ORIGIN, value);
        }
        let client = Client::builder().default_headers(headers).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Post a submission and return the decoded envelope with its status.
    pub async fn send_email(&self, draft: &ContactDraft) -> Result<(u16, SendEmailResponse), ClientError> {
        let resp = self
            .client
            .post(format!("{}/api/send-email", self.base_url))
            .json(draft)
            .send()
            .await?;

        let status = resp.status().as_u16();
        let text = resp.text().await?;
        let body = serde_json::from_str::<SendEmailResponse>(&text).unwrap_or(SendEmailResponse {
            success: false,
            email_id: None,
            error: Some(text),
        });
        Ok((status, body))
    }

    /// True when the relay answers its health check with `status: ok`.
    pub async fn health(&self) -> Result<bool, ClientError> {
        let resp = self
            .client
            .get(format!("{}/api/health", self.base_url))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Ok(false);
        }
        let body: serde_json::Value = resp.json().await?;
        Ok(body["status"] == "ok")
    }
}

#[async_trait]
impl ContactTransport for ContactClient {
    async fn send(&self, draft: &ContactDraft) -> Result<String, ClientError> {
        let (status, body) = self.send_email(draft).await?;
        if !(200..300).contains(&status) {
            return Err(ClientError::Status { status, error: body.error });
        }
        match (body.success, body.email_id) {
            (true, Some(id)) => Ok(id),
            (true, None) => Ok(String::new()),
            (false, _) => Err(ClientError::Rejected(
                body.error.unwrap_or_else(|| "unknown error".to_string()),
            )),
        }
    }
}
