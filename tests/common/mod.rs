//! Shared utilities for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

use contact_relay::config::RelayConfig;
use contact_relay::relay::{EmailId, EmailProvider, OutgoingEmail, ProviderError};
use contact_relay::security::RateLimitStore;
use contact_relay::{HttpServer, Shutdown};

pub const ALLOWED_ORIGIN: &str = "http://localhost:5173";

/// How the fake provider answers.
#[derive(Clone, Copy)]
pub enum Outcome {
    Accept,
    Reject,
    Panic,
    /// Sleep this long, then accept.
    Stall(Duration),
}

/// In-memory stand-in for the email provider.
pub struct FakeProvider {
    pub sent: Mutex<Vec<OutgoingEmail>>,
    outcome: Outcome,
}

impl FakeProvider {
    pub fn new(outcome: Outcome) -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            outcome,
        })
    }

    pub fn calls(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn last(&self) -> OutgoingEmail {
        self.sent.lock().unwrap().last().cloned().expect("no email sent")
    }
}

#[async_trait]
impl EmailProvider for FakeProvider {
    async fn send(&self, email: &OutgoingEmail) -> Result<EmailId, ProviderError> {
        let n = {
            let mut sent = self.sent.lock().unwrap();
            sent.push(email.clone());
            sent.len()
        };
        match self.outcome {
            Outcome::Accept => Ok(EmailId(format!("email-{n}"))),
            Outcome::Reject => Err(ProviderError::Rejected {
                status: 403,
                name: Some("invalid_api_key".to_string()),
                message: "API key is invalid".to_string(),
            }),
            Outcome::Panic => panic!("provider exploded"),
            Outcome::Stall(delay) => {
                tokio::time::sleep(delay).await;
                Ok(EmailId(format!("email-{n}")))
            }
        }
    }
}

/// Config the tests start from: valid key, default quota and origins.
pub fn test_config() -> RelayConfig {
    let mut config = RelayConfig::default();
    config.listener.host = "127.0.0.1".to_string();
    config.email.api_key = "re_test".to_string();
    config
}

/// A running relay bound to an ephemeral port.
pub struct TestRelay {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
}

impl TestRelay {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestRelay {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

async fn spawn(server: HttpServer) -> TestRelay {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    TestRelay { addr, shutdown }
}

pub async fn start_relay(config: RelayConfig, provider: Arc<FakeProvider>) -> TestRelay {
    spawn(HttpServer::new(config, provider)).await
}

pub async fn start_relay_with_store(
    config: RelayConfig,
    provider: Arc<FakeProvider>,
    store: Arc<dyn RateLimitStore>,
) -> TestRelay {
    spawn(HttpServer::with_store(config, provider, store)).await
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

pub fn valid_payload() -> serde_json::Value {
    serde_json::json!({
        "name": "Ada Lovelace",
        "email": "ada@example.com",
        "message": "I'd like to talk about the analytical engine.",
    })
}
