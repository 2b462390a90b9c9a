//! End-to-end tests for the send-email and health routes.

mod common;

use common::{client, start_relay, test_config, valid_payload, FakeProvider, Outcome, ALLOWED_ORIGIN};
use serde_json::{json, Value};
use std::time::Duration;

fn roomy_config() -> contact_relay::RelayConfig {
    let mut config = test_config();
    config.rate_limit.max_requests = 100;
    config
}

#[tokio::test]
async fn test_valid_submission_is_relayed() {
    let provider = FakeProvider::new(Outcome::Accept);
    let relay = start_relay(test_config(), provider.clone()).await;

    let resp = client()
        .post(relay.url("/api/send-email"))
        .json(&valid_payload())
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "success": true, "emailId": "email-1" }));

    assert_eq!(provider.calls(), 1);
    let email = provider.last();
    assert_eq!(email.from, "onboarding@resend.dev");
    assert_eq!(email.to, "ada@example.com");
    assert_eq!(email.reply_to, "ada@example.com");
    assert_eq!(email.subject, "New Contact Form Message from Ada Lovelace");
    assert!(email.html.contains("I&#x27;d like to talk about the analytical engine."));
}

#[tokio::test]
async fn test_configured_recipient_overrides_submitter() {
    let provider = FakeProvider::new(Outcome::Accept);
    let mut config = test_config();
    config.email.to_address = Some("owner@portfolio.dev".to_string());
    let relay = start_relay(config, provider.clone()).await;

    let resp = client()
        .post(relay.url("/api/send-email"))
        .json(&valid_payload())
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let email = provider.last();
    assert_eq!(email.to, "owner@portfolio.dev");
    assert_eq!(email.reply_to, "ada@example.com");
}

#[tokio::test]
async fn test_invalid_submissions_never_reach_provider() {
    let provider = FakeProvider::new(Outcome::Accept);
    let relay = start_relay(roomy_config(), provider.clone()).await;
    let http = client();

    let cases = [
        (
            json!({ "name": "Ada", "email": "ada@example.com" }),
            "Missing required fields: name, email, or message",
        ),
        (
            json!({ "name": "", "email": "ada@example.com", "message": "hi" }),
            "Missing required fields: name, email, or message",
        ),
        (
            json!({ "name": 42, "email": "ada@example.com", "message": "hi" }),
            "Invalid data types",
        ),
        (
            json!({ "name": "a".repeat(101), "email": "ada@example.com", "message": "hi" }),
            "Input exceeds maximum allowed length",
        ),
        (
            json!({ "name": "Ada", "email": "ada@example.com", "message": "m".repeat(1001) }),
            "Input exceeds maximum allowed length",
        ),
        (
            json!({ "name": "Ada", "email": "not-an-email", "message": "hi" }),
            "Invalid email address",
        ),
    ];

    for (payload, expected) in cases {
        let resp = http
            .post(relay.url("/api/send-email"))
            .json(&payload)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400, "payload: {payload}");
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body, json!({ "success": false, "error": expected }));
    }

    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn test_limits_are_counted_in_utf16_units() {
    let provider = FakeProvider::new(Outcome::Accept);
    let relay = start_relay(test_config(), provider.clone()).await;
    let http = client();

    let fits = json!({
        "name": "é".repeat(100),
        "email": "ada@example.com",
        "message": "hi",
    });
    let resp = http
        .post(relay.url("/api/send-email"))
        .json(&fits)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // 60 emoji are 60 chars but 120 UTF-16 units.
    let too_long = json!({
        "name": "😀".repeat(60),
        "email": "ada@example.com",
        "message": "hi",
    });
    let resp = http
        .post(relay.url("/api/send-email"))
        .json(&too_long)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Input exceeds maximum allowed length");

    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn test_provider_rejection_is_generic_500() {
    let provider = FakeProvider::new(Outcome::Reject);
    let relay = start_relay(test_config(), provider.clone()).await;

    let resp = client()
        .post(relay.url("/api/send-email"))
        .json(&valid_payload())
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 500);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "success": false, "error": "Failed to send email" }));
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn test_panic_becomes_internal_error_and_server_survives() {
    let provider = FakeProvider::new(Outcome::Panic);
    let relay = start_relay(test_config(), provider.clone()).await;
    let http = client();

    let resp = http
        .post(relay.url("/api/send-email"))
        .json(&valid_payload())
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 500);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "success": false, "error": "Internal server error" }));

    let health = http.get(relay.url("/api/health")).send().await.unwrap();
    assert_eq!(health.status(), 200);
}

#[tokio::test]
async fn test_panic_response_keeps_security_and_cors_headers() {
    let relay = start_relay(test_config(), FakeProvider::new(Outcome::Panic)).await;

    let resp = client()
        .post(relay.url("/api/send-email"))
        .header("origin", ALLOWED_ORIGIN)
        .json(&valid_payload())
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 500);
    assert_eq!(resp.headers()["x-content-type-options"], "nosniff");
    assert_eq!(resp.headers()["access-control-allow-origin"], ALLOWED_ORIGIN);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Internal server error");
}

#[tokio::test]
async fn test_request_timeout_uses_envelope() {
    let provider = FakeProvider::new(Outcome::Stall(Duration::from_secs(3)));
    let mut config = test_config();
    config.timeouts.request_secs = 1;
    let relay = start_relay(config, provider.clone()).await;

    let resp = client()
        .post(relay.url("/api/send-email"))
        .header("origin", ALLOWED_ORIGIN)
        .json(&valid_payload())
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 500);
    assert_eq!(resp.headers()["x-content-type-options"], "nosniff");
    assert_eq!(resp.headers()["access-control-allow-origin"], ALLOWED_ORIGIN);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "success": false, "error": "Internal server error" }));
}

#[tokio::test]
async fn test_malformed_and_oversized_bodies() {
    let provider = FakeProvider::new(Outcome::Accept);
    let relay = start_relay(roomy_config(), provider.clone()).await;
    let http = client();

    let resp = http
        .post(relay.url("/api/send-email"))
        .header("content-type", "application/json")
        .body("{\"name\": ")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "success": false, "error": "Invalid JSON payload" }));

    let resp = http
        .post(relay.url("/api/send-email"))
        .header("content-type", "application/json")
        .body("")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(
        body["error"],
        "Missing required fields: name, email, or message"
    );

    let big = json!({
        "name": "Ada",
        "email": "ada@example.com",
        "message": "x".repeat(11 * 1024),
    });
    let resp = http
        .post(relay.url("/api/send-email"))
        .json(&big)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 413);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "success": false, "error": "Payload too large" }));

    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn test_health() {
    let relay = start_relay(test_config(), FakeProvider::new(Outcome::Accept)).await;

    let resp = client().get(relay.url("/api/health")).send().await.unwrap();

    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "status": "ok" }));
}

#[tokio::test]
async fn test_disallowed_origin_is_refused() {
    let provider = FakeProvider::new(Outcome::Accept);
    let relay = start_relay(test_config(), provider.clone()).await;

    let resp = client()
        .post(relay.url("/api/send-email"))
        .header("origin", "https://evil.example")
        .json(&valid_payload())
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 403);
    assert!(resp.headers().get("access-control-allow-origin").is_none());
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "success": false, "error": "Not allowed by CORS" }));
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn test_allowed_origin_gets_cors_headers() {
    let provider = FakeProvider::new(Outcome::Accept);
    let relay = start_relay(test_config(), provider.clone()).await;
    let http = client();

    let preflight = http
        .request(reqwest::Method::OPTIONS, relay.url("/api/send-email"))
        .header("origin", ALLOWED_ORIGIN)
        .header("access-control-request-method", "POST")
        .header("access-control-request-headers", "content-type")
        .send()
        .await
        .unwrap();
    assert!(preflight.status().is_success());
    assert_eq!(
        preflight.headers()["access-control-allow-origin"],
        ALLOWED_ORIGIN
    );
    assert_eq!(
        preflight.headers()["access-control-allow-credentials"],
        "true"
    );

    let resp = http
        .post(relay.url("/api/send-email"))
        .header("origin", ALLOWED_ORIGIN)
        .json(&valid_payload())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["access-control-allow-origin"], ALLOWED_ORIGIN);
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn test_security_headers_and_request_id() {
    let relay = start_relay(test_config(), FakeProvider::new(Outcome::Accept)).await;
    let http = client();

    let resp = http.get(relay.url("/api/health")).send().await.unwrap();
    let headers = resp.headers();
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "DENY");
    assert!(headers.contains_key("content-security-policy"));
    let generated = headers["x-request-id"].to_str().unwrap();
    assert_eq!(generated.len(), 36);

    let resp = http
        .get(relay.url("/api/health"))
        .header("x-request-id", "trace-me")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.headers()["x-request-id"], "trace-me");
}
