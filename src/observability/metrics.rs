//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_requests_total` (counter): requests by method, route, status
//! - `relay_request_duration_seconds` (histogram): latency distribution
//! - `relay_rate_limited_total` (counter): requests refused by the quota
//! - `relay_origin_rejected_total` (counter): requests from disallowed origins
//! - `relay_emails_total` (counter): provider calls by outcome
//!
//! Recording is a no-op until `init_metrics` installs the exporter.

use axum::{
    body::Body,
    extract::MatchedPath,
    http::Request,
    middleware::Next,
    response::Response,
};
use metrics::{counter, histogram, Label};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, route: &str, status: u16, start: Instant) {
    let labels = vec![
        Label::new("method", method.to_string()),
        Label::new("route", route.to_string()),
        Label::new("status", status.to_string()),
    ];
    counter!("relay_requests_total", labels.clone()).increment(1);
    histogram!("relay_request_duration_seconds", labels).record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited() {
    counter!("relay_rate_limited_total").increment(1);
}

pub fn record_origin_rejected() {
    counter!("relay_origin_rejected_total").increment(1);
}

/// `outcome` is `"sent"` or `"failed"`.
pub fn record_email(outcome: &'static str) {
    counter!("relay_emails_total", "outcome" => outcome).increment(1);
}

/// Middleware recording count and latency for every routed request.
pub async fn track_requests(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(request).await;
    record_request(&method, &route, response.status().as_u16(), start);
    response
}
