//! Cross-origin access control.
//! Refuses browsers calling from origins outside the allow-list.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderName, Method, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::config::CorsConfig;
use crate::http::response::RelayError;
use crate::http::request::X_REQUEST_ID;
use crate::observability::metrics;
use crate::security::rate_limit::{
    RATELIMIT_LIMIT, RATELIMIT_POLICY, RATELIMIT_REMAINING, RATELIMIT_RESET,
};

/// Allow-list of browser origins.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    allowed: HashSet<String>,
}

impl CorsPolicy {
    pub fn new(config: &CorsConfig) -> Self {
        Self {
            allowed: config.allowed_origins.iter().cloned().collect(),
        }
    }

    /// Exact match against the configured origins.
    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        self.allowed.contains(origin)
    }

    /// CORS response headers for allowed origins.
    pub fn cors_layer(policy: Arc<Self>) -> CorsLayer {
        CorsLayer::new()
            .allow_origin(AllowOrigin::predicate(move |origin, _parts| {
                origin
                    .to_str()
                    .map(|origin| policy.is_origin_allowed(origin))
                    .unwrap_or(false)
            }))
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE])
            .allow_credentials(true)
            .expose_headers([
                RATELIMIT_POLICY,
                RATELIMIT_LIMIT,
                RATELIMIT_REMAINING,
                RATELIMIT_RESET,
                header::RETRY_AFTER,
                HeaderName::from_static(X_REQUEST_ID),
            ])
            .max_age(Duration::from_secs(60 * 60))
    }
}

/// Reject requests carrying a disallowed `Origin` before any handler runs.
/// Requests without an `Origin` header (curl, health probes) pass through.
pub async fn origin_guard_middleware(
    State(policy): State<Arc<CorsPolicy>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let allowed = match request.headers().get(header::ORIGIN) {
        None => true,
        Some(origin) => origin
            .to_str()
            .map(|origin| policy.is_origin_allowed(origin))
            .unwrap_or(false),
    };

    if allowed {
        return next.run(request).await;
    }

    tracing::warn!(
        origin = ?request.headers().get(header::ORIGIN),
        path = %request.uri().path(),
        "Origin not allowed"
    );
    metrics::record_origin_rejected();
    RelayError::OriginNotAllowed.into_response()
}
