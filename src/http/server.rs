//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the relay routes
//! - Wire up middleware (request ID, tracing, panics, origins, quota, limits)
//! - Bind the server to a listener and run until shutdown
//! - Run the rate limit sweeper alongside the server

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::RelayConfig;
use crate::http::handlers::{health, send_email};
use crate::http::request::{make_request_span, MakeRequestUuidV4};
use crate::http::response::{panic_response, timeout_envelope};
use crate::observability::metrics;
use crate::relay::{ContactRelay, EmailProvider};
use crate::security::rate_limit::spawn_sweeper;
use crate::security::{
    origin_guard_middleware, rate_limit_middleware, with_security_headers, CorsPolicy,
    MemoryStore, RateLimitStore, RateLimiter,
};

pub const SEND_EMAIL_PATH: &str = "/api/send-email";
pub const HEALTH_PATH: &str = "/api/health";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<ContactRelay>,
}

/// HTTP server for the contact relay.
pub struct HttpServer {
    router: Router,
    config: RelayConfig,
    store: Arc<dyn RateLimitStore>,
}

impl HttpServer {
    /// Create a server with an in-memory rate limit store.
    pub fn new(config: RelayConfig, provider: Arc<dyn EmailProvider>) -> Self {
        let store = Arc::new(MemoryStore::new(Duration::from_secs(
            config.rate_limit.window_secs,
        )));
        Self::with_store(config, provider, store)
    }

    /// Create a server over an externally owned rate limit store.
    pub fn with_store(
        config: RelayConfig,
        provider: Arc<dyn EmailProvider>,
        store: Arc<dyn RateLimitStore>,
    ) -> Self {
        let state = AppState {
            relay: Arc::new(ContactRelay::new(provider, config.email.clone())),
        };
        let router = Self::build_router(&config, state, Arc::clone(&store));
        Self {
            router,
            config,
            store,
        }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// Layers listed later wrap the ones before them, so a request passes
    /// request ID → trace → origin guard → CORS → security headers → panic
    /// guard → timeout → metrics → body limit → quota (send-email only) →
    /// handler. Panics and timeouts therefore still leave with hardening
    /// and CORS headers.
    #[allow(deprecated)]
    fn build_router(
        config: &RelayConfig,
        state: AppState,
        store: Arc<dyn RateLimitStore>,
    ) -> Router {
        let mut send_route = post(send_email);
        if config.rate_limit.enabled {
            let limiter = Arc::new(RateLimiter::new(&config.rate_limit, store));
            send_route =
                send_route.route_layer(middleware::from_fn_with_state(limiter, rate_limit_middleware));
        }

        let policy = Arc::new(CorsPolicy::new(&config.cors));

        let router = Router::new()
            .route(SEND_EMAIL_PATH, send_route)
            .route(HEALTH_PATH, get(health))
            .layer(DefaultBodyLimit::max(config.listener.max_body_bytes))
            .with_state(state)
            .layer(middleware::from_fn(metrics::track_requests))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(middleware::map_response(timeout_envelope))
            .layer(CatchPanicLayer::custom(panic_response));

        with_security_headers(router)
            .layer(CorsPolicy::cors_layer(Arc::clone(&policy)))
            .layer(middleware::from_fn_with_state(policy, origin_guard_middleware))
            .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV4))
    }

    /// The fully layered router, for driving the service without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server on `listener` until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            allowed_origins = ?self.config.cors.allowed_origins,
            "HTTP server starting"
        );

        let sweeper = self.config.rate_limit.enabled.then(|| {
            spawn_sweeper(
                Arc::clone(&self.store),
                Duration::from_secs(self.config.rate_limit.window_secs),
                shutdown.resubscribe(),
            )
        });

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        if let Some(sweeper) = sweeper {
            sweeper.abort();
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
