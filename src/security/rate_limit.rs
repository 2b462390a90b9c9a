//! Per-IP fixed-window quota for the send-email route.
//!
//! A window opens on a client's first request and lasts `window_secs`.
//! Every request inside it counts, accepted or not; once the count exceeds
//! `max_requests` the client gets 429 until the window elapses.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

use crate::config::RateLimitConfig;
use crate::http::response::RelayError;
use crate::observability::metrics;

pub const RATELIMIT_POLICY: HeaderName = HeaderName::from_static("ratelimit-policy");
pub const RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("ratelimit-limit");
pub const RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("ratelimit-remaining");
pub const RATELIMIT_RESET: HeaderName = HeaderName::from_static("ratelimit-reset");

/// Counter state for one client after recording a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowHit {
    /// Requests seen in the current window, including this one.
    pub count: u32,
    /// When the current window closes.
    pub reset_at: Instant,
}

/// Storage for per-client request windows.
///
/// Injected into the limiter so a shared or fake store can replace the
/// in-process default.
pub trait RateLimitStore: Send + Sync {
    /// Record one request from `client` at `now` and return its window.
    fn hit(&self, client: IpAddr, now: Instant) -> WindowHit;

    /// Drop windows that have closed by `now`. Returns how many were removed.
    fn prune(&self, now: Instant) -> usize;
}

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    reset_at: Instant,
}

/// In-process store backed by a `DashMap`.
pub struct MemoryStore {
    windows: DashMap<IpAddr, Window>,
    window: Duration,
}

impl MemoryStore {
    pub fn new(window: Duration) -> Self {
        Self {
            windows: DashMap::new(),
            window,
        }
    }

    /// Number of clients currently tracked.
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

impl RateLimitStore for MemoryStore {
    fn hit(&self, client: IpAddr, now: Instant) -> WindowHit {
        let mut entry = self.windows.entry(client).or_insert(Window {
            count: 0,
            reset_at: now + self.window,
        });

        if now >= entry.reset_at {
            entry.count = 0;
            entry.reset_at = now + self.window;
        }
        entry.count = entry.count.saturating_add(1);

        WindowHit {
            count: entry.count,
            reset_at: entry.reset_at,
        }
    }

    fn prune(&self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, window| window.reset_at > now);
        before.saturating_sub(self.windows.len())
    }
}

/// Outcome of a quota check, carried into the response headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_after: Duration,
    pub window: Duration,
}

impl RateLimitDecision {
    /// Seconds until the window closes, rounded up.
    pub fn reset_secs(&self) -> u64 {
        let secs = self.reset_after.as_secs();
        if self.reset_after.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs
        }
    }

    /// Write the `RateLimit-*` headers (and `Retry-After` when refused).
    pub fn apply_headers(&self, headers: &mut HeaderMap) {
        let policy = format!("{};w={}", self.limit, self.window.as_secs());
        if let Ok(value) = HeaderValue::from_str(&policy) {
            headers.insert(RATELIMIT_POLICY, value);
        }
        headers.insert(RATELIMIT_LIMIT, HeaderValue::from(self.limit));
        headers.insert(RATELIMIT_REMAINING, HeaderValue::from(self.remaining));
        headers.insert(RATELIMIT_RESET, HeaderValue::from(self.reset_secs()));
        if !self.allowed {
            headers.insert(header::RETRY_AFTER, HeaderValue::from(self.reset_secs()));
        }
    }
}

/// Quota policy over an injected store.
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    max_requests: u32,
    window: Duration,
    trust_forwarded_for: bool,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig, store: Arc<dyn RateLimitStore>) -> Self {
        Self {
            store,
            max_requests: config.max_requests,
            window: Duration::from_secs(config.window_secs),
            trust_forwarded_for: config.trust_forwarded_for,
        }
    }

    /// Record a request from `client` and decide whether it may proceed.
    pub fn check(&self, client: IpAddr) -> RateLimitDecision {
        self.check_at(client, Instant::now())
    }

    pub fn check_at(&self, client: IpAddr, now: Instant) -> RateLimitDecision {
        let hit = self.store.hit(client, now);
        RateLimitDecision {
            allowed: hit.count <= self.max_requests,
            limit: self.max_requests,
            remaining: self.max_requests.saturating_sub(hit.count),
            reset_after: hit.reset_at.saturating_duration_since(now),
            window: self.window,
        }
    }

    /// Client key for a request: the peer address, or the first
    /// `X-Forwarded-For` hop when configured to trust it.
    pub fn client_ip(&self, headers: &HeaderMap, peer: IpAddr) -> IpAddr {
        if self.trust_forwarded_for {
            let forwarded = headers
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .and_then(|v| v.trim().parse().ok());
            if let Some(ip) = forwarded {
                return ip;
            }
        }
        peer
    }
}

/// Middleware enforcing the quota. Layered only on the send-email route.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    let client = limiter.client_ip(request.headers(), peer);
    let decision = limiter.check(client);

    let mut response = if decision.allowed {
        next.run(request).await
    } else {
        tracing::warn!(client = %client, limit = decision.limit, "Rate limit exceeded");
        metrics::record_rate_limited();
        RelayError::RateLimited.into_response()
    };

    decision.apply_headers(response.headers_mut());
    response
}

/// Periodically drop closed windows so idle clients do not accumulate.
pub fn spawn_sweeper(
    store: Arc<dyn RateLimitStore>,
    every: Duration,
    mut shutdown: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.tick().await;
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let removed = store.prune(Instant::now());
                    if removed > 0 {
                        tracing::debug!(removed, "Pruned expired rate limit windows");
                    }
                }
                _ = shutdown.recv() => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(900);

    fn limiter(store: Arc<MemoryStore>) -> RateLimiter {
        RateLimiter::new(&RateLimitConfig::default(), store)
    }

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    #[test]
    fn test_fourth_request_in_window_is_refused() {
        let limiter = limiter(Arc::new(MemoryStore::new(WINDOW)));
        let now = Instant::now();

        let remaining: Vec<_> = (0..3)
            .map(|_| {
                let d = limiter.check_at(ip(1), now);
                assert!(d.allowed);
                d.remaining
            })
            .collect();
        assert_eq!(remaining, vec![2, 1, 0]);

        let fourth = limiter.check_at(ip(1), now + Duration::from_secs(60));
        assert!(!fourth.allowed);
        assert_eq!(fourth.remaining, 0);
        assert_eq!(fourth.reset_secs(), 840);
    }

    #[test]
    fn test_clients_are_independent() {
        let limiter = limiter(Arc::new(MemoryStore::new(WINDOW)));
        let now = Instant::now();
        for _ in 0..4 {
            limiter.check_at(ip(1), now);
        }
        assert!(limiter.check_at(ip(2), now).allowed);
    }

    #[test]
    fn test_window_resets_after_elapsing() {
        let limiter = limiter(Arc::new(MemoryStore::new(WINDOW)));
        let start = Instant::now();
        for _ in 0..4 {
            limiter.check_at(ip(1), start);
        }
        assert!(!limiter.check_at(ip(1), start + WINDOW - Duration::from_secs(1)).allowed);

        let later = limiter.check_at(ip(1), start + WINDOW);
        assert!(later.allowed);
        assert_eq!(later.remaining, 2);
    }

    #[test]
    fn test_prune_drops_closed_windows() {
        let store = MemoryStore::new(WINDOW);
        let now = Instant::now();
        store.hit(ip(1), now);
        store.hit(ip(2), now + Duration::from_secs(600));

        assert_eq!(store.prune(now + WINDOW), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.prune(now + WINDOW * 2), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_headers() {
        let limiter = limiter(Arc::new(MemoryStore::new(WINDOW)));
        let now = Instant::now();
        for _ in 0..3 {
            limiter.check_at(ip(1), now);
        }
        let refused = limiter.check_at(ip(1), now);

        let mut headers = HeaderMap::new();
        refused.apply_headers(&mut headers);
        assert_eq!(headers[&RATELIMIT_POLICY], "3;w=900");
        assert_eq!(headers[&RATELIMIT_LIMIT], "3");
        assert_eq!(headers[&RATELIMIT_REMAINING], "0");
        assert_eq!(headers[&RATELIMIT_RESET], "900");
        assert_eq!(headers[header::RETRY_AFTER], "900");
    }

    #[test]
    fn test_forwarded_for_only_when_trusted() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9, 10.0.0.1"));
        let peer = ip(1);

        let untrusted = limiter(Arc::new(MemoryStore::new(WINDOW)));
        assert_eq!(untrusted.client_ip(&headers, peer), peer);

        let config = RateLimitConfig {
            trust_forwarded_for: true,
            ..RateLimitConfig::default()
        };
        let trusted = RateLimiter::new(&config, Arc::new(MemoryStore::new(WINDOW)));
        assert_eq!(
            trusted.client_ip(&headers, peer),
            "203.0.113.9".parse::<IpAddr>().unwrap()
        );
    }

    // The store keys windows on std `Instant`, which a paused tokio clock
    // does not move, so this runs on short real durations.
    #[tokio::test]
    async fn test_sweeper_prunes_and_stops_on_shutdown() {
        let store = Arc::new(MemoryStore::new(Duration::from_millis(20)));
        store.hit(ip(1), Instant::now());
        assert_eq!(store.len(), 1);

        let (tx, rx) = broadcast::channel(1);
        let sweeper = spawn_sweeper(store.clone(), Duration::from_millis(25), rx);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(store.is_empty());

        tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), sweeper)
            .await
            .expect("sweeper stops on shutdown")
            .unwrap();
    }
}
