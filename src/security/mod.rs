//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → access_control.rs (refuse disallowed origins, CORS headers)
//!     → rate_limit.rs (per-IP quota, send-email route only)
//!     → handler
//! Outgoing response:
//!     → headers.rs (hardening headers)
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any security check failure
//! - Quota and origin checks run before the body is validated

pub mod access_control;
pub mod headers;
pub mod rate_limit;

pub use access_control::{origin_guard_middleware, CorsPolicy};
pub use headers::with_security_headers;
pub use rate_limit::{rate_limit_middleware, MemoryStore, RateLimitStore, RateLimiter};
