//! Contact form relay library.
//!
//! Validates portfolio contact-form submissions, enforces a per-IP quota and
//! forwards each accepted message to a transactional email provider.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod relay;
pub mod security;

pub use config::RelayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use relay::{EmailProvider, ResendProvider};
