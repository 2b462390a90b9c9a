//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (request ID, trace span)
//!     → handlers.rs (send-email, health)
//!     → response.rs (JSON envelope, error mapping)
//!     → Send to client
//! ```

pub mod handlers;
pub mod request;
pub mod response;
pub mod server;

pub use request::{MakeRequestUuidV4, X_REQUEST_ID};
pub use response::{HealthResponse, RelayError, SendEmailResponse};
pub use server::{AppState, HttpServer, HEALTH_PATH, SEND_EMAIL_PATH};
