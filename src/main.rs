//! Contact Relay Service
//!
//! A small Axum service behind a portfolio site's contact form.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────────┐
//!                        │                  CONTACT RELAY                   │
//!                        │                                                  │
//!   POST /api/send-email │  ┌──────────┐   ┌──────────┐   ┌─────────────┐   │
//!   ─────────────────────┼─▶│  origin  │──▶│  quota   │──▶│ validation  │   │
//!                        │  │  guard   │   │ (per IP) │   │ (4 checks)  │   │
//!                        │  └──────────┘   └──────────┘   └──────┬──────┘   │
//!                        │                                       │          │
//!                        │                                       ▼          │
//!   {success, emailId}   │                               ┌─────────────┐    │   Email
//!   ◀────────────────────┼───────────────────────────────│    relay    │────┼──▶ provider
//!                        │                               └─────────────┘    │
//!                        │                                                  │
//!                        │  config · logging · metrics · request ids        │
//!                        └──────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

use contact_relay::config::load_config;
use contact_relay::lifecycle::{spawn_signal_listener, Shutdown};
use contact_relay::observability::{logging, metrics};
use contact_relay::{HttpServer, ResendProvider};

#[derive(Parser)]
#[command(name = "contact-relay")]
#[command(about = "Relays portfolio contact form submissions to an email provider", long_about = None)]
struct Args {
    /// Optional TOML config file; environment variables override it.
    #[arg(short, long, env = "CONTACT_RELAY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;

    logging::init_logging(&config.observability);

    tracing::info!("contact-relay v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address(),
        allowed_origins = ?config.cors.allowed_origins,
        rate_limit_enabled = config.rate_limit.enabled,
        rate_limit_max = config.rate_limit.max_requests,
        rate_limit_window_secs = config.rate_limit.window_secs,
        recipient_override = config.email.to_address.is_some(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let provider = Arc::new(ResendProvider::new(&config.email)?);

    let listener = TcpListener::bind(config.listener.bind_address()).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    spawn_signal_listener(shutdown.clone());

    let server = HttpServer::new(config, provider);
    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
