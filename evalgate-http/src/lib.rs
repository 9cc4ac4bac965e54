//! evalgate HTTP transport
//!
//! Serves the execution gateway over HTTP: `POST /` and `POST /api/evaluate`
//! evaluate a snippet, `GET` on the same paths describes the endpoint.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod server;

use server::{ServerConfig, start_server};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `default_level` when set.
pub fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();
}

/// Start the evalgate HTTP server with the default configuration
pub async fn start() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing("info");
    start_server(ServerConfig::default()).await
}

/// Start the evalgate HTTP server with a custom configuration
///
/// Tracing must already be initialized.
pub async fn start_with_config(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    start_server(config).await
}
