//! pubsub-listener entry point.
//!
//! Starts the broker node, its HTTP server and the listening clients, then
//! waits for SIGINT or SIGTERM.

use tracing::Instrument;
use tracing_subscriber::EnvFilter;

use pubsub_listener::app;
use pubsub_listener::config::{DemoConfig, LogFormat};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = DemoConfig::from_env()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }

    tracing::info!(addr = %config.listen_addr, clients = config.client_count, "starting pubsub-listener");
    app::run(config).instrument(tracing::info_span!("main")).await
}
