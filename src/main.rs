//! zone-relay server entry point.
//!
//! Loads configuration, binds the TCP listener, and serves until Ctrl-C.

use anyhow::Context;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use zone_relay::app_state::AppState;
use zone_relay::config::{LogFormat, RelayConfig};
use zone_relay::tcp::serve;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = RelayConfig::from_env().context("loading configuration")?;

    // Initialize tracing
    init_tracing(config.log_format);

    // Start listener
    let listener = TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    let addr = listener.local_addr().context("reading bound address")?;
    tracing::info!(%addr, "zone-relay listening");

    // Stop on Ctrl-C
    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            return;
        }
        tracing::info!("shutdown requested");
        signal.cancel();
    });

    serve(listener, AppState::new(config), shutdown).await;

    tracing::info!("zone-relay stopped");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}
