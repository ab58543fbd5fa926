//! Minimal Gateway probe: connect, list sessions, stream notifications.
//!
//! Configuration comes from the environment (or a `.env` file):
//!
//! - `GATEWAY_URL`   — endpoint, default `ws://127.0.0.1:18789`
//! - `GATEWAY_TOKEN` — access token, default empty
//! - `RUST_LOG`      — standard tracing filter, e.g. `gatelink=debug`

use gatelink::{GatewayClient, GatewayConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = GatewayConfig::from_env()?;
    tracing::info!(host = config.endpoint.host_str().unwrap_or("-"), "connecting");

    let client = GatewayClient::new(config);
    client.connect().await?;

    let sessions = client.list_sessions().await?;
    println!("{} session(s) known to the gateway", sessions.len());

    // Stream notifications until the process is interrupted. The client
    // reconnects by itself if the gateway restarts.
    let mut notifications = client.notifications().await?;
    while let Some(note) = notifications.recv().await {
        println!("{}: {}", note.name, note.params);
    }

    Ok(())
}
