//! # gatelink
//!
//! Async Rust client for the Gateway RPC/event protocol.
//!
//! The Gateway is reached over a single persistent WebSocket. The
//! protocol is server-initiated: after the socket opens, the Gateway
//! sends a challenge event, the client answers with a credentialed
//! `connect` request, and only then are RPC calls usable. Unsolicited
//! events arrive at any time and are routed to subscribers.
//!
//! This crate ties the layers together:
//!
//! ```text
//! GatewayClient (handle) ──commands──→ connection task (owns the socket)
//!                                          │
//!              gatelink-session  ← correlation map, state machine, handshake
//!              gatelink-protocol ← wire frames, codec
//!              gatelink-transport← WebSocket dialer
//!              gatelink-retry    ← reconnect timer
//! ```
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use gatelink::{GatewayClient, GatewayConfig};
//!
//! # async fn run() -> Result<(), gatelink::GatewayError> {
//! let config = GatewayConfig::from_env()?;
//! let client = GatewayClient::new(config);
//!
//! client.connect().await?;
//! let sessions = client.list_sessions().await?;
//! println!("{} session(s)", sessions.len());
//! # Ok(())
//! # }
//! ```

mod api;
mod client;
mod config;
mod conn;
mod error;
mod events;

pub use client::GatewayClient;
pub use config::{GatewayConfig, DEFAULT_ENDPOINT, ENV_GATEWAY_TOKEN, ENV_GATEWAY_URL};
pub use error::{ConnectFailure, GatewayError};
pub use events::Notification;

// Re-exported so callers can build configs and match errors without
// depending on the layer crates directly.
pub use gatelink_protocol::ClientInfo;
pub use gatelink_retry::RetryConfig;
pub use gatelink_session::SessionError;
