//! Client configuration loaded from the process environment.
//!
//! Follows 12-factor style: the endpoint and credential come from
//! environment variables (or a `.env` file via `dotenvy`), with
//! documented defaults for local development.

use std::time::Duration;

use gatelink_protocol::ClientInfo;
use gatelink_retry::RetryConfig;
use url::Url;

use crate::GatewayError;

/// Environment variable naming the Gateway endpoint.
pub const ENV_GATEWAY_URL: &str = "GATEWAY_URL";

/// Environment variable carrying the access token.
pub const ENV_GATEWAY_TOKEN: &str = "GATEWAY_TOKEN";

/// Default endpoint: the local gateway on its fixed port.
pub const DEFAULT_ENDPOINT: &str = "ws://127.0.0.1:18789";

/// Top-level client configuration.
///
/// Built once and handed to [`GatewayClient::new`](crate::GatewayClient::new).
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Gateway endpoint (`ws://` or `wss://`).
    pub endpoint: Url,

    /// Access token. Attached to the socket upgrade as a query
    /// parameter and repeated inside the handshake's auth payload.
    pub token: String,

    /// Client identity metadata sent in the handshake.
    pub client: ClientInfo,

    /// Deadline for one whole connection attempt (dial, challenge, and
    /// handshake combined).
    pub connect_timeout: Duration,

    /// Per-request deadline for `call()`.
    pub request_timeout: Duration,

    /// Reconnect policy applied after an authenticated session drops.
    pub retry: RetryConfig,
}

impl GatewayConfig {
    /// Creates a config for the given endpoint and token, with default
    /// identity, timeouts, and reconnect policy.
    ///
    /// # Errors
    /// Returns [`GatewayError::InvalidEndpoint`] if `endpoint` is not a
    /// valid URL.
    pub fn new(endpoint: &str, token: &str) -> Result<Self, GatewayError> {
        Ok(Self {
            endpoint: Url::parse(endpoint)?,
            token: token.to_string(),
            client: default_client_info(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
        })
    }

    /// Loads configuration from the process environment.
    ///
    /// Falls back to documented defaults when a variable is unset:
    /// [`ENV_GATEWAY_URL`] defaults to [`DEFAULT_ENDPOINT`],
    /// [`ENV_GATEWAY_TOKEN`] to the empty string. A `.env` file is
    /// honored when present.
    ///
    /// # Errors
    /// Returns [`GatewayError::InvalidEndpoint`] if the configured URL
    /// cannot be parsed.
    pub fn from_env() -> Result<Self, GatewayError> {
        dotenvy::dotenv().ok();

        let endpoint = std::env::var(ENV_GATEWAY_URL)
            .unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string());
        let token = std::env::var(ENV_GATEWAY_TOKEN).unwrap_or_default();

        Self::new(&endpoint, &token)
    }
}

fn default_client_info() -> ClientInfo {
    ClientInfo {
        id: "gatelink".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        platform: std::env::consts::OS.into(),
        mode: "client".into(),
    }
}
