//! The public client handle.
//!
//! [`GatewayClient`] is a cheap-to-clone handle over the connection
//! task's command channel. Construct one explicitly and pass clones to
//! whoever needs the gateway — there is no process-wide singleton.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::config::GatewayConfig;
use crate::conn::{Command, ConnTask};
use crate::error::GatewayError;
use crate::events::Notification;

/// Async client for the Gateway RPC/event protocol.
///
/// All methods are safe to call concurrently from any number of tasks;
/// the underlying connection task serializes them. The client owns one
/// logical socket: concurrent [`connect`](Self::connect) calls share a
/// single attempt, and all RPC calls multiplex over the same connection.
///
/// Dropping the last clone of the handle shuts the connection task down.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    cmd_tx: mpsc::Sender<Command>,
    connected: Arc<AtomicBool>,
}

impl GatewayClient {
    /// Creates a client and spawns its connection task.
    ///
    /// No socket is opened until [`connect`](Self::connect) is called.
    /// Must be called from within a Tokio runtime.
    pub fn new(config: GatewayConfig) -> Self {
        let (cmd_tx, connected) = ConnTask::spawn(config);
        Self { cmd_tx, connected }
    }

    /// Establishes an authenticated session with the gateway.
    ///
    /// Idempotent while connecting: concurrent callers share the single
    /// in-flight attempt and observe the same outcome. A no-op success
    /// when already authenticated.
    ///
    /// # Errors
    /// [`ConnectFailure`](crate::ConnectFailure) describes why the
    /// attempt failed: connect timeout, socket-level failure, or a
    /// rejected credential (wrapping the server's message).
    pub async fn connect(&self) -> Result<(), GatewayError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Connect { reply: tx })
            .await
            .map_err(|_| GatewayError::ClientClosed)?;
        rx.await
            .map_err(|_| GatewayError::ClientClosed)?
            .map_err(GatewayError::from)
    }

    /// Tears down the socket and disables auto-reconnect.
    ///
    /// Always safe to call, in any state. No reconnect attempt follows
    /// an explicit disconnect; a later [`connect`](Self::connect) starts
    /// fresh.
    pub async fn disconnect(&self) {
        let (tx, rx) = oneshot::channel();
        if self
            .cmd_tx
            .send(Command::Disconnect { reply: tx })
            .await
            .is_ok()
        {
            let _ = rx.await;
        }
    }

    /// Whether the session is authenticated over a live socket.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Performs one RPC call and waits for its response.
    ///
    /// Any number of calls may be in flight concurrently; each is
    /// correlated independently and resolves or rejects exactly once.
    ///
    /// # Errors
    /// - [`SessionError::NotConnected`](crate::SessionError::NotConnected)
    ///   immediately when the session is not authenticated (no socket
    ///   I/O happens)
    /// - [`SessionError::RequestTimeout`](crate::SessionError::RequestTimeout)
    ///   when no response arrives within the per-request deadline
    /// - [`SessionError::Server`](crate::SessionError::Server) when the
    ///   gateway reports a failure (the server's message, verbatim)
    pub async fn call(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<Value, GatewayError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Call {
                method: method.to_string(),
                params,
                reply: tx,
            })
            .await
            .map_err(|_| GatewayError::ClientClosed)?;
        rx.await
            .map_err(|_| GatewayError::ClientClosed)?
            .map_err(GatewayError::from)
    }

    /// Subscribes to events with the given name.
    ///
    /// Notifications are delivered in socket order. A subscriber that
    /// stops reading loses notifications rather than blocking the
    /// connection.
    pub async fn subscribe(
        &self,
        event: &str,
    ) -> Result<mpsc::Receiver<Notification>, GatewayError> {
        self.subscribe_inner(Some(event.to_string())).await
    }

    /// Subscribes to the catch-all notification stream: every
    /// unsolicited message, plus the client's own `connected` /
    /// `disconnect` lifecycle notifications.
    pub async fn notifications(
        &self,
    ) -> Result<mpsc::Receiver<Notification>, GatewayError> {
        self.subscribe_inner(None).await
    }

    /// Enables or disables automatic reconnection at runtime.
    ///
    /// Disabling cancels a scheduled reconnect. Reconnects only ever
    /// happen after a previously authenticated session drops.
    pub async fn set_auto_reconnect(&self, enabled: bool) {
        let _ = self
            .cmd_tx
            .send(Command::SetAutoReconnect { enabled })
            .await;
    }

    async fn subscribe_inner(
        &self,
        name: Option<String>,
    ) -> Result<mpsc::Receiver<Notification>, GatewayError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Subscribe { name, reply: tx })
            .await
            .map_err(|_| GatewayError::ClientClosed)?;
        rx.await.map_err(|_| GatewayError::ClientClosed)
    }
}
