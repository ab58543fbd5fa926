//! Transport abstraction layer for the Gateway client.
//!
//! Provides the [`Dialer`] and [`Socket`] traits that abstract over the
//! outbound connection to a Gateway endpoint, plus the WebSocket
//! implementation used in production.
//!
//! A [`Socket`] is owned by exactly one task for its whole lifetime (the
//! client's connection task), so its methods take `&mut self` — there is
//! no shared-access locking at this layer.

#![allow(async_fn_in_trait)]

mod error;
mod websocket;

pub use error::TransportError;
pub use websocket::{credentialed_endpoint, WebSocketConnection, WebSocketDialer};

use std::fmt;

use url::Url;

/// Opaque identifier for one dialed socket, for log correlation across
/// reconnects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Establishes outbound connections to a Gateway endpoint.
pub trait Dialer: Send + Sync + 'static {
    /// The socket type produced by this dialer.
    type Socket: Socket;
    /// The error type for dial operations.
    type Error: std::error::Error + Send + Sync;

    /// Opens a new connection to the given endpoint.
    async fn dial(&self, endpoint: &Url) -> Result<Self::Socket, Self::Error>;
}

/// A single full-duplex, message-oriented socket.
pub trait Socket: Send + 'static {
    /// The error type for socket operations.
    type Error: std::error::Error + Send + Sync;

    /// Sends one text frame to the Gateway.
    async fn send(&mut self, text: &str) -> Result<(), Self::Error>;

    /// Receives the next text frame.
    ///
    /// Returns `Ok(None)` when the connection is closed.
    async fn recv(&mut self) -> Result<Option<String>, Self::Error>;

    /// Closes the connection.
    async fn close(&mut self) -> Result<(), Self::Error>;

    /// Returns the unique identifier for this socket.
    fn id(&self) -> ConnectionId;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_new_and_into_inner() {
        let id = ConnectionId::new(42);
        assert_eq!(id.into_inner(), 42);
    }

    #[test]
    fn test_connection_id_display() {
        let id = ConnectionId::new(7);
        assert_eq!(id.to_string(), "conn-7");
    }

    #[test]
    fn test_connection_id_equality() {
        let a = ConnectionId::new(1);
        let b = ConnectionId::new(1);
        let c = ConnectionId::new(2);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
