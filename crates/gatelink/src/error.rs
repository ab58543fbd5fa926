//! Unified error type for the Gateway client.

use gatelink_protocol::ProtocolError;
use gatelink_session::SessionError;
use gatelink_transport::TransportError;

/// Why a connection attempt failed.
///
/// Kept clonable so one failure can be fanned out to every caller
/// sharing the in-flight attempt.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConnectFailure {
    /// No authenticated session within the connect deadline.
    #[error("connection timed out")]
    Timeout,

    /// Socket-level failure before authentication completed.
    #[error("connection failed: {0}")]
    Failed(String),

    /// The Gateway rejected the credential; wraps the server's message.
    #[error("authentication failed: {0}")]
    Auth(String),
}

/// Top-level error that wraps all layer-specific errors.
///
/// When using the `gatelink` crate, you deal with this single error
/// type instead of importing errors from each layer crate. The `#[from]`
/// attribute on each variant auto-generates `From` impls, so `?`
/// converts layer errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// A connection attempt failed (timeout, socket error, or rejected
    /// credential). Failures of `connect()` reject only that attempt.
    #[error(transparent)]
    Connect(#[from] ConnectFailure),

    /// A transport-level error (dial, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid frame).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error: not connected, request timeout, or a
    /// server-reported failure. Failures of one call never affect other
    /// pending calls.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The configured endpoint is not a valid URL.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    /// The client's connection task is no longer running.
    #[error("client is closed")]
    ClientClosed,
}
