//! Error types for the session layer.

/// Errors produced while correlating requests or authenticating.
///
/// Failures of an individual request reject only that request's outcome;
/// they never affect other pending requests.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A request was submitted while the session is not authenticated.
    /// No socket I/O happens for such a request.
    #[error("not connected to the gateway")]
    NotConnected,

    /// No response arrived within the per-request deadline.
    #[error("request {method:?} timed out")]
    RequestTimeout {
        /// The method of the request that timed out.
        method: String,
    },

    /// The Gateway answered the request with an explicit failure.
    /// The message is the server's, verbatim.
    #[error("{0}")]
    Server(String),

    /// The socket dropped while the request was in flight.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// A second challenge arrived on a socket whose handshake already
    /// ran.
    #[error("duplicate challenge on one connection attempt")]
    ChallengeRepeated,
}
