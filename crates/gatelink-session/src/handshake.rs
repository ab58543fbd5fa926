//! The authentication handshake: challenge in, credentialed connect out.
//!
//! The protocol is server-initiated. After the socket opens, the client
//! sends nothing until the Gateway's challenge event arrives; the answer
//! is a single `connect` request carrying protocol bounds, client
//! metadata, and the credential token. The Gateway's response to that
//! request decides whether the session becomes authenticated.

use gatelink_protocol::{ClientInfo, ConnectParams};

use crate::SessionError;

/// Tracks the challenge/connect exchange for one connection attempt.
///
/// At most one exchange may happen per socket. A second challenge on the
/// same socket is a protocol anomaly and is reported as an error rather
/// than answered.
#[derive(Debug, Default)]
pub struct Handshake {
    challenged: bool,
}

impl Handshake {
    /// Creates the handshake tracker for a fresh socket.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the `connect` request parameters in reply to a challenge.
    ///
    /// # Errors
    /// Returns [`SessionError::ChallengeRepeated`] for the second
    /// challenge on the same socket.
    pub fn on_challenge(
        &mut self,
        client: &ClientInfo,
        token: &str,
    ) -> Result<ConnectParams, SessionError> {
        if self.challenged {
            return Err(SessionError::ChallengeRepeated);
        }
        self.challenged = true;
        Ok(ConnectParams::new(client.clone(), token))
    }

    /// Whether a challenge has already been answered on this socket.
    pub fn challenged(&self) -> bool {
        self.challenged
    }
}

#[cfg(test)]
mod tests {
    use gatelink_protocol::PROTOCOL_VERSION;

    use super::*;

    fn client() -> ClientInfo {
        ClientInfo {
            id: "gatelink".into(),
            version: "0.1.0".into(),
            platform: "linux".into(),
            mode: "client".into(),
        }
    }

    #[test]
    fn test_first_challenge_builds_connect_params() {
        let mut hs = Handshake::new();
        assert!(!hs.challenged());

        let params = hs.on_challenge(&client(), "secret").expect("first ok");

        assert_eq!(params.min_protocol, PROTOCOL_VERSION);
        assert_eq!(params.max_protocol, PROTOCOL_VERSION);
        assert_eq!(params.auth.token, "secret");
        assert_eq!(params.client.id, "gatelink");
        assert!(hs.challenged());
    }

    #[test]
    fn test_second_challenge_is_rejected() {
        let mut hs = Handshake::new();
        hs.on_challenge(&client(), "secret").expect("first ok");

        let result = hs.on_challenge(&client(), "secret");
        assert!(matches!(result, Err(SessionError::ChallengeRepeated)));
    }
}
