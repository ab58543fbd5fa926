//! Session state: the authentication phase of the current socket.

use std::fmt;

/// The authentication/connectivity phase of the current socket, distinct
/// from raw socket open/closed status.
///
/// This is a state machine with four states:
///
/// ```text
/// Disconnected ──(connect)──→ Connecting ──(socket open)──→ SocketOpen
///      ↑                           │                            │
///      │                (timeout / error)        (challenge + handshake ok)
///      │                           │                            │
///      ├───────────────────────────┘                            ▼
///      └───────(socket close / failure / disconnect)──── Authenticated
/// ```
///
/// - **Disconnected**: no socket. Initial state; also where every
///   failure, close, and explicit `disconnect()` lands.
/// - **Connecting**: an attempt is dialing the endpoint.
/// - **SocketOpen**: the socket is up but the challenge/handshake has
///   not completed. Nothing is sent proactively in this state — the
///   Gateway speaks first.
/// - **Authenticated**: the Gateway accepted the credential; RPC calls
///   are usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No socket. Initial state, and terminal after `disconnect()`.
    #[default]
    Disconnected,

    /// A connection attempt is dialing the endpoint.
    Connecting,

    /// Socket open, waiting for the challenge / handshake result.
    SocketOpen,

    /// Handshake succeeded; requests may be submitted.
    Authenticated,
}

impl SessionState {
    /// Whether RPC requests may be submitted in this state.
    pub fn is_authenticated(self) -> bool {
        matches!(self, SessionState::Authenticated)
    }

    /// Whether a connection attempt is currently in flight.
    pub fn attempt_in_flight(self) -> bool {
        matches!(self, SessionState::Connecting | SessionState::SocketOpen)
    }

    /// Whether `self → next` is a legal transition of the lifecycle
    /// machine. Any state may fall back to `Disconnected`.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Disconnected, Connecting)
                | (Connecting, SocketOpen)
                | (SocketOpen, Authenticated)
                | (_, Disconnected)
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::SocketOpen => "socket-open",
            SessionState::Authenticated => "authenticated",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::SessionState::*;

    #[test]
    fn test_default_is_disconnected() {
        assert_eq!(super::SessionState::default(), Disconnected);
    }

    #[test]
    fn test_forward_transitions_are_legal() {
        assert!(Disconnected.can_transition_to(Connecting));
        assert!(Connecting.can_transition_to(SocketOpen));
        assert!(SocketOpen.can_transition_to(Authenticated));
    }

    #[test]
    fn test_every_state_can_fall_back_to_disconnected() {
        for state in [Disconnected, Connecting, SocketOpen, Authenticated] {
            assert!(state.can_transition_to(Disconnected));
        }
    }

    #[test]
    fn test_skipping_states_is_illegal() {
        assert!(!Disconnected.can_transition_to(SocketOpen));
        assert!(!Disconnected.can_transition_to(Authenticated));
        assert!(!Connecting.can_transition_to(Authenticated));
        assert!(!Authenticated.can_transition_to(Connecting));
        assert!(!Authenticated.can_transition_to(SocketOpen));
    }

    #[test]
    fn test_is_authenticated_only_for_authenticated() {
        assert!(Authenticated.is_authenticated());
        assert!(!Disconnected.is_authenticated());
        assert!(!Connecting.is_authenticated());
        assert!(!SocketOpen.is_authenticated());
    }

    #[test]
    fn test_attempt_in_flight_covers_connecting_and_socket_open() {
        assert!(Connecting.attempt_in_flight());
        assert!(SocketOpen.attempt_in_flight());
        assert!(!Disconnected.attempt_in_flight());
        assert!(!Authenticated.attempt_in_flight());
    }
}
