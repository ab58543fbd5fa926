//! Session layer for the Gateway client.
//!
//! This crate owns the stateful pieces beneath the connection manager:
//!
//! 1. **Session state** — the authentication phase of the current socket
//!    ([`SessionState`])
//! 2. **Request correlation** — tracking in-flight requests by unique id
//!    and routing responses, rejections, and timeouts ([`PendingRequests`])
//! 3. **Authentication** — answering the Gateway's challenge with a
//!    credentialed connect request, at most once per socket ([`Handshake`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Client layer (above)   ← drives connect attempts, owns the socket task
//!     ↕
//! Session layer (this crate)  ← correlation map, state machine, handshake
//!     ↕
//! Protocol layer (below) ← provides RequestId, ConnectParams, frames
//! ```
//!
//! # Concurrency note
//!
//! Nothing here is thread-safe by itself — [`PendingRequests`] is a plain
//! `HashMap`. This is intentional: the session layer is owned by a single
//! task (the client's connection task), which serializes all access.
//! Callers on other tasks reach it through that task's command channel.

mod error;
mod handshake;
mod pending;
mod state;

pub use error::SessionError;
pub use handshake::Handshake;
pub use pending::{Completion, ExpiredRequest, PendingRequests, Resolved};
pub use state::SessionState;
