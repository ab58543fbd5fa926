//! The request correlator: tracks in-flight requests by unique id.
//!
//! Every outbound request registers an entry here before it is sent.
//! The entry is removed on exactly one of: a matching response, deadline
//! expiry, or wholesale failure when the socket drops — whichever comes
//! first. A response for an id that is no longer (or never was) in the
//! map is a no-op, which is how late responses after a timeout are
//! silently absorbed.
//!
//! Invariants:
//! - no two entries share an id (fresh ids are re-rolled on collision)
//! - resolving one entry never touches another
//! - every entry is eventually resolved, rejected, or expired

use std::collections::HashMap;

use gatelink_protocol::RequestId;
use rand::Rng;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::SessionError;

/// How a resolved response is delivered.
#[derive(Debug)]
pub enum Completion {
    /// Deliver to an awaiting `call()` through its oneshot.
    Caller(oneshot::Sender<Result<Value, SessionError>>),

    /// The authentication handshake request. It has no caller channel —
    /// the connection task handles its outcome inline.
    Handshake,
}

/// A request awaiting its response.
#[derive(Debug)]
struct PendingRequest {
    method: String,
    completion: Completion,
    deadline: Instant,
}

/// What [`PendingRequests::resolve`] did with a routed response.
#[derive(Debug)]
pub enum Resolved {
    /// The result was delivered to the waiting caller.
    Delivered,

    /// The entry was the handshake; the connection task must act on the
    /// returned outcome.
    Handshake(Result<Value, SessionError>),
}

/// A request removed by [`PendingRequests::expire`].
#[derive(Debug)]
pub struct ExpiredRequest {
    pub id: RequestId,
    pub method: String,
    pub was_handshake: bool,
}

/// The pending-request map. Owned exclusively by the connection task.
#[derive(Debug, Default)]
pub struct PendingRequests {
    entries: HashMap<RequestId, PendingRequest>,
}

impl PendingRequests {
    /// Creates an empty correlator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a request and returns a fresh id not currently pending.
    ///
    /// `deadline` is the instant after which the entry is expired by
    /// [`expire`](Self::expire).
    pub fn register(
        &mut self,
        method: &str,
        completion: Completion,
        deadline: Instant,
    ) -> RequestId {
        let mut id = RequestId(generate_id());
        while self.entries.contains_key(&id) {
            id = RequestId(generate_id());
        }

        self.entries.insert(
            id.clone(),
            PendingRequest {
                method: method.to_string(),
                completion,
                deadline,
            },
        );
        tracing::trace!(%id, method, "registered pending request");
        id
    }

    /// Routes a response to its pending entry and removes the entry.
    ///
    /// Returns `None` for an unknown id — a late response after a
    /// timeout, or a stray frame. Callers log and drop those. Resolving
    /// an entry never touches any other entry.
    pub fn resolve(
        &mut self,
        id: &RequestId,
        result: Result<Value, SessionError>,
    ) -> Option<Resolved> {
        let entry = self.entries.remove(id)?;
        match entry.completion {
            Completion::Caller(tx) => {
                // The caller may have gone away; that's its problem.
                let _ = tx.send(result);
                Some(Resolved::Delivered)
            }
            Completion::Handshake => Some(Resolved::Handshake(result)),
        }
    }

    /// The earliest deadline among pending entries, if any.
    ///
    /// The connection task sleeps until this instant and then calls
    /// [`expire`](Self::expire).
    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries.values().map(|e| e.deadline).min()
    }

    /// Removes every entry whose deadline has passed.
    ///
    /// Callers are rejected with [`SessionError::RequestTimeout`] naming
    /// the original method. Expired handshake entries are reported back
    /// so the connection task can fail the attempt.
    pub fn expire(&mut self, now: Instant) -> Vec<ExpiredRequest> {
        let due: Vec<RequestId> = self
            .entries
            .iter()
            .filter(|(_, e)| e.deadline <= now)
            .map(|(id, _)| id.clone())
            .collect();

        let mut expired = Vec::with_capacity(due.len());
        for id in due {
            let Some(entry) = self.entries.remove(&id) else {
                continue;
            };
            let was_handshake = matches!(entry.completion, Completion::Handshake);
            if let Completion::Caller(tx) = entry.completion {
                let _ = tx.send(Err(SessionError::RequestTimeout {
                    method: entry.method.clone(),
                }));
            }
            tracing::debug!(%id, method = %entry.method, "request timed out");
            expired.push(ExpiredRequest {
                id,
                method: entry.method,
                was_handshake,
            });
        }
        expired
    }

    /// Rejects and removes every pending entry.
    ///
    /// Used when the socket drops or the client disconnects. Each caller
    /// receives [`SessionError::ConnectionClosed`] with the given reason.
    /// Returns how many entries were rejected.
    pub fn fail_all(&mut self, reason: &str) -> usize {
        let count = self.entries.len();
        for (id, entry) in self.entries.drain() {
            if let Completion::Caller(tx) = entry.completion {
                let _ = tx.send(Err(SessionError::ConnectionClosed(
                    reason.to_string(),
                )));
            }
            tracing::trace!(%id, method = %entry.method, reason, "pending request dropped");
        }
        count
    }

    /// Number of in-flight requests.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no requests are in flight.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Generates a random 32-character hex id (128 bits of entropy).
fn generate_id() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

// =========================================================================
// Tests
// =========================================================================
