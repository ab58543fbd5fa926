//! The connection task: owns the socket for its whole lifetime.
//!
//! All socket I/O, state transitions, correlation, and reconnect policy
//! live in one task driven by a `tokio::select!` loop. The public
//! [`GatewayClient`](crate::GatewayClient) handle talks to it through a
//! command channel, so callers on any task see a consistent view without
//! shared locks. Inbound frames are handled strictly in arrival order.
//!
//! Lifecycle of a connection attempt:
//!   1. `Connect` command arrives → dial the endpoint (token in the
//!      query string), state `Connecting`
//!   2. socket opens → state `SocketOpen`; the gateway speaks first
//!   3. challenge event arrives → send the credentialed `connect`
//!      request through the correlator
//!   4. success response → state `Authenticated`, every waiting
//!      `connect()` caller resolves, a `connected` notification fires
//!
//! One deadline covers the whole attempt. Concurrent `connect()` callers
//! join the in-flight attempt's waiter list instead of dialing again.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use gatelink_protocol::{
    Codec, InboundFrame, JsonCodec, RequestId, WireMessage, CHALLENGE_EVENT,
    CONNECT_METHOD,
};
use gatelink_retry::ReconnectTimer;
use gatelink_session::{
    Completion, Handshake, PendingRequests, Resolved, SessionError, SessionState,
};
use gatelink_transport::{
    credentialed_endpoint, Dialer, Socket, TransportError, WebSocketConnection,
    WebSocketDialer,
};
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant};

use crate::config::GatewayConfig;
use crate::error::{ConnectFailure, GatewayError};
use crate::events::{EventDispatcher, Notification};

/// Commands sent from the public handle to the connection task.
pub(crate) enum Command {
    /// Establish an authenticated session (or join the attempt in
    /// flight). The reply fires when the attempt settles.
    Connect {
        reply: oneshot::Sender<Result<(), ConnectFailure>>,
    },

    /// Tear down the socket and force auto-reconnect off.
    Disconnect { reply: oneshot::Sender<()> },

    /// Submit one RPC request.
    Call {
        method: String,
        params: Option<Value>,
        reply: oneshot::Sender<Result<Value, SessionError>>,
    },

    /// Register an event subscriber (`None` = catch-all stream).
    Subscribe {
        name: Option<String>,
        reply: oneshot::Sender<mpsc::Receiver<Notification>>,
    },

    /// Toggle the reconnect policy at runtime.
    SetAutoReconnect { enabled: bool },
}

/// Capacity of the handle → task command channel.
const COMMAND_CHANNEL_CAPACITY: usize = 64;

pub(crate) struct ConnTask {
    config: GatewayConfig,
    codec: JsonCodec,
    cmd_rx: mpsc::Receiver<Command>,

    /// Mirrors "authenticated AND live socket" for `is_connected()`.
    connected: Arc<AtomicBool>,

    state: SessionState,
    socket: Option<WebSocketConnection>,
    pending: PendingRequests,
    dispatcher: EventDispatcher,
    handshake: Handshake,

    /// Everyone awaiting the current connection attempt. Non-empty only
    /// while an attempt started by `connect()` is in flight.
    waiters: Vec<oneshot::Sender<Result<(), ConnectFailure>>>,

    /// Deadline for the whole current attempt (dial + challenge +
    /// handshake). `None` when no attempt is in flight.
    attempt_deadline: Option<Instant>,

    retry: ReconnectTimer,

    /// Whether the current attempt was started by the reconnect timer.
    /// Only such attempts re-arm the timer on failure.
    reconnecting: bool,
}

impl ConnTask {
    /// Spawns the connection task and returns the handle's ends.
    pub(crate) fn spawn(
        config: GatewayConfig,
    ) -> (mpsc::Sender<Command>, Arc<AtomicBool>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let connected = Arc::new(AtomicBool::new(false));

        let retry = ReconnectTimer::new(config.retry.clone());
        let task = ConnTask {
            config,
            codec: JsonCodec,
            cmd_rx,
            connected: Arc::clone(&connected),
            state: SessionState::Disconnected,
            socket: None,
            pending: PendingRequests::new(),
            dispatcher: EventDispatcher::new(),
            handshake: Handshake::new(),
            waiters: Vec::new(),
            attempt_deadline: None,
            retry,
            reconnecting: false,
        };
        tokio::spawn(task.run());

        (cmd_tx, connected)
    }

    async fn run(mut self) {
        loop {
            let request_expiry = self.pending.next_deadline();

            tokio::select! {
                cmd = self.cmd_rx.recv() => {
                    match cmd {
                        Some(cmd) => self.handle_command(cmd).await,
                        None => {
                            // Every handle dropped; nothing can reach us.
                            self.shutdown().await;
                            return;
                        }
                    }
                }

                frame = recv_frame(&mut self.socket) => {
                    self.handle_socket_event(frame).await;
                }

                _ = sleep_until_or_pend(self.attempt_deadline) => {
                    tracing::warn!("connection attempt timed out");
                    self.fail_attempt(ConnectFailure::Timeout).await;
                }

                _ = sleep_until_or_pend(request_expiry) => {
                    self.expire_pending().await;
                }

                attempt = self.retry.fire() => {
                    tracing::info!(attempt, "reconnecting to gateway");
                    self.reconnecting = true;
                    self.begin_attempt().await;
                }
            }
        }
    }

    // -- Commands ---------------------------------------------------------

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Connect { reply } => self.handle_connect(reply).await,
            Command::Disconnect { reply } => {
                self.handle_disconnect().await;
                let _ = reply.send(());
            }
            Command::Call {
                method,
                params,
                reply,
            } => self.handle_call(method, params, reply).await,
            Command::Subscribe { name, reply } => {
                let _ = reply.send(self.dispatcher.subscribe(name));
            }
            Command::SetAutoReconnect { enabled } => {
                tracing::debug!(enabled, "auto-reconnect toggled");
                self.retry.set_enabled(enabled);
            }
        }
    }

    async fn handle_connect(
        &mut self,
        reply: oneshot::Sender<Result<(), ConnectFailure>>,
    ) {
        if self.state.is_authenticated() {
            // No-op success: the session is already up.
            let _ = reply.send(Ok(()));
            return;
        }

        self.waiters.push(reply);
        if self.state.attempt_in_flight() {
            // Concurrent callers share the single in-flight attempt.
            return;
        }

        // A manual connect supersedes any scheduled retry.
        self.retry.cancel();
        self.reconnecting = false;
        self.begin_attempt().await;
    }

    async fn handle_disconnect(&mut self) {
        // Explicit disconnect is terminal for the current socket: the
        // reconnect policy is forced off and nothing is retried.
        self.retry.set_enabled(false);
        self.reconnecting = false;
        self.attempt_deadline = None;

        let had_socket = self.socket.is_some();
        if let Some(mut sock) = self.socket.take() {
            let _ = sock.close().await;
        }

        self.transition(SessionState::Disconnected);
        self.connected.store(false, Ordering::SeqCst);
        self.pending.fail_all("client disconnected");
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(Err(ConnectFailure::Failed(
                "disconnected by caller".into(),
            )));
        }

        if had_socket {
            self.dispatcher.dispatch(Notification {
                name: "disconnect".into(),
                params: json!({ "reason": "client disconnected" }),
            });
        }
        tracing::info!("disconnected from gateway");
    }

    async fn handle_call(
        &mut self,
        method: String,
        params: Option<Value>,
        reply: oneshot::Sender<Result<Value, SessionError>>,
    ) {
        if !self.state.is_authenticated() {
            // Rejected before any socket I/O happens.
            let _ = reply.send(Err(SessionError::NotConnected));
            return;
        }

        let deadline = Instant::now() + self.config.request_timeout;
        let id =
            self.pending
                .register(&method, Completion::Caller(reply), deadline);
        let request = WireMessage::Req {
            id: id.clone(),
            method: method.clone(),
            params,
        };

        if let Err(e) = self.send_message(&request).await {
            tracing::warn!(error = %e, method, "failed to send request");
            let _ = self.pending.resolve(
                &id,
                Err(SessionError::ConnectionClosed(e.to_string())),
            );
            // A failed send means the socket is gone.
            self.on_socket_closed("send failed").await;
        }
    }

    // -- Connection attempts ----------------------------------------------

    /// Starts a fresh attempt: dial, then wait for the challenge.
    async fn begin_attempt(&mut self) {
        // Defensively discard any half-dead socket from a previous life.
        if let Some(mut sock) = self.socket.take() {
            let _ = sock.close().await;
        }
        self.connected.store(false, Ordering::SeqCst);
        self.handshake = Handshake::new();

        self.transition(SessionState::Connecting);
        let deadline = Instant::now() + self.config.connect_timeout;
        self.attempt_deadline = Some(deadline);

        let endpoint =
            credentialed_endpoint(&self.config.endpoint, &self.config.token);
        match time::timeout_at(deadline, WebSocketDialer.dial(&endpoint)).await {
            Err(_) => {
                self.fail_attempt(ConnectFailure::Timeout).await;
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "gateway dial failed");
                self.fail_attempt(ConnectFailure::Failed(e.to_string()))
                    .await;
            }
            Ok(Ok(sock)) => {
                tracing::debug!(id = %sock.id(), "socket open, awaiting challenge");
                self.socket = Some(sock);
                self.transition(SessionState::SocketOpen);
                // The gateway speaks first; nothing is sent until its
                // challenge arrives.
            }
        }
    }

    /// Fails the in-flight attempt and notifies every waiter.
    async fn fail_attempt(&mut self, failure: ConnectFailure) {
        if let Some(mut sock) = self.socket.take() {
            let _ = sock.close().await;
        }
        self.attempt_deadline = None;
        self.transition(SessionState::Disconnected);
        self.connected.store(false, Ordering::SeqCst);
        self.pending.fail_all("connection attempt failed");

        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(Err(failure.clone()));
        }

        // A dropped reconnect attempt schedules the next retry; an
        // initial attempt failure is surfaced to its callers only.
        if self.reconnecting {
            self.retry.arm();
        }
    }

    // -- Socket events ----------------------------------------------------

    async fn handle_socket_event(
        &mut self,
        frame: Result<Option<String>, TransportError>,
    ) {
        match frame {
            Ok(Some(text)) => self.handle_frame(&text).await,
            Ok(None) => self.on_socket_closed("closed by gateway").await,
            Err(e) => {
                // Surfaced as a diagnostic; never crashes the task.
                tracing::warn!(error = %e, "socket error");
                if self.state.attempt_in_flight() {
                    self.fail_attempt(ConnectFailure::Failed(e.to_string()))
                        .await;
                } else {
                    self.on_socket_closed(&e.to_string()).await;
                }
            }
        }
    }

    /// Handles the socket dropping in any state.
    async fn on_socket_closed(&mut self, reason: &str) {
        self.dispatcher.dispatch(Notification {
            name: "disconnect".into(),
            params: json!({ "reason": reason }),
        });

        if self.state.attempt_in_flight() {
            // Close during the handshake fails the attempt; that is
            // surfaced to the caller and never auto-retried.
            self.fail_attempt(ConnectFailure::Failed(format!(
                "connection closed: {reason}"
            )))
            .await;
            return;
        }

        let was_authenticated = self.state.is_authenticated();
        self.socket = None;
        self.transition(SessionState::Disconnected);
        self.connected.store(false, Ordering::SeqCst);

        let dropped = self.pending.fail_all(reason);
        if dropped > 0 {
            tracing::debug!(dropped, "in-flight requests dropped with the socket");
        }
        tracing::info!(reason, "gateway connection lost");

        if was_authenticated && self.retry.enabled() {
            self.reconnecting = true;
            self.retry.arm();
        }
    }

    // -- Inbound frames ----------------------------------------------------

    async fn handle_frame(&mut self, text: &str) {
        let frame = match InboundFrame::decode(text) {
            Ok(frame) => frame,
            Err(e) => {
                // Malformed frames must never take down message
                // processing or other pending requests.
                tracing::warn!(error = %e, "dropping malformed frame");
                return;
            }
        };

        match frame {
            InboundFrame::Message(WireMessage::Event { event, params }) => {
                if event == CHALLENGE_EVENT {
                    self.on_challenge().await;
                } else {
                    self.dispatcher.dispatch(Notification {
                        name: event,
                        params: Value::Object(params),
                    });
                }
            }

            InboundFrame::Message(WireMessage::Res {
                id,
                ok,
                payload,
                error,
            }) => {
                let result = if ok {
                    Ok(payload.unwrap_or(Value::Null))
                } else {
                    Err(SessionError::Server(
                        error
                            .map(|e| e.message)
                            .unwrap_or_else(|| "unspecified gateway error".into()),
                    ))
                };
                self.route_response(&id, result).await;
            }

            InboundFrame::LegacyResponse { id, result, error } => {
                let result = match error {
                    Some(body) => Err(SessionError::Server(body.message)),
                    None => Ok(result.unwrap_or(Value::Null)),
                };
                self.route_response(&id, result).await;
            }

            InboundFrame::Notification { method, params } => {
                self.dispatcher.dispatch(Notification {
                    name: method,
                    params: params.unwrap_or(Value::Null),
                });
            }

            InboundFrame::Message(WireMessage::Req { id, method, .. }) => {
                tracing::debug!(%id, method, "unexpected request from gateway, dropping");
            }
        }
    }

    async fn route_response(
        &mut self,
        id: &RequestId,
        result: Result<Value, SessionError>,
    ) {
        match self.pending.resolve(id, result) {
            Some(Resolved::Delivered) => {}
            Some(Resolved::Handshake(outcome)) => {
                self.finish_handshake(outcome).await;
            }
            None => {
                // Protocol anomaly, or a late reply after expiry.
                tracing::debug!(%id, "response for unknown id, dropping");
            }
        }
    }

    // -- Handshake ---------------------------------------------------------

    async fn on_challenge(&mut self) {
        let params = match self
            .handshake
            .on_challenge(&self.config.client, &self.config.token)
        {
            Ok(params) => params,
            Err(e) => {
                // Duplicate challenge: protocol anomaly, hard failure.
                tracing::warn!(error = %e, "duplicate challenge from gateway");
                if self.state.attempt_in_flight() {
                    self.fail_attempt(ConnectFailure::Auth(e.to_string()))
                        .await;
                } else {
                    self.on_socket_closed("duplicate challenge").await;
                }
                return;
            }
        };

        let params_value = match serde_json::to_value(&params) {
            Ok(value) => value,
            Err(e) => {
                self.fail_attempt(ConnectFailure::Failed(e.to_string()))
                    .await;
                return;
            }
        };

        let deadline = self
            .attempt_deadline
            .unwrap_or_else(|| Instant::now() + self.config.connect_timeout);
        let id =
            self.pending
                .register(CONNECT_METHOD, Completion::Handshake, deadline);
        let request = WireMessage::Req {
            id,
            method: CONNECT_METHOD.into(),
            params: Some(params_value),
        };

        if let Err(e) = self.send_message(&request).await {
            tracing::warn!(error = %e, "failed to answer challenge");
            self.fail_attempt(ConnectFailure::Failed(e.to_string()))
                .await;
        }
    }

    async fn finish_handshake(&mut self, outcome: Result<Value, SessionError>) {
        match outcome {
            Ok(payload) => {
                self.transition(SessionState::Authenticated);
                self.connected.store(true, Ordering::SeqCst);
                self.attempt_deadline = None;
                self.reconnecting = false;
                self.retry.record_success();
                tracing::info!("authenticated with gateway");

                for waiter in self.waiters.drain(..) {
                    let _ = waiter.send(Ok(()));
                }
                self.dispatcher.dispatch(Notification {
                    name: "connected".into(),
                    params: payload,
                });
            }
            Err(e) => {
                let message = e.to_string();
                tracing::warn!(error = %message, "gateway rejected credential");
                self.fail_attempt(ConnectFailure::Auth(message)).await;
            }
        }
    }

    // -- Timers ------------------------------------------------------------

    async fn expire_pending(&mut self) {
        let expired = self.pending.expire(Instant::now());
        // Callers were already rejected by the correlator; an expired
        // handshake means the attempt itself is dead.
        if expired.iter().any(|e| e.was_handshake) {
            self.fail_attempt(ConnectFailure::Timeout).await;
        }
    }

    // -- Plumbing ----------------------------------------------------------

    async fn send_message(&mut self, msg: &WireMessage) -> Result<(), GatewayError> {
        let text = self.codec.encode(msg)?;
        match self.socket.as_mut() {
            Some(sock) => Ok(sock.send(&text).await?),
            None => Err(GatewayError::Session(SessionError::NotConnected)),
        }
    }

    fn transition(&mut self, next: SessionState) {
        if self.state.can_transition_to(next) {
            tracing::trace!(from = %self.state, to = %next, "session state");
        } else if self.state != next {
            tracing::warn!(from = %self.state, to = %next, "unexpected session state transition");
        }
        self.state = next;
    }

    async fn shutdown(&mut self) {
        if let Some(mut sock) = self.socket.take() {
            let _ = sock.close().await;
        }
        self.connected.store(false, Ordering::SeqCst);
        self.pending.fail_all("client dropped");
        tracing::debug!("connection task exiting");
    }
}

/// Receives the next frame, or pends forever while no socket exists —
/// `select!` keeps servicing the other branches.
async fn recv_frame(
    socket: &mut Option<WebSocketConnection>,
) -> Result<Option<String>, TransportError> {
    match socket {
        Some(sock) => sock.recv().await,
        None => std::future::pending().await,
    }
}

/// Sleeps until the deadline, or pends forever when there is none.
async fn sleep_until_or_pend(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
