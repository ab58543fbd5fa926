//! Integration tests for the Gateway client against a mock gateway.
//!
//! Each test binds an in-process WebSocket server that plays the
//! Gateway's side of the protocol: it emits the challenge, inspects the
//! client's `connect` request, and answers RPC calls however the
//! scenario demands. Timeouts and reconnect delays are shrunk so the
//! failure cases run in milliseconds.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use gatelink::{
    ConnectFailure, GatewayClient, GatewayConfig, GatewayError, RetryConfig,
    SessionError,
};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

type ServerWs = WebSocketStream<TcpStream>;

const TOKEN: &str = "secret-token";

// =========================================================================
// Mock gateway helpers
// =========================================================================

/// Binds a mock gateway listener and builds a client config pointing at
/// it, with test-sized timeouts.
async fn gateway() -> (TcpListener, GatewayConfig) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");

    let mut config =
        GatewayConfig::new(&format!("ws://{addr}"), TOKEN).expect("config");
    config.connect_timeout = Duration::from_secs(2);
    config.request_timeout = Duration::from_secs(2);
    config.retry = RetryConfig::with_delay(Duration::from_millis(50));
    (listener, config)
}

/// Accepts one socket from the client.
async fn accept(listener: &TcpListener) -> ServerWs {
    let (stream, _) = listener.accept().await.expect("accept");
    tokio_tungstenite::accept_async(stream)
        .await
        .expect("upgrade")
}

async fn send_json(ws: &mut ServerWs, value: Value) {
    ws.send(Message::Text(value.to_string().into()))
        .await
        .expect("server send");
}

async fn send_text(ws: &mut ServerWs, text: &str) {
    ws.send(Message::Text(text.to_string().into()))
        .await
        .expect("server send");
}

/// Reads the next JSON frame from the client.
async fn read_json(ws: &mut ServerWs) -> Value {
    loop {
        let msg = ws.next().await.expect("frame").expect("server recv");
        match msg {
            Message::Text(text) => {
                return serde_json::from_str(text.as_str()).expect("json");
            }
            Message::Close(_) => panic!("client closed while awaiting frame"),
            _ => continue,
        }
    }
}

/// Plays the gateway's side of the handshake: challenge out, connect
/// request in (token verified), success response back.
async fn run_handshake(ws: &mut ServerWs) {
    send_json(ws, json!({"type": "event", "event": "connect.challenge"})).await;

    let req = read_json(ws).await;
    assert_eq!(req["type"], "req");
    assert_eq!(req["method"], "connect");
    assert_eq!(req["params"]["minProtocol"], 3);
    assert_eq!(req["params"]["maxProtocol"], 3);
    assert_eq!(req["params"]["auth"]["token"], TOKEN);
    assert_eq!(req["params"]["client"]["id"], "gatelink");

    let id = req["id"].clone();
    send_json(
        ws,
        json!({"type": "res", "id": id, "ok": true, "payload": {"server": "mock"}}),
    )
    .await;
}

/// Connects a fresh client through the full handshake.
async fn connected_pair(
    listener: &TcpListener,
    config: GatewayConfig,
) -> (GatewayClient, ServerWs) {
    let client = GatewayClient::new(config);
    let (ws, result) = tokio::join!(
        async {
            let mut ws = accept(listener).await;
            run_handshake(&mut ws).await;
            ws
        },
        client.connect(),
    );
    result.expect("connect should succeed");
    (client, ws)
}

/// Polls `is_connected` until it turns true or the deadline passes.
async fn wait_connected(client: &GatewayClient) {
    for _ in 0..100 {
        if client.is_connected() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("client never became connected");
}

// =========================================================================
// Connection lifecycle
// =========================================================================

#[tokio::test]
async fn test_connect_handshake_success() {
    let (listener, config) = gateway().await;
    let (client, _ws) = connected_pair(&listener, config).await;

    assert!(client.is_connected());
}

#[tokio::test]
async fn test_token_travels_as_query_parameter() {
    use tokio_tungstenite::tungstenite::handshake::server::{
        ErrorResponse, Request, Response,
    };

    let (listener, config) = gateway().await;
    let client = GatewayClient::new(config);

    let connect_client = client.clone();
    let connect = tokio::spawn(async move { connect_client.connect().await });

    let (stream, _) = listener.accept().await.expect("accept");
    let (uri_tx, uri_rx) = tokio::sync::oneshot::channel();
    let callback = move |req: &Request,
                         resp: Response|
          -> Result<Response, ErrorResponse> {
        let _ = uri_tx.send(req.uri().to_string());
        Ok(resp)
    };
    let mut ws = tokio_tungstenite::accept_hdr_async(stream, callback)
        .await
        .expect("upgrade");
    run_handshake(&mut ws).await;

    connect.await.expect("join").expect("connect");
    let uri = uri_rx.await.expect("uri captured");
    assert!(
        uri.contains("token=secret-token"),
        "credential must ride the upgrade query string, got {uri}"
    );
}

#[tokio::test]
async fn test_concurrent_connects_share_one_socket() {
    let (listener, config) = gateway().await;
    let client = GatewayClient::new(config);

    let (c1, c2) = (client.clone(), client.clone());
    let h1 = tokio::spawn(async move { c1.connect().await });
    let h2 = tokio::spawn(async move { c2.connect().await });

    // Exactly one socket and one handshake serve both callers.
    let mut ws = accept(&listener).await;
    run_handshake(&mut ws).await;

    h1.await.expect("join").expect("first connect");
    h2.await.expect("join").expect("second connect");
    assert!(client.is_connected());

    let second_socket =
        tokio::time::timeout(Duration::from_millis(200), listener.accept())
            .await;
    assert!(second_socket.is_err(), "no second socket may be opened");
}

#[tokio::test]
async fn test_connect_when_already_connected_is_noop() {
    let (listener, config) = gateway().await;
    let (client, _ws) = connected_pair(&listener, config).await;

    // No new socket, no new handshake — immediate success.
    client.connect().await.expect("noop connect");
    let second =
        tokio::time::timeout(Duration::from_millis(200), listener.accept())
            .await;
    assert!(second.is_err());
}

#[tokio::test]
async fn test_auth_rejection_surfaces_server_message() {
    let (listener, config) = gateway().await;
    let client = GatewayClient::new(config);

    let connect_client = client.clone();
    let connect = tokio::spawn(async move { connect_client.connect().await });

    let mut ws = accept(&listener).await;
    send_json(&mut ws, json!({"type": "event", "event": "connect.challenge"}))
        .await;
    let req = read_json(&mut ws).await;
    send_json(
        &mut ws,
        json!({"type": "res", "id": req["id"], "ok": false,
               "error": {"message": "bad token"}}),
    )
    .await;

    let err = connect.await.expect("join").expect_err("must fail");
    match err {
        GatewayError::Connect(ConnectFailure::Auth(message)) => {
            assert!(message.contains("bad token"), "got: {message}");
        }
        other => panic!("expected auth failure, got {other:?}"),
    }
    assert!(!client.is_connected());
}

#[tokio::test]
async fn test_connect_timeout_when_gateway_silent() {
    let (listener, mut config) = gateway().await;
    config.connect_timeout = Duration::from_millis(200);
    let client = GatewayClient::new(config);

    let connect_client = client.clone();
    let connect = tokio::spawn(async move { connect_client.connect().await });

    // Accept the socket but never send the challenge.
    let _ws = accept(&listener).await;

    let err = connect.await.expect("join").expect_err("must time out");
    assert!(
        matches!(err, GatewayError::Connect(ConnectFailure::Timeout)),
        "expected timeout, got {err:?}"
    );
}

#[tokio::test]
async fn test_connect_refused_when_nothing_listens() {
    let (listener, config) = gateway().await;
    drop(listener);

    let client = GatewayClient::new(config);
    let err = client.connect().await.expect_err("must fail");
    assert!(
        matches!(err, GatewayError::Connect(ConnectFailure::Failed(_))),
        "expected connection failure, got {err:?}"
    );
}

// =========================================================================
// RPC calls
// =========================================================================

#[tokio::test]
async fn test_call_resolves_empty_sessions_list() {
    let (listener, config) = gateway().await;
    let (client, mut ws) = connected_pair(&listener, config).await;

    let call_client = client.clone();
    let call = tokio::spawn(async move { call_client.list_sessions().await });

    let req = read_json(&mut ws).await;
    assert_eq!(req["method"], "sessions.list");
    send_json(
        &mut ws,
        json!({"type": "res", "id": req["id"], "ok": true, "payload": []}),
    )
    .await;

    let sessions = call.await.expect("join").expect("call");
    assert!(sessions.is_empty());
}

#[tokio::test]
async fn test_call_server_error_message_is_exact() {
    let (listener, config) = gateway().await;
    let (client, mut ws) = connected_pair(&listener, config).await;

    let call_client = client.clone();
    let call = tokio::spawn(async move {
        call_client.create_agent(json!({"name": "probe"})).await
    });

    let req = read_json(&mut ws).await;
    assert_eq!(req["method"], "agents.create");
    assert_eq!(req["params"]["name"], "probe");
    send_json(
        &mut ws,
        json!({"type": "res", "id": req["id"], "ok": false,
               "error": {"message": "boom"}}),
    )
    .await;

    let err = call.await.expect("join").expect_err("must fail");
    assert_eq!(err.to_string(), "boom");
    assert!(matches!(
        err,
        GatewayError::Session(SessionError::Server(_))
    ));
}

#[tokio::test]
async fn test_call_without_session_rejects_immediately() {
    let (listener, config) = gateway().await;
    let client = GatewayClient::new(config);

    let err = client
        .call("sessions.list", None)
        .await
        .expect_err("must reject");
    assert!(matches!(
        err,
        GatewayError::Session(SessionError::NotConnected)
    ));

    // And no socket I/O happened.
    let dial =
        tokio::time::timeout(Duration::from_millis(200), listener.accept())
            .await;
    assert!(dial.is_err(), "a NotConnected call must not open a socket");
}

#[tokio::test]
async fn test_call_timeout_names_method_and_late_reply_is_ignored() {
    let (listener, mut config) = gateway().await;
    config.request_timeout = Duration::from_millis(150);
    let (client, mut ws) = connected_pair(&listener, config).await;

    let call_client = client.clone();
    let call = tokio::spawn(async move { call_client.call("jobs.run", None).await });

    // Read the request but never answer it.
    let req = read_json(&mut ws).await;
    assert_eq!(req["method"], "jobs.run");

    let err = call.await.expect("join").expect_err("must time out");
    match &err {
        GatewayError::Session(SessionError::RequestTimeout { method }) => {
            assert_eq!(method, "jobs.run");
        }
        other => panic!("expected RequestTimeout, got {other:?}"),
    }
    assert!(err.to_string().contains("jobs.run"));

    // A late reply for the expired id must be silently absorbed, and
    // the session must stay usable.
    send_json(
        &mut ws,
        json!({"type": "res", "id": req["id"], "ok": true, "payload": 1}),
    )
    .await;

    let call_client = client.clone();
    let healthy =
        tokio::spawn(async move { call_client.call("node.describe", None).await });
    let req = read_json(&mut ws).await;
    send_json(
        &mut ws,
        json!({"type": "res", "id": req["id"], "ok": true, "payload": {"up": true}}),
    )
    .await;
    let payload = healthy.await.expect("join").expect("healthy call");
    assert_eq!(payload["up"], true);
}

#[tokio::test]
async fn test_concurrent_calls_resolve_independently() {
    let (listener, config) = gateway().await;
    let (client, mut ws) = connected_pair(&listener, config).await;

    let (c1, c2) = (client.clone(), client.clone());
    let alpha = tokio::spawn(async move { c1.call("alpha", None).await });
    let beta = tokio::spawn(async move { c2.call("beta", None).await });

    let first = read_json(&mut ws).await;
    let second = read_json(&mut ws).await;
    assert_ne!(first["id"], second["id"], "correlation ids must differ");
    let (alpha_req, beta_req) = if first["method"] == "alpha" {
        (first, second)
    } else {
        (second, first)
    };

    // Answer in reverse order of arrival; each call must get its own
    // payload.
    send_json(
        &mut ws,
        json!({"type": "res", "id": beta_req["id"], "ok": true, "payload": "b"}),
    )
    .await;
    send_json(
        &mut ws,
        json!({"type": "res", "id": alpha_req["id"], "ok": true, "payload": "a"}),
    )
    .await;

    assert_eq!(alpha.await.expect("join").expect("alpha"), json!("a"));
    assert_eq!(beta.await.expect("join").expect("beta"), json!("b"));
}

#[tokio::test]
async fn test_legacy_response_resolves_call() {
    let (listener, config) = gateway().await;
    let (client, mut ws) = connected_pair(&listener, config).await;

    let call_client = client.clone();
    let call = tokio::spawn(async move { call_client.call("node.describe", None).await });

    let req = read_json(&mut ws).await;
    // Old-style response: no "type" discriminator, "result" payload.
    send_json(&mut ws, json!({"id": req["id"], "result": {"n": 7}})).await;

    let payload = call.await.expect("join").expect("call");
    assert_eq!(payload, json!({"n": 7}));
}

#[tokio::test]
async fn test_malformed_frames_do_not_break_session() {
    let (listener, config) = gateway().await;
    let (client, mut ws) = connected_pair(&listener, config).await;

    send_text(&mut ws, "not json at all").await;
    send_text(&mut ws, r#"{"name": "no discriminator"}"#).await;

    // The session survives and requests still work.
    let call_client = client.clone();
    let call = tokio::spawn(async move { call_client.call("ping", None).await });
    let req = read_json(&mut ws).await;
    send_json(
        &mut ws,
        json!({"type": "res", "id": req["id"], "ok": true, "payload": "pong"}),
    )
    .await;
    assert_eq!(call.await.expect("join").expect("call"), json!("pong"));
    assert!(client.is_connected());
}

// =========================================================================
// Events
// =========================================================================

#[tokio::test]
async fn test_unsolicited_events_dispatched_in_order() {
    let (listener, config) = gateway().await;
    let (client, mut ws) = connected_pair(&listener, config).await;

    let mut ticks = client.subscribe("tick").await.expect("subscribe");
    let mut all = client.notifications().await.expect("notifications");

    send_json(&mut ws, json!({"type": "event", "event": "tick", "n": 1})).await;
    send_json(&mut ws, json!({"method": "other.note", "params": {"n": 2}})).await;
    send_json(&mut ws, json!({"type": "event", "event": "tick", "n": 3})).await;

    let first = ticks.recv().await.expect("tick 1");
    assert_eq!(first.params["n"], 1);
    let second = ticks.recv().await.expect("tick 3");
    assert_eq!(second.params["n"], 3);

    let names: Vec<String> = vec![
        all.recv().await.expect("note").name,
        all.recv().await.expect("note").name,
        all.recv().await.expect("note").name,
    ];
    assert_eq!(names, vec!["tick", "other.note", "tick"]);
}

// =========================================================================
// Reconnect policy
// =========================================================================

#[tokio::test]
async fn test_reconnects_after_authenticated_session_drops() {
    let (listener, config) = gateway().await;
    let (client, ws) = connected_pair(&listener, config).await;

    // The gateway goes away; the 50ms retry should dial us back in.
    drop(ws);

    let mut ws2 = accept(&listener).await;
    run_handshake(&mut ws2).await;

    wait_connected(&client).await;
}

#[tokio::test]
async fn test_no_reconnect_after_explicit_disconnect() {
    let (listener, config) = gateway().await;
    let (client, _ws) = connected_pair(&listener, config).await;

    client.disconnect().await;
    assert!(!client.is_connected());

    // Well past the 50ms retry delay: no new dial may arrive.
    let redial =
        tokio::time::timeout(Duration::from_millis(300), listener.accept())
            .await;
    assert!(redial.is_err(), "explicit disconnect must not reconnect");
}

#[tokio::test]
async fn test_no_reconnect_when_never_authenticated() {
    let (listener, config) = gateway().await;
    let client = GatewayClient::new(config);

    let connect_client = client.clone();
    let connect = tokio::spawn(async move { connect_client.connect().await });

    // Accept, then drop the socket before ever sending a challenge.
    let ws = accept(&listener).await;
    drop(ws);

    let err = connect.await.expect("join").expect_err("must fail");
    assert!(matches!(err, GatewayError::Connect(_)));

    // An initial failure is surfaced, never retried.
    let redial =
        tokio::time::timeout(Duration::from_millis(300), listener.accept())
            .await;
    assert!(redial.is_err(), "failed first attempt must not reconnect");
}

#[tokio::test]
async fn test_auto_reconnect_disable_cancels_retry() {
    let (listener, config) = gateway().await;
    let (client, ws) = connected_pair(&listener, config).await;

    client.set_auto_reconnect(false).await;
    // The toggle and the socket close race through different channels;
    // a subscribe round-trip guarantees the toggle has been processed.
    let _rx = client.notifications().await.expect("roundtrip");

    drop(ws);

    let redial =
        tokio::time::timeout(Duration::from_millis(300), listener.accept())
            .await;
    assert!(redial.is_err(), "disabled policy must not reconnect");
}

#[tokio::test]
async fn test_connect_again_after_disconnect() {
    let (listener, config) = gateway().await;
    let (client, _ws) = connected_pair(&listener, config).await;

    client.disconnect().await;
    assert!(!client.is_connected());

    // A manual connect after disconnect starts a fresh attempt.
    let connect_client = client.clone();
    let connect = tokio::spawn(async move { connect_client.connect().await });
    let mut ws2 = accept(&listener).await;
    run_handshake(&mut ws2).await;

    connect.await.expect("join").expect("reconnect");
    assert!(client.is_connected());
}
