//! WebSocket transport implementation using `tokio-tungstenite`.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::MaybeTlsStream;
use url::Url;

use crate::{ConnectionId, Dialer, Socket, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

type WsStream =
    tokio_tungstenite::WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Attaches the access token to the endpoint as a `token` query
/// parameter.
///
/// The Gateway authenticates the upgrade request from this parameter;
/// the token is never sent in-band before the challenge. An empty token
/// leaves the endpoint untouched.
pub fn credentialed_endpoint(endpoint: &Url, token: &str) -> Url {
    let mut url = endpoint.clone();
    if !token.is_empty() {
        url.query_pairs_mut().append_pair("token", token);
    }
    url
}

/// A WebSocket-based [`Dialer`] for outbound Gateway connections.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketDialer;

impl Dialer for WebSocketDialer {
    type Socket = WebSocketConnection;
    type Error = TransportError;

    async fn dial(&self, endpoint: &Url) -> Result<Self::Socket, Self::Error> {
        let (ws, _) = tokio_tungstenite::connect_async(endpoint.as_str())
            .await
            .map_err(|e| {
                TransportError::DialFailed(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    e,
                ))
            })?;

        let id = ConnectionId::new(
            NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
        );
        // Host only — the full endpoint carries the credential token.
        tracing::debug!(
            %id,
            host = endpoint.host_str().unwrap_or("-"),
            "dialed gateway socket"
        );

        Ok(WebSocketConnection { id, ws })
    }
}

/// A single dialed WebSocket connection.
pub struct WebSocketConnection {
    id: ConnectionId,
    ws: WsStream,
}

impl Socket for WebSocketConnection {
    type Error = TransportError;

    async fn send(&mut self, text: &str) -> Result<(), Self::Error> {
        use futures_util::SinkExt;
        self.ws
            .send(Message::Text(text.to_string().into()))
            .await
            .map_err(|e| {
                TransportError::SendFailed(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    e,
                ))
            })
    }

    async fn recv(&mut self) -> Result<Option<String>, Self::Error> {
        use futures_util::StreamExt;
        loop {
            let msg = self.ws.next().await;
            match msg {
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(text.to_string()));
                }
                Some(Ok(Message::Binary(data))) => {
                    // The protocol is JSON text; tolerate peers that send
                    // it in binary frames.
                    match String::from_utf8(data.to_vec()) {
                        Ok(text) => return Ok(Some(text)),
                        Err(_) => {
                            tracing::debug!(
                                id = %self.id,
                                "dropping non-UTF-8 binary frame"
                            );
                            continue;
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // skip ping/pong/frame
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(
                        std::io::Error::new(
                            std::io::ErrorKind::ConnectionReset,
                            e,
                        ),
                    ));
                }
            }
        }
    }

    async fn close(&mut self) -> Result<(), Self::Error> {
        self.ws.close(None).await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentialed_endpoint_appends_token() {
        let base = Url::parse("ws://127.0.0.1:18789").unwrap();
        let url = credentialed_endpoint(&base, "secret");
        assert_eq!(url.as_str(), "ws://127.0.0.1:18789/?token=secret");
    }

    #[test]
    fn test_credentialed_endpoint_preserves_existing_query() {
        let base = Url::parse("ws://gw.local/socket?v=1").unwrap();
        let url = credentialed_endpoint(&base, "secret");
        assert_eq!(url.query(), Some("v=1&token=secret"));
    }

    #[test]
    fn test_credentialed_endpoint_encodes_token() {
        let base = Url::parse("ws://gw.local").unwrap();
        let url = credentialed_endpoint(&base, "a b&c");
        assert_eq!(url.query(), Some("token=a+b%26c"));
    }

    #[test]
    fn test_credentialed_endpoint_empty_token_unchanged() {
        let base = Url::parse("ws://127.0.0.1:18789").unwrap();
        let url = credentialed_endpoint(&base, "");
        assert_eq!(url, base);
    }
}
