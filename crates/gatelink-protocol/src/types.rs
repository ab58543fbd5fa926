//! Core protocol types for the Gateway's wire format.
//!
//! Every frame on the socket is a JSON object. Frames the Gateway speaks
//! today carry a `"type"` discriminator (`req` / `res` / `event`); two
//! older shapes — the legacy RPC response (`{id, result|error}` with no
//! `type`) and the bare notification (`{method, params}` with no
//! correlation) — are still accepted for backward compatibility.
//!
//! [`WireMessage`] models the typed frames; [`InboundFrame`] is the
//! classification of anything read off the socket, legacy shapes
//! included.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Protocol version advertised during the authentication handshake.
/// Sent as both `minProtocol` and `maxProtocol` — this client speaks
/// exactly one revision.
pub const PROTOCOL_VERSION: u32 = 3;

/// Event name the Gateway sends to open the authentication handshake.
pub const CHALLENGE_EVENT: &str = "connect.challenge";

/// Method name of the credentialed request answering a challenge.
pub const CONNECT_METHOD: &str = "connect";

// ---------------------------------------------------------------------------
// RequestId
// ---------------------------------------------------------------------------

/// An opaque correlation id pairing a request with its eventual response.
///
/// The client generates ids as random hex strings. Legacy peers may
/// answer with numeric ids, so deserialization accepts either a JSON
/// string or number and normalizes numbers to their decimal text — both
/// shapes then correlate through the same map key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RequestId(pub String);

impl<'de> Deserialize<'de> for RequestId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error as _;
        match Value::deserialize(deserializer)? {
            Value::String(s) => Ok(RequestId(s)),
            Value::Number(n) => Ok(RequestId(n.to_string())),
            other => Err(D::Error::custom(format!(
                "request id must be a string or number, got {other}"
            ))),
        }
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        RequestId(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// Error body
// ---------------------------------------------------------------------------

/// The error payload of a failed response: `{"message": "..."}`.
///
/// Unknown sibling fields (codes, details) are tolerated and ignored —
/// only the message is part of the contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable failure reason, reported verbatim to callers.
    pub message: String,
}

// ---------------------------------------------------------------------------
// WireMessage — typed frames
// ---------------------------------------------------------------------------

/// A typed wire frame, discriminated by the `"type"` field.
///
/// `#[serde(tag = "type")]` produces internally tagged JSON:
///
/// ```text
/// {"type":"req","id":"4be1...","method":"sessions.list","params":{}}
/// {"type":"res","id":"4be1...","ok":true,"payload":[]}
/// {"type":"event","event":"connect.challenge"}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WireMessage {
    /// Client → Gateway: an RPC request awaiting a correlated response.
    Req {
        /// Correlation id; must be unique among in-flight requests.
        id: RequestId,
        /// RPC method name, e.g. `"sessions.list"`.
        method: String,
        /// Method parameters. Omitted from the frame when absent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        params: Option<Value>,
    },

    /// Gateway → client: the response to a previously sent request.
    ///
    /// `ok: true` carries `payload`; `ok: false` carries `error`.
    Res {
        id: RequestId,
        ok: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<ErrorBody>,
    },

    /// Gateway → client: an unsolicited event.
    ///
    /// Everything beside `type` and `event` is collected into `params`
    /// via `#[serde(flatten)]` — event frames carry their parameters at
    /// the top level, not nested.
    Event {
        /// Event name, e.g. `"connect.challenge"` or `"agent.status"`.
        event: String,
        #[serde(flatten)]
        params: serde_json::Map<String, Value>,
    },
}

// ---------------------------------------------------------------------------
// InboundFrame — classification of anything read off the socket
// ---------------------------------------------------------------------------

/// One inbound frame after shape detection.
///
/// Precedence (matches observed Gateway behavior): a frame carrying
/// `type` is parsed as a typed [`WireMessage`] and never as a legacy
/// shape; without `type`, the legacy `{id, result|error}` response is
/// tried next, then the bare-`method` notification.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// A typed frame (`req` / `res` / `event`).
    Message(WireMessage),

    /// Legacy RPC response with no `type` discriminator. Resolved the
    /// same way as a typed response: `error` present means failure,
    /// otherwise `result` is the success payload.
    LegacyResponse {
        id: RequestId,
        result: Option<Value>,
        error: Option<ErrorBody>,
    },

    /// Unsolicited notification: a `method` field with no `type` and no
    /// correlation. Routed to event subscribers under the method name.
    Notification {
        method: String,
        params: Option<Value>,
    },
}

impl InboundFrame {
    /// Classifies and parses one inbound JSON text frame.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Decode`] for malformed JSON or a frame
    /// whose detected shape fails to parse, and
    /// [`ProtocolError::InvalidFrame`] for JSON that matches none of the
    /// known shapes. Callers drop such frames; they must never abort
    /// message processing.
    pub fn decode(text: &str) -> Result<Self, crate::ProtocolError> {
        let value: Value =
            serde_json::from_str(text).map_err(crate::ProtocolError::Decode)?;

        let (has_type, is_legacy, has_method) = match value.as_object() {
            Some(obj) => (
                obj.contains_key("type"),
                obj.contains_key("id")
                    && (obj.contains_key("result") || obj.contains_key("error")),
                obj.contains_key("method"),
            ),
            None => {
                return Err(crate::ProtocolError::InvalidFrame(
                    "frame is not a JSON object".into(),
                ));
            }
        };

        if has_type {
            let msg: WireMessage =
                serde_json::from_value(value).map_err(crate::ProtocolError::Decode)?;
            return Ok(InboundFrame::Message(msg));
        }

        if is_legacy {
            #[derive(Deserialize)]
            struct Legacy {
                id: RequestId,
                #[serde(default)]
                result: Option<Value>,
                #[serde(default)]
                error: Option<ErrorBody>,
            }
            let legacy: Legacy =
                serde_json::from_value(value).map_err(crate::ProtocolError::Decode)?;
            return Ok(InboundFrame::LegacyResponse {
                id: legacy.id,
                result: legacy.result,
                error: legacy.error,
            });
        }

        if has_method {
            #[derive(Deserialize)]
            struct Bare {
                method: String,
                #[serde(default)]
                params: Option<Value>,
            }
            let bare: Bare =
                serde_json::from_value(value).map_err(crate::ProtocolError::Decode)?;
            return Ok(InboundFrame::Notification {
                method: bare.method,
                params: bare.params,
            });
        }

        Err(crate::ProtocolError::InvalidFrame(
            "frame has no type, correlation, or method discriminator".into(),
        ))
    }
}

// ---------------------------------------------------------------------------
// Authentication handshake payload
// ---------------------------------------------------------------------------

/// Client metadata sent inside the `connect` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    /// Stable client identifier, e.g. `"gatelink"`.
    pub id: String,
    /// Client version string.
    pub version: String,
    /// Host platform, e.g. `"linux"`.
    pub platform: String,
    /// Operating mode reported to the Gateway.
    pub mode: String,
}

/// Credential material sent inside the `connect` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthInfo {
    pub token: String,
}

/// Parameters of the `connect` request issued in reply to a challenge.
///
/// Wire shape (camelCase keys, per the Gateway protocol):
///
/// ```text
/// {"minProtocol":3,"maxProtocol":3,
///  "client":{"id":"gatelink","version":"0.1.0","platform":"linux","mode":"client"},
///  "auth":{"token":"..."}}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectParams {
    pub min_protocol: u32,
    pub max_protocol: u32,
    pub client: ClientInfo,
    pub auth: AuthInfo,
}

impl ConnectParams {
    /// Builds the handshake parameters for this protocol revision.
    pub fn new(client: ClientInfo, token: &str) -> Self {
        Self {
            min_protocol: PROTOCOL_VERSION,
            max_protocol: PROTOCOL_VERSION,
            client,
            auth: AuthInfo {
                token: token.to_string(),
            },
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
