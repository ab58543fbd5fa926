//! Error types for the protocol layer.

/// Errors that can occur while encoding, decoding, or classifying frames.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into frame text).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (malformed JSON, missing fields, wrong
    /// data types).
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The frame parsed as JSON but matches none of the known shapes:
    /// no `type` tag, no legacy correlation, no bare `method`.
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
}
