//! Codec trait and the JSON implementation.
//!
//! A codec converts between Rust types and wire text. The protocol layer
//! doesn't care how messages are serialized — it only needs something
//! that implements [`Codec`]. The Gateway protocol is defined as JSON
//! text frames, so [`JsonCodec`] is the only implementation today; the
//! trait keeps the seam open for a future binary revision.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// Encodes Rust values to wire text and decodes wire text back.
///
/// `Send + Sync + 'static` because the codec is held by the long-lived
/// connection task and may be referenced from any runtime thread.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into one text frame.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError>;

    /// Deserializes one text frame back into a value.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Decode`] if the frame is malformed or
    /// doesn't match the expected type.
    fn decode<T: DeserializeOwned>(&self, text: &str) -> Result<T, ProtocolError>;
}

/// A [`Codec`] backed by `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError> {
        serde_json::to_string(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, text: &str) -> Result<T, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WireMessage;

    #[test]
    fn test_json_codec_round_trip() {
        let codec = JsonCodec;
        let msg = WireMessage::Req {
            id: "1".into(),
            method: "ping".into(),
            params: None,
        };
        let text = codec.encode(&msg).unwrap();
        let decoded: WireMessage = codec.decode(&text).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn test_json_codec_decode_malformed_returns_error() {
        let codec = JsonCodec;
        let result: Result<WireMessage, _> = codec.decode("{truncated");
        assert!(result.is_err());
    }
}
