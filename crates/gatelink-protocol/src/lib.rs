//! Wire protocol for the Gateway.
//!
//! This crate defines the "language" spoken over the Gateway socket:
//!
//! - **Types** ([`WireMessage`], [`InboundFrame`], [`RequestId`],
//!   [`ConnectParams`], etc.) — the message structures that travel on
//!   the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how those messages are
//!   converted to/from JSON text.
//! - **Errors** ([`ProtocolError`]) — what can go wrong during
//!   encoding/decoding.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw text frames) and the
//! session layer (correlation, authentication). It doesn't know about
//! sockets or pending requests — it only knows how to classify and
//! (de)serialize frames.
//!
//! ```text
//! Transport (text frames) → Protocol (WireMessage) → Session (correlation)
//! ```

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{
    AuthInfo, ClientInfo, ConnectParams, ErrorBody, InboundFrame, RequestId,
    WireMessage, CHALLENGE_EVENT, CONNECT_METHOD, PROTOCOL_VERSION,
};
