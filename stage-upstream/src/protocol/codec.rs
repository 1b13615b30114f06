//! Length-delimited JSON framing.
//!
//! Every call and reply is one frame: a length prefix followed by the JSON
//! body. The length discipline comes from `LengthDelimitedCodec`; the body
//! encoding stays independent of it, so the payload bytes inside messages
//! pass through opaque.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

// Layer 3: Internal module imports
// (none)

/// A framed TCP session speaking the relay protocol.
pub type WireStream = Framed<TcpStream, LengthDelimitedCodec>;

/// Frame-level failures.
#[derive(Error, Debug)]
pub enum WireError {
    /// The value could not be serialized into a frame body.
    #[error("frame encoding failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// The frame body could not be deserialized.
    #[error("frame decoding failed: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Wrap a TCP stream with the length-delimited framing.
pub fn framed(stream: TcpStream) -> WireStream {
    Framed::new(stream, LengthDelimitedCodec::new())
}

/// Serialize one frame body.
pub fn encode<T: Serialize>(value: &T) -> Result<Bytes, WireError> {
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(WireError::Encode)
}

/// Deserialize one frame body.
pub fn decode<T: DeserializeOwned>(frame: &[u8]) -> Result<T, WireError> {
    serde_json::from_slice(frame).map_err(WireError::Decode)
}
