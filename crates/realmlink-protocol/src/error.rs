//! Error types for the protocol layer.
//!
//! Two enums, split by what went wrong:
//! - [`FrameError`]: one frame could not be built or read (bad header,
//!   oversized or unparseable payload). Recovery is local: drop that frame.
//! - [`ProtocolError`]: a well-formed frame that makes no sense where it
//!   arrived (unknown type id, wrong reply during the handshake window).

/// Errors that can occur while encoding or decoding a single frame.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Fewer than the 4 header bytes were available.
    #[error("malformed frame: need 4 header bytes, got {available}")]
    MalformedFrame { available: usize },

    /// The payload does not fit the 16-bit length field.
    #[error("payload of {len} bytes exceeds the 65535-byte frame limit")]
    PayloadTooLarge { len: usize },

    /// Serialization of a payload document failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// The payload bytes are not a valid document of the expected shape.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),
}

/// Errors for frames that are well-formed but out of place.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The type id is not one this client knows about.
    #[error("unknown message type {0}")]
    UnknownMessageType(u16),

    /// A known message arrived where a specific reply was required.
    #[error("unexpected {got} while waiting for {expected}")]
    UnexpectedMessage { expected: String, got: String },
}
