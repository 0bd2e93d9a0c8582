//! Payload codec trait and implementations.
//!
//! The frame envelope only knows `(type, bytes)`. What those bytes mean is
//! decided by a [`Codec`]: every payload is one serialized structured document
//! (a map or array), and the envelope does not care how it was serialized as
//! long as encoding and decoding are symmetric.
//!
//! Currently we provide [`JsonCodec`]. A compact binary codec can be added
//! without touching the framing or the client.

use serde::{Serialize, de::DeserializeOwned};

use crate::{FrameError, MessageType, OutboundMessage, frame};

/// A codec that can encode Rust values to payload bytes and decode them back.
///
/// `Send + Sync + 'static` so a client holding a codec can be moved to
/// whichever thread the embedding application runs its tick on.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into payload bytes.
    ///
    /// # Errors
    /// Returns `FrameError::Encode` if the value cannot be represented.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, FrameError>;

    /// Deserializes payload bytes back into a value.
    ///
    /// # Errors
    /// Returns `FrameError::Decode` if the bytes are malformed, truncated,
    /// or don't match the expected shape.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, FrameError>;
}

/// Serializes `message` with `codec` and wraps it in a frame of its type.
///
/// Returns the message type alongside the frame so the caller can pick the
/// channel with [`MessageType::channel`].
pub fn encode_message<C: Codec, M: OutboundMessage>(
    codec: &C,
    message: &M,
) -> Result<(MessageType, Vec<u8>), FrameError> {
    let payload = codec.encode(message)?;
    let bytes = frame::encode(M::TYPE.id(), &payload)?;
    Ok((M::TYPE, bytes))
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// Behind the `json` feature flag (enabled by default).
///
/// ## Example
///
/// ```rust
/// use realmlink_protocol::{Codec, JsonCodec, RegionEnter};
///
/// let codec = JsonCodec;
/// let msg = RegionEnter { region_id: "harbor".into() };
///
/// let bytes = codec.encode(&msg).unwrap();
/// let decoded: RegionEnter = codec.decode(&bytes).unwrap();
/// assert_eq!(msg, decoded);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, FrameError> {
        serde_json::to_vec(value).map_err(FrameError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, FrameError> {
        serde_json::from_slice(data).map_err(FrameError::Decode)
    }
}
