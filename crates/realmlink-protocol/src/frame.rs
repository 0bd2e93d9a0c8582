//! Frame envelope: a 4-byte little-endian header followed by the payload.
//!
//! ```text
//! bytes 0-1: message type   (u16, LE)
//! bytes 2-3: payload length (u16, LE)
//! bytes 4..: payload
//! ```
//!
//! No checksum and no compression; integrity is the transport's job.

use crate::FrameError;

/// Size of the fixed frame header in bytes.
pub const HEADER_LEN: usize = 4;

/// Largest payload a frame can carry.
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize;

/// One complete protocol message.
///
/// The type is kept as the raw id so frames of types this client does not
/// know can still be carried and ignored by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub message_type: u16,
    pub payload: Vec<u8>,
}

/// The decoded 4-byte header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub message_type: u16,
    pub payload_len: u16,
}

impl FrameHeader {
    /// Total size of the frame this header describes.
    pub fn frame_len(&self) -> usize {
        HEADER_LEN + self.payload_len as usize
    }
}

/// Encodes a frame: exactly `4 + payload.len()` bytes.
///
/// # Errors
/// [`FrameError::PayloadTooLarge`] if the payload exceeds 65535 bytes.
pub fn encode(message_type: u16, payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    let len = u16::try_from(payload.len())
        .map_err(|_| FrameError::PayloadTooLarge { len: payload.len() })?;

    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(&message_type.to_le_bytes());
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(payload);
    Ok(out)
}

/// Reads the header from the start of `buffer`.
///
/// Does not check that the payload is present; see [`FrameHeader::frame_len`].
///
/// # Errors
/// [`FrameError::MalformedFrame`] if fewer than 4 bytes are available.
pub fn decode_header(buffer: &[u8]) -> Result<FrameHeader, FrameError> {
    match buffer {
        [t0, t1, l0, l1, ..] => Ok(FrameHeader {
            message_type: u16::from_le_bytes([*t0, *t1]),
            payload_len: u16::from_le_bytes([*l0, *l1]),
        }),
        _ => Err(FrameError::MalformedFrame {
            available: buffer.len(),
        }),
    }
}

/// Reassembles frames from a byte stream delivered in arbitrary chunks.
///
/// Bytes go in with [`extend`](Self::extend); whole frames come out of
/// [`next_frame`](Self::next_frame). A frame is only returned once all of its
/// `4 + payload_len` bytes are buffered, so partial data never escapes.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends received bytes.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Pops the next complete frame, or `None` if more bytes are needed.
    pub fn next_frame(&mut self) -> Option<Frame> {
        let header = decode_header(&self.buffer).ok()?;
        let frame_len = header.frame_len();
        if self.buffer.len() < frame_len {
            return None;
        }

        let payload = self.buffer[HEADER_LEN..frame_len].to_vec();
        self.buffer.drain(..frame_len);
        Some(Frame {
            message_type: header.message_type,
            payload,
        })
    }

    /// Number of buffered bytes not yet returned as a frame.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Discards any buffered partial frame.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_layout_is_little_endian() {
        let bytes = encode(0x0102, &[9, 8, 7]).unwrap();
        assert_eq!(bytes, vec![0x02, 0x01, 3, 0, 9, 8, 7]);
    }

    #[test]
    fn test_encode_empty_payload_is_header_only() {
        let bytes = encode(200, &[]).unwrap();
        assert_eq!(bytes.len(), HEADER_LEN);
        assert_eq!(
            decode_header(&bytes).unwrap(),
            FrameHeader {
                message_type: 200,
                payload_len: 0
            }
        );
    }

    #[test]
    fn test_encode_oversized_payload_is_rejected() {
        let payload = vec![0u8; MAX_PAYLOAD_LEN + 1];
        let result = encode(1, &payload);
        assert!(matches!(
            result,
            Err(FrameError::PayloadTooLarge { len }) if len == MAX_PAYLOAD_LEN + 1
        ));
    }

    #[test]
    fn test_header_round_trip_over_type_and_length_extremes() {
        let lengths = [0usize, 1, 255, 256, 4096, MAX_PAYLOAD_LEN];
        let types = [0u16, 1, 0x00FF, 0x0100, 0x7FFF, u16::MAX];

        for &len in &lengths {
            let payload: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
            for &message_type in &types {
                let bytes = encode(message_type, &payload).unwrap();
                assert_eq!(bytes.len(), HEADER_LEN + len);

                let header = decode_header(&bytes).unwrap();
                assert_eq!(header.message_type, message_type);
                assert_eq!(header.payload_len as usize, len);
                assert_eq!(&bytes[HEADER_LEN..], payload.as_slice());
            }
        }
    }

    #[test]
    fn test_decode_header_short_buffer_is_malformed() {
        for available in 0..HEADER_LEN {
            let buf = vec![0u8; available];
            assert!(matches!(
                decode_header(&buf),
                Err(FrameError::MalformedFrame { available: a }) if a == available
            ));
        }
    }

    #[test]
    fn test_frame_decoder_byte_at_a_time_yields_only_when_complete() {
        let payload = br#"{"status":"ok","server_version":"1.4.0"}"#;
        let bytes = encode(0, payload).unwrap();
        let mut decoder = FrameDecoder::new();

        for (i, byte) in bytes.iter().enumerate() {
            decoder.extend(std::slice::from_ref(byte));
            if i + 1 < bytes.len() {
                assert!(
                    decoder.next_frame().is_none(),
                    "frame escaped after {} of {} bytes",
                    i + 1,
                    bytes.len()
                );
            }
        }

        assert_eq!(
            decoder.next_frame(),
            Some(Frame {
                message_type: 0,
                payload: payload.to_vec()
            })
        );
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_frame_decoder_splits_back_to_back_frames() {
        let mut stream = encode(20, b"[1]").unwrap();
        stream.extend(encode(23, b"[2,3]").unwrap());
        stream.extend(&encode(39, b"[4]").unwrap()[..3]); // partial third

        let mut decoder = FrameDecoder::new();
        decoder.extend(&stream);

        assert_eq!(decoder.next_frame().unwrap().message_type, 20);
        assert_eq!(decoder.next_frame().unwrap().payload, b"[2,3]".to_vec());
        assert!(decoder.next_frame().is_none());
        assert_eq!(decoder.pending(), 3);

        decoder.clear();
        assert_eq!(decoder.pending(), 0);
    }
}
