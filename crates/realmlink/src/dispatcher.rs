//! Inbound frame routing.
//!
//! Every complete frame goes through [`handle_frame`], which classifies it as:
//! - a [`ClientEvent`] for the application (server-push types),
//! - a session signal the client state machine consumes itself
//!   (HELLO_ACK, DISCONNECT),
//! - or nothing (unknown or client-only types).
//!
//! A frame that fails to decode becomes an `Error` event; the connection is
//! not affected.

use realmlink_protocol::{Codec, Frame, FrameDecoder, MessageType};
use realmlink_transport::{ChannelId, MAX_CHANNELS};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, trace};

use crate::ClientEvent;

/// The server's answer to HELLO.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct HelloAck {
    pub session_id: Option<String>,
    pub reconnect_token: Option<String>,
    pub resumed: bool,
    pub resume_state: Value,
}

/// What a frame turned into.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    Event(ClientEvent),
    HelloAck(HelloAck),
    Disconnect { reason: String },
    Ignored,
}

/// Classifies and decodes one frame.
pub fn handle_frame<C: Codec>(codec: &C, frame: &Frame) -> Dispatch {
    let Ok(kind) = MessageType::try_from(frame.message_type) else {
        trace!(message_type = frame.message_type, "ignoring unknown message type");
        return Dispatch::Ignored;
    };

    let doc: Value = match codec.decode(&frame.payload) {
        Ok(doc) => doc,
        Err(e) => {
            debug!(%kind, error = %e, "dropping undecodable frame");
            return Dispatch::Event(ClientEvent::Error {
                message: format!("failed to decode {kind} payload: {e}"),
                payload: None,
            });
        }
    };

    use MessageType as M;
    let event = match kind {
        M::HelloAck => {
            return match serde_json::from_value(doc) {
                Ok(ack) => Dispatch::HelloAck(ack),
                Err(e) => Dispatch::Event(ClientEvent::Error {
                    message: format!("malformed HELLO_ACK: {e}"),
                    payload: None,
                }),
            };
        }
        M::Disconnect => {
            let reason = doc
                .get("reason")
                .and_then(Value::as_str)
                .unwrap_or("disconnected by server")
                .to_string();
            return Dispatch::Disconnect { reason };
        }

        M::RegionSnapshot => ClientEvent::Snapshot(doc),
        M::MoveState => ClientEvent::MoveState(doc),
        M::BattleStart => ClientEvent::BattleStart(doc),
        M::BattleState => ClientEvent::BattleState(doc),
        M::BattleResult => ClientEvent::BattleResult(doc),
        M::BattleLog => ClientEvent::BattleLog(doc),
        M::BattleEnd => ClientEvent::BattleEnd(doc),
        M::BattleIndicatorSpawn => ClientEvent::BattleIndicatorSpawn(doc),
        M::BattleIndicatorDespawn => ClientEvent::BattleIndicatorDespawn(doc),
        M::ReloadOk => ClientEvent::AdminReload(doc),
        M::AdminKick => ClientEvent::AdminKick(doc),
        M::AdminStatsResponse => ClientEvent::AdminStats(doc),
        M::AdminBroadcast => ClientEvent::AdminBroadcast(doc),
        M::ErrorMsg => ClientEvent::Error {
            message: error_message(&doc),
            payload: Some(doc),
        },

        M::VersionCheck | M::Hello | M::VersionMismatch | M::RegionEnter | M::RegionLeave
        | M::MoveInput | M::BattleLeave | M::BattleAction | M::AdminReload
        | M::AdminStatsRequest => {
            trace!(%kind, "ignoring client-only message type");
            return Dispatch::Ignored;
        }
    };
    Dispatch::Event(event)
}

/// Human-readable text of an ERROR_MSG document.
fn error_message(doc: &Value) -> String {
    match doc.get("message").and_then(Value::as_str) {
        Some(message) => message.to_string(),
        None => doc.to_string(),
    }
}

// ---------------------------------------------------------------------------
// ChannelDecoders
// ---------------------------------------------------------------------------

/// One [`FrameDecoder`] per transport channel.
///
/// Ordering holds within a channel only, so partial frames are reassembled
/// per channel.
#[derive(Debug, Default)]
pub struct ChannelDecoders {
    decoders: [FrameDecoder; MAX_CHANNELS as usize],
}

impl ChannelDecoders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffers `data` for `channel` and returns every frame it completed.
    pub fn feed(&mut self, channel: ChannelId, data: &[u8]) -> Vec<Frame> {
        let decoder = &mut self.decoders[channel.into_inner() as usize];
        decoder.extend(data);
        std::iter::from_fn(|| decoder.next_frame()).collect()
    }

    /// Drops partial frames on every channel. Called when a connection ends.
    pub fn clear(&mut self) {
        for decoder in &mut self.decoders {
            decoder.clear();
        }
    }
}
