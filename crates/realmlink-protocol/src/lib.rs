//! Wire protocol for Realmlink.
//!
//! This crate defines the "language" the client and the game-session server
//! speak:
//!
//! - **Frames** ([`frame::encode`], [`frame::decode_header`],
//!   [`FrameDecoder`]): the 4-byte envelope around every message.
//! - **Types** ([`MessageType`], [`Channel`], payload structs): which
//!   messages exist, which channel each one rides on, and their shapes.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how payload documents are
//!   converted to and from bytes.
//! - **Errors** ([`FrameError`], [`ProtocolError`]).
//!
//! # Architecture
//!
//! ```text
//! Transport (datagrams per channel) → Protocol (frames, documents) → Client (events)
//! ```

mod codec;
mod error;
pub mod frame;
mod types;

pub use codec::{Codec, encode_message};
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::{FrameError, ProtocolError};
pub use frame::{Frame, FrameDecoder, FrameHeader, HEADER_LEN, MAX_PAYLOAD_LEN};
pub use types::{
    AdminBroadcast, AdminKick, AdminReload, AdminStatsRequest, BattleAction,
    BattleLeave, Channel, Hello, MessageType, MoveInput, OutboundMessage,
    RegionEnter, RegionLeave, VersionCheck, VersionCheckReply, VersionMismatch,
};
