//! Transport abstraction layer for Realmlink.
//!
//! Provides the [`Transport`] trait: a reliable, ordered connection to one
//! remote endpoint carrying discrete datagrams on up to [`MAX_CHANNELS`]
//! independent ordering channels. Delivery is ordered within a channel only;
//! datagrams on different channels may interleave arbitrarily.
//!
//! The trait is synchronous on purpose. The client above it is driven by a
//! caller-owned tick, so every operation either returns immediately or blocks
//! for a bounded time (`open` and `close`).
//!
//! # Implementations
//!
//! - [`WebSocketTransport`] (feature `websocket`, default): one binary
//!   WebSocket message per datagram, channel id in the first byte.
//! - [`MemoryTransport`]: in-process loopback paired with a [`MemoryPeer`]
//!   that plays the server.

mod error;
mod memory;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use memory::{MemoryPeer, MemoryTransport};
#[cfg(feature = "websocket")]
pub use websocket::WebSocketTransport;

use std::fmt;
use std::time::Duration;

use serde::Deserialize;

/// Number of independent ordering channels a connection offers.
pub const MAX_CHANNELS: u8 = 4;

/// One ordering lane within a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(u8);

impl ChannelId {
    /// Creates a `ChannelId`, or `None` if `id` is not below [`MAX_CHANNELS`].
    pub fn new(id: u8) -> Option<Self> {
        (id < MAX_CHANNELS).then_some(Self(id))
    }

    /// Returns the underlying channel number.
    pub fn into_inner(self) -> u8 {
        self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch-{}", self.0)
    }
}

/// Something that happened on the connection since the previous poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A complete datagram arrived on `channel`.
    Received { channel: ChannelId, data: Vec<u8> },

    /// The connection went away without the local side asking for it.
    /// The transport is no longer open once this is reported.
    Disconnected { reason: String },
}

/// Timeouts for the two blocking transport operations.
///
/// Stored as milliseconds so the struct deserializes from plain JSON numbers.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// How long `open` waits for the connection to be acknowledged.
    /// Default: 5000 ms.
    pub connect_timeout_ms: u64,

    /// How long `close` waits for the peer to acknowledge a graceful
    /// disconnect before the connection is dropped anyway.
    /// Default: 3000 ms.
    pub close_timeout_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 5_000,
            close_timeout_ms: 3_000,
        }
    }
}

impl TransportConfig {
    /// Connect timeout as a `Duration`.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Close timeout as a `Duration`.
    pub fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout_ms)
    }
}

/// A client-side connection to a single remote endpoint.
///
/// Implementations never retry on their own. Resolution failures, refusals,
/// and mid-session drops are reported through `open`'s error or a
/// [`TransportEvent::Disconnected`] from `poll`; retrying is the caller's job.
pub trait Transport {
    /// Resolves `host`, connects, and blocks until the connection is
    /// acknowledged or the connect timeout elapses.
    ///
    /// On error nothing is left half-open. Opening an already open transport
    /// closes the old connection first.
    fn open(&mut self, host: &str, port: u16) -> Result<(), TransportError>;

    /// Gracefully disconnects, waiting at most the close timeout for the peer,
    /// then releases the connection unconditionally. No-op when not open.
    fn close(&mut self);

    /// Queues `data` for reliable, ordered delivery on `channel`.
    ///
    /// Fire and forget: failures (including "not open") are logged, not
    /// returned. A write failure shows up as a `Disconnected` event on the
    /// next poll.
    fn send(&mut self, channel: ChannelId, data: &[u8]);

    /// Drains everything that arrived since the previous call without
    /// blocking. Must be called on every client tick.
    fn poll(&mut self) -> Vec<TransportEvent>;

    /// Whether a connection is currently open.
    fn is_open(&self) -> bool;
}
