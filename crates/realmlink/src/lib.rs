//! # Realmlink
//!
//! Tick-driven network client for game-session servers.
//!
//! Realmlink speaks a small framed protocol over a reliable, ordered,
//! multi-channel transport. It handles the version handshake, session
//! authentication, message routing to callbacks, and reconnection with
//! exponential backoff and session resumption. The embedding application
//! only calls [`GameClient::update`] once per frame.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use realmlink::prelude::*;
//!
//! let mut client = GameClient::new(ClientConfig::default())?;
//! client.on_snapshot(|doc| println!("{doc}"));
//! client.on_disconnected(|reason| eprintln!("lost connection: {reason}"));
//!
//! client.connect("127.0.0.1", 7777)?;
//! client.authenticate("player-token");
//!
//! loop {
//!     client.update(Duration::from_millis(16));
//!     # break;
//! }
//! # Ok::<(), ClientError>(())
//! ```
//!
//! ## Crates
//!
//! ```text
//! realmlink            ← this crate: client, handshake, dispatcher, callbacks
//!   ├─ realmlink-session    ← connection state, session identity, backoff
//!   ├─ realmlink-protocol   ← frames, message types, payload codec
//!   └─ realmlink-transport  ← Transport trait, WebSocket and in-memory impls
//! ```

mod callbacks;
mod client;
mod config;
mod debug_log;
pub mod dispatcher;
mod error;
mod event;
pub mod handshake;

pub use callbacks::{CallbackRegistry, Handler};
pub use client::GameClient;
pub use config::ClientConfig;
pub use debug_log::{DebugLog, DebugLogLayer};
pub use error::{ClientError, HandshakeError};
pub use event::{ClientEvent, EventKind};

pub use realmlink_protocol as protocol;
pub use realmlink_session as session;
pub use realmlink_transport as transport;

/// Everything an embedding application usually needs.
pub mod prelude {
    pub use crate::{
        ClientConfig, ClientError, ClientEvent, DebugLog, EventKind, GameClient,
        HandshakeError,
    };
    pub use realmlink_session::{ConnectionState, ReconnectConfig};
    pub use realmlink_transport::{Transport, TransportConfig};
}
