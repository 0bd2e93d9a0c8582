//! Session identity and reconnection for Realmlink.
//!
//! This crate holds the client's connection lifecycle:
//!
//! 1. **State**: where the connection is ([`ConnectionState`])
//! 2. **Identity**: the server-issued session id and reconnection token
//!    ([`Session`])
//! 3. **Reconnection**: exponential backoff after unexpected drops
//!    ([`ReconnectPolicy`], configured by [`ReconnectConfig`])
//!
//! [`SessionManager`] ties the three together. It does no I/O: the client
//! drives the transport and reports outcomes back to it.
//!
//! # How it fits in the stack
//!
//! ```text
//! Client (above)        ← opens transports, fires callbacks
//!     ↕
//! Session (this crate)  ← decides state transitions and retry timing
//! ```

mod error;
mod manager;
mod policy;
mod session;

pub use error::SessionError;
pub use manager::{AuthOutcome, DropOutcome, SessionManager};
pub use policy::{ReconnectConfig, ReconnectPolicy, ReconnectStep};
pub use session::{ConnectionState, ResumeCredential, Session};
