//! Client configuration.
//!
//! Every knob has a default, so `ClientConfig::default()` is a working
//! configuration. The struct also deserializes from JSON with missing fields
//! filled in from the defaults:
//!
//! ```rust
//! use realmlink::ClientConfig;
//!
//! let config: ClientConfig = serde_json::from_str(
//!     r#"{ "client_version": "2.1.0", "reconnect": { "max_attempts": 5 } }"#,
//! ).unwrap();
//! assert_eq!(config.reconnect.max_attempts, 5);
//! assert_eq!(config.handshake_timeout_ms, 3_000);
//! ```

use std::time::Duration;

use realmlink_session::ReconnectConfig;
use realmlink_transport::TransportConfig;
use serde::Deserialize;
use tracing::warn;

/// Configuration for a [`GameClient`](crate::GameClient).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Semantic version sent in VERSION_CHECK.
    pub client_version: String,

    /// How long the version handshake may take before `connect` fails.
    /// Default: 3000 ms.
    pub handshake_timeout_ms: u64,

    /// Sleep between transport polls while waiting for the handshake reply.
    /// Default: 10 ms.
    pub handshake_poll_interval_ms: u64,

    pub transport: TransportConfig,

    pub reconnect: ReconnectConfig,

    /// Lines kept by the in-memory debug log. Default: 128.
    pub debug_log_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_version: env!("CARGO_PKG_VERSION").to_string(),
            handshake_timeout_ms: 3_000,
            handshake_poll_interval_ms: 10,
            transport: TransportConfig::default(),
            reconnect: ReconnectConfig::default(),
            debug_log_capacity: 128,
        }
    }
}

impl ClientConfig {
    /// Clamp values that would make the client misbehave.
    ///
    /// - `handshake_poll_interval_ms` at least 1 and at most the timeout.
    /// - `debug_log_capacity` at least 1.
    /// - `reconnect` passed through [`ReconnectConfig::validated`].
    pub fn validated(mut self) -> Self {
        if self.handshake_poll_interval_ms == 0 {
            warn!("handshake_poll_interval_ms is 0, using 1");
            self.handshake_poll_interval_ms = 1;
        }
        if self.handshake_timeout_ms > 0
            && self.handshake_poll_interval_ms > self.handshake_timeout_ms
        {
            self.handshake_poll_interval_ms = self.handshake_timeout_ms;
        }
        if self.debug_log_capacity == 0 {
            self.debug_log_capacity = 1;
        }
        self.reconnect = self.reconnect.validated();
        self
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn handshake_poll_interval(&self) -> Duration {
        Duration::from_millis(self.handshake_poll_interval_ms)
    }
}
