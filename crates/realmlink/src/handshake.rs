//! The version handshake.
//!
//! Right after the transport opens, the client sends VERSION_CHECK on the
//! control channel and waits, blocking, for the server's verdict:
//!
//! ```text
//!   Idle ──(send VERSION_CHECK)──→ AwaitingVersionResponse
//!                                     │
//!        ┌──────────────┬─────────────┼──────────────┐
//!        ▼              ▼             ▼              ▼
//!    VersionOk   VersionRejected  VersionTimeout   Aborted
//! ```
//!
//! This is one of the two places the client blocks (the other is the
//! transport's connect). The wait is a plain loop: poll the transport, sleep
//! a short slice, check a monotonic deadline.

use std::thread;
use std::time::{Duration, Instant};

use realmlink_protocol::{
    Codec, Frame, MessageType, ProtocolError, VersionCheck, VersionCheckReply,
    VersionMismatch, encode_message,
};
use realmlink_transport::{Transport, TransportEvent};
use tracing::{debug, info, warn};

use crate::dispatcher::ChannelDecoders;
use crate::{ClientError, HandshakeError};

/// Where the handshake is.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum HandshakeState {
    #[default]
    Idle,
    AwaitingVersionResponse,
    VersionOk {
        server_version: Option<String>,
    },
    VersionRejected {
        server_version: String,
        client_version: String,
    },
    VersionTimeout,
    /// The transport dropped mid-handshake.
    Aborted {
        reason: String,
    },
}

/// Runs VERSION_CHECK against a freshly opened transport.
#[derive(Debug, Clone)]
pub struct HandshakeController {
    client_version: String,
    timeout: Duration,
    poll_interval: Duration,
    state: HandshakeState,
}

impl HandshakeController {
    pub fn new(
        client_version: impl Into<String>,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            client_version: client_version.into(),
            timeout,
            poll_interval,
            state: HandshakeState::Idle,
        }
    }

    pub fn state(&self) -> &HandshakeState {
        &self.state
    }

    pub fn client_version(&self) -> &str {
        &self.client_version
    }

    /// Sends VERSION_CHECK and blocks until the server answers, the
    /// transport drops, or the timeout elapses.
    ///
    /// Frames of any other type received meanwhile are dropped. Returns the
    /// server's version, if it reported one.
    ///
    /// # Errors
    /// - [`HandshakeError::Rejected`] on a non-ok reply or VERSION_MISMATCH.
    /// - [`HandshakeError::Timeout`] when no verdict arrives in time.
    /// - [`HandshakeError::Aborted`] when the transport drops.
    /// - [`ClientError::Frame`] if VERSION_CHECK cannot be encoded.
    pub fn run<T: Transport, C: Codec>(
        &mut self,
        transport: &mut T,
        codec: &C,
        decoders: &mut ChannelDecoders,
    ) -> Result<Option<String>, ClientError> {
        let request = VersionCheck {
            version: self.client_version.clone(),
        };
        let (kind, bytes) = encode_message(codec, &request)?;
        transport.send(kind.channel().id(), &bytes);
        self.state = HandshakeState::AwaitingVersionResponse;
        debug!(version = %self.client_version, "version check sent");

        let deadline = Instant::now() + self.timeout;
        loop {
            // The whole batch is consumed even after a verdict so a drop
            // queued behind the reply is not lost.
            let mut verdict = None;
            for event in transport.poll() {
                match event {
                    TransportEvent::Received { channel, data } => {
                        for frame in decoders.feed(channel, &data) {
                            if verdict.is_some() {
                                debug!(
                                    kind = frame.message_type,
                                    "dropping frame after version verdict"
                                );
                                continue;
                            }
                            verdict = self.on_frame(codec, &frame);
                        }
                    }
                    TransportEvent::Disconnected { reason } => {
                        if matches!(verdict, Some(Err(_))) {
                            continue;
                        }
                        return Err(self.abort(reason).into());
                    }
                }
            }

            if let Some(verdict) = verdict {
                if verdict.is_ok() && !transport.is_open() {
                    let reason = "connection closed after version check".to_string();
                    return Err(self.abort(reason).into());
                }
                return verdict.map_err(ClientError::from);
            }

            let now = Instant::now();
            if now >= deadline {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "version check timed out");
                self.state = HandshakeState::VersionTimeout;
                return Err(HandshakeError::Timeout(self.timeout).into());
            }
            thread::sleep(self.poll_interval.min(deadline - now));
        }
    }

    /// Returns a verdict for VERSION_CHECK / VERSION_MISMATCH frames and
    /// `None` for anything else.
    fn on_frame<C: Codec>(
        &mut self,
        codec: &C,
        frame: &Frame,
    ) -> Option<Result<Option<String>, HandshakeError>> {
        match MessageType::try_from(frame.message_type) {
            Ok(MessageType::VersionCheck) => {
                let reply: VersionCheckReply = match codec.decode(&frame.payload) {
                    Ok(reply) => reply,
                    Err(e) => {
                        debug!(error = %e, "dropping malformed version reply");
                        return None;
                    }
                };
                if reply.is_ok() {
                    info!(
                        server_version = reply.server_version.as_deref().unwrap_or("unknown"),
                        "version accepted"
                    );
                    self.state = HandshakeState::VersionOk {
                        server_version: reply.server_version.clone(),
                    };
                    Some(Ok(reply.server_version))
                } else {
                    Some(Err(self.reject(reply.server_version)))
                }
            }
            Ok(MessageType::VersionMismatch) => {
                let mismatch: VersionMismatch =
                    codec.decode(&frame.payload).unwrap_or_default();
                Some(Err(self.reject(mismatch.server_version)))
            }
            Ok(other) => {
                let err = ProtocolError::UnexpectedMessage {
                    expected: MessageType::VersionCheck.name().to_string(),
                    got: other.name().to_string(),
                };
                debug!(error = %err, "dropping frame during handshake");
                None
            }
            Err(err) => {
                debug!(error = %err, "dropping frame during handshake");
                None
            }
        }
    }

    fn abort(&mut self, reason: String) -> HandshakeError {
        warn!(%reason, "connection lost during handshake");
        self.state = HandshakeState::Aborted {
            reason: reason.clone(),
        };
        HandshakeError::Aborted(reason)
    }

    fn reject(&mut self, server_version: Option<String>) -> HandshakeError {
        let server_version = server_version.unwrap_or_else(|| "unknown".to_string());
        warn!(
            %server_version,
            client_version = %self.client_version,
            "version rejected by server"
        );
        self.state = HandshakeState::VersionRejected {
            server_version: server_version.clone(),
            client_version: self.client_version.clone(),
        };
        HandshakeError::Rejected {
            server_version,
            client_version: self.client_version.clone(),
        }
    }
}
