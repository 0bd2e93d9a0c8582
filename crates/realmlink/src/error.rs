//! Unified error type for the Realmlink client.

use std::time::Duration;

use realmlink_protocol::{FrameError, ProtocolError};
use realmlink_session::SessionError;
use realmlink_transport::TransportError;

/// Why the version handshake did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandshakeError {
    /// The server does not accept this client version.
    #[error("version rejected (server {server_version}, client {client_version})")]
    Rejected {
        server_version: String,
        client_version: String,
    },

    /// No reply arrived before the handshake deadline.
    #[error("no version reply within {0:?}")]
    Timeout(Duration),

    /// The transport dropped while waiting for the reply.
    #[error("connection lost during handshake: {0}")]
    Aborted(String),
}

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `realmlink` crate, you deal with this single error type
/// instead of importing errors from each sub-crate. The `#[from]` attribute
/// on each variant auto-generates `From` impls, so the `?` operator converts
/// sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Opening the connection failed (resolve, refusal, timeout).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A frame could not be built or read.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// A frame arrived that makes no sense where it did.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session transition was not allowed.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The version handshake failed.
    #[error(transparent)]
    Handshake(#[from] HandshakeError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let client_err: ClientError = err.into();
        assert!(matches!(client_err, ClientError::Transport(_)));
        assert!(client_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::UnknownMessageType(77);
        let client_err: ClientError = err.into();
        assert!(matches!(client_err, ClientError::Protocol(_)));
        assert!(client_err.to_string().contains("77"));
    }

    #[test]
    fn test_from_session_error() {
        let client_err: ClientError = SessionError::NoResumeCredential.into();
        assert!(matches!(client_err, ClientError::Session(_)));
    }

    #[test]
    fn test_from_handshake_error_shows_both_versions() {
        let err = HandshakeError::Rejected {
            server_version: "2.0.0".into(),
            client_version: "1.4.2".into(),
        };
        let client_err: ClientError = err.into();
        let msg = client_err.to_string();
        assert!(msg.contains("2.0.0"));
        assert!(msg.contains("1.4.2"));
    }
}
