//! Error types for the session layer.

/// Errors returned when a session transition is not allowed.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    /// A reconnect was requested but there is nothing to reconnect with:
    /// no reconnection token and no stored credential.
    #[error("no reconnection token or credential to reconnect with")]
    NoResumeCredential,

    /// A reconnect was requested while a connection is already up.
    #[error("already connected")]
    AlreadyConnected,
}
