use std::time::Duration;

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The host name could not be resolved to a socket address.
    #[error("failed to resolve {addr}: {reason}")]
    ResolveFailed { addr: String, reason: String },

    /// The remote peer refused or aborted the connection attempt.
    #[error("connection to {addr} refused: {reason}")]
    ConnectionRefused { addr: String, reason: String },

    /// No connect acknowledgment arrived within the connect timeout.
    #[error("connection to {addr} timed out after {timeout:?}")]
    ConnectTimeout { addr: String, timeout: Duration },

    /// The connection was closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// An operation needed an open connection and there was none.
    #[error("transport is not open")]
    NotOpen,

    /// The transport's internal I/O driver could not be created.
    #[error("transport runtime setup failed: {0}")]
    Runtime(#[source] std::io::Error),
}
