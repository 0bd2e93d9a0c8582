//! Session types: the client's record of who it is to the server.
//!
//! A session tracks:
//! - WHICH server-side session this connection belongs to (`session_id`)
//! - HOW to resume it after a drop (`reconnect_token`)
//! - WHAT credential to fall back on if resumption is not possible
//!   (`last_credential`)

use std::fmt;

// ---------------------------------------------------------------------------
// ConnectionState
// ---------------------------------------------------------------------------

/// Lifecycle of the client's connection.
///
/// ```text
///   Disconnected ──(connect)──→ Connecting ──(handshake ok)──→ Connected
///        ↑                           │                            │
///        └────(failure / close)──────┘                 (unexpected drop)
///        ↑                                                        ▼
///        └───────(attempts exhausted / close)──────────── Reconnecting
///                                                                 │
///                             Connected ←──(attempt succeeds)─────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// ResumeCredential
// ---------------------------------------------------------------------------

/// What a reconnect attempt authenticates with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeCredential {
    /// The server-issued reconnection token. Resumes server-side state.
    Token(String),
    /// The credential last passed to `authenticate`. Starts a fresh session.
    Credential(String),
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// The client's session identity.
///
/// `session_id` and `reconnect_token` are filled in from the server's
/// post-authentication acknowledgment and replaced whenever it sends new
/// values. `last_credential` survives reconnect attempts so the client can
/// re-authenticate without asking the caller again.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub session_id: Option<String>,
    pub reconnect_token: Option<String>,
    pub last_credential: Option<String>,
}

impl Session {
    /// Whether the server has acknowledged this session.
    pub fn is_established(&self) -> bool {
        self.session_id.is_some()
    }

    /// Records the credential the caller authenticated with.
    pub fn remember_credential(&mut self, credential: impl Into<String>) {
        self.last_credential = Some(credential.into()).filter(|c| !c.is_empty());
    }

    /// Applies the server's acknowledgment. Absent or empty values keep
    /// whatever was held before.
    pub fn apply_ack(
        &mut self,
        session_id: Option<String>,
        reconnect_token: Option<String>,
    ) {
        if let Some(id) = session_id.filter(|s| !s.is_empty()) {
            self.session_id = Some(id);
        }
        if let Some(token) = reconnect_token.filter(|t| !t.is_empty()) {
            self.reconnect_token = Some(token);
        }
    }

    /// The best credential for a reconnect: the token if there is one,
    /// otherwise the last credential.
    pub fn resume_credential(&self) -> Option<ResumeCredential> {
        self.reconnect_token
            .clone()
            .map(ResumeCredential::Token)
            .or_else(|| {
                self.last_credential
                    .clone()
                    .map(ResumeCredential::Credential)
            })
    }

    /// Forgets the server-issued identity. The credential is kept.
    pub fn clear_server_identity(&mut self) {
        self.session_id = None;
        self.reconnect_token = None;
    }
}
