//! The session manager: the client's connection state machine.
//!
//! This is the central piece of the session layer. It decides:
//! - Which [`ConnectionState`] the client is in
//! - Whether an unexpected drop turns into a reconnect or a plain disconnect
//! - When the next reconnect attempt is due, and when to give up
//! - Which credential a reconnect attempt should present
//!
//! # No I/O here
//!
//! `SessionManager` never touches the network. The client opens the
//! transport, runs the handshake, and reports the outcome back through
//! [`connected`](SessionManager::connected),
//! [`attempt_failed`](SessionManager::attempt_failed) and friends. That keeps
//! every transition testable with nothing but a clock value.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::{
    ConnectionState, ReconnectConfig, ReconnectPolicy, ReconnectStep,
    ResumeCredential, Session, SessionError,
};

/// How the server's authentication acknowledgment should be reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    /// A fresh session was created.
    Authenticated,
    /// An earlier session was resumed with its server-side state.
    Resumed,
}

/// What happened after an unexpected disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropOutcome {
    /// Retrying after `delay`.
    Reconnecting { delay: Duration },
    /// Nothing to reconnect with, or automatic reconnection is off.
    Disconnected,
    /// The drop came after the last attempt was already spent.
    Exhausted,
}

/// Owns the connection state, the session identity, and the retry policy.
///
/// ## Lifecycle
///
/// ```text
/// begin_connect() ──→ connected() ──→ on_auth_ack()
///        │                                 │
///        ▼                                 ▼
/// connect_failed()              on_unexpected_disconnect()
///                                          │
///                                          ▼
///                              tick() ──→ attempt_failed() ──→ (exhausted)
///                                 │
///                                 ▼
///                          attempt_succeeded() ──→ on_auth_ack()
/// ```
#[derive(Debug)]
pub struct SessionManager {
    state: ConnectionState,
    session: Session,
    policy: ReconnectPolicy,
}

impl SessionManager {
    pub fn new(config: ReconnectConfig) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            session: Session::default(),
            policy: ReconnectPolicy::new(config),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Credential for the next HELLO: the reconnection token if held,
    /// otherwise the last credential passed to `authenticate`.
    pub fn resume_credential(&self) -> Option<ResumeCredential> {
        self.session.resume_credential()
    }

    pub fn remember_credential(&mut self, credential: impl Into<String>) {
        self.session.remember_credential(credential);
    }

    // -----------------------------------------------------------------------
    // Caller-initiated connect
    // -----------------------------------------------------------------------

    /// `Disconnected → Connecting`. Cancels any in-flight retry.
    pub fn begin_connect(&mut self) {
        self.policy.reset();
        self.state = ConnectionState::Connecting;
    }

    /// Transport open and handshake passed.
    pub fn connected(&mut self) {
        self.state = ConnectionState::Connected;
    }

    /// The caller's connect failed; nothing is retried.
    pub fn connect_failed(&mut self) {
        self.state = ConnectionState::Disconnected;
    }

    // -----------------------------------------------------------------------
    // Server acknowledgment
    // -----------------------------------------------------------------------

    /// Applies HELLO_ACK. Resets the attempt counter.
    pub fn on_auth_ack(
        &mut self,
        session_id: Option<String>,
        reconnect_token: Option<String>,
        resumed: bool,
    ) -> AuthOutcome {
        self.session.apply_ack(session_id, reconnect_token);
        self.policy.reset();

        info!(
            session_id = self.session.session_id.as_deref().unwrap_or("-"),
            resumed, "session acknowledged"
        );

        if resumed {
            AuthOutcome::Resumed
        } else {
            AuthOutcome::Authenticated
        }
    }

    // -----------------------------------------------------------------------
    // Drops and retries
    // -----------------------------------------------------------------------

    /// The transport dropped or the server sent DISCONNECT.
    pub fn on_unexpected_disconnect(&mut self) -> DropOutcome {
        let can_resume = self.session.resume_credential().is_some();
        if !self.policy.is_enabled() || !can_resume {
            debug!(
                enabled = self.policy.is_enabled(),
                can_resume, "not reconnecting"
            );
            self.state = ConnectionState::Disconnected;
            return DropOutcome::Disconnected;
        }

        if self.policy.is_exhausted() {
            warn!(attempts = self.policy.attempt(), "reconnect attempts exhausted");
            self.state = ConnectionState::Disconnected;
            return DropOutcome::Exhausted;
        }

        self.policy.arm();
        self.state = ConnectionState::Reconnecting;
        DropOutcome::Reconnecting {
            delay: self.policy.remaining(),
        }
    }

    /// Advances the retry countdown. Only does anything while
    /// [`ConnectionState::Reconnecting`].
    ///
    /// An `Exhausted` step also moves the state to `Disconnected`.
    pub fn tick(&mut self, elapsed: Duration) -> ReconnectStep {
        if self.state != ConnectionState::Reconnecting {
            return ReconnectStep::Wait;
        }
        let step = self.policy.tick(elapsed);
        if step == ReconnectStep::Exhausted {
            self.state = ConnectionState::Disconnected;
        }
        step
    }

    /// A reconnect attempt opened the transport and passed the handshake.
    /// The attempt counter stays until the server acknowledges the session.
    pub fn attempt_succeeded(&mut self) {
        self.state = ConnectionState::Connected;
    }

    /// A reconnect attempt failed. Returns `true` when it was the last one,
    /// in which case the state is now `Disconnected`.
    pub fn attempt_failed(&mut self) -> bool {
        if self.policy.is_exhausted() {
            warn!(attempts = self.policy.attempt(), "reconnect attempts exhausted");
            self.state = ConnectionState::Disconnected;
            true
        } else {
            debug!(
                attempt = self.policy.attempt(),
                next_in_ms = self.policy.remaining().as_millis() as u64,
                "reconnect attempt failed"
            );
            false
        }
    }

    /// Forces a retry on the next tick.
    ///
    /// # Errors
    /// - [`SessionError::AlreadyConnected`] while connected or connecting.
    /// - [`SessionError::NoResumeCredential`] with neither a token nor a
    ///   credential to present.
    pub fn manual_reconnect(&mut self) -> Result<(), SessionError> {
        if matches!(
            self.state,
            ConnectionState::Connected | ConnectionState::Connecting
        ) {
            return Err(SessionError::AlreadyConnected);
        }
        if self.session.resume_credential().is_none() {
            return Err(SessionError::NoResumeCredential);
        }

        info!("manual reconnect requested");
        self.policy.retry_now();
        self.state = ConnectionState::Reconnecting;
        Ok(())
    }

    /// Toggles automatic reconnection. Disabling it while a retry is pending
    /// cancels the retry and returns `true`.
    pub fn set_auto_reconnect(&mut self, enabled: bool) -> bool {
        self.policy.set_enabled(enabled);
        if !enabled && self.state == ConnectionState::Reconnecting {
            self.policy.reset();
            self.state = ConnectionState::Disconnected;
            return true;
        }
        false
    }

    /// Caller-initiated disconnect. Forgets the server-issued identity and
    /// any in-flight retry; the credential is kept.
    pub fn close(&mut self) {
        self.session.clear_server_identity();
        self.policy.reset();
        self.state = ConnectionState::Disconnected;
    }
}
