//! The game client: one connection to one game-session server.
//!
//! [`GameClient`] is tick-driven. The embedding application calls
//! [`update`](GameClient::update) once per frame; everything observable
//! (callbacks, state transitions, reconnect attempts) happens inside that
//! call. The only other blocking calls are [`connect`](GameClient::connect)
//! and a reconnect attempt, which wait for the transport (up to the connect
//! timeout) and the version handshake (up to the handshake timeout).
//!
//! ## Flow
//!
//! ```text
//! connect() ──→ open transport ──→ VERSION_CHECK ──→ Connected
//!                                                        │
//! authenticate() ──→ HELLO ──→ HELLO_ACK ──→ on_authenticated / on_reconnected
//!                                                        │
//! update() ──→ poll ──→ frames ──→ dispatcher ──→ callbacks
//!     │
//!     └──→ reconnect countdown ──→ open + handshake + HELLO(token)
//! ```

use std::time::Duration;

use realmlink_protocol::{
    AdminBroadcast, AdminKick, AdminReload, AdminStatsRequest, BattleAction,
    BattleLeave, Codec, Frame, Hello, JsonCodec, MoveInput, OutboundMessage,
    RegionEnter, RegionLeave, encode_message,
};
use realmlink_session::{
    AuthOutcome, ConnectionState, DropOutcome, ReconnectStep, ResumeCredential,
    SessionError, SessionManager,
};
use realmlink_transport::{Transport, TransportEvent, WebSocketTransport};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::callbacks::CallbackRegistry;
use crate::dispatcher::{self, ChannelDecoders, Dispatch, HelloAck};
use crate::handshake::HandshakeController;
use crate::{ClientConfig, ClientError, ClientEvent, DebugLog, EventKind};

/// Registers a handler for an event that carries a payload document.
macro_rules! on_document {
    ($(#[$attr:meta])* $method:ident => $variant:ident) => {
        $(#[$attr])*
        pub fn $method<F>(&mut self, mut handler: F)
        where
            F: FnMut(&Value) + Send + 'static,
        {
            self.callbacks.set(
                EventKind::$variant,
                Box::new(move |event| {
                    if let ClientEvent::$variant(doc) = event {
                        handler(doc);
                    }
                }),
            );
        }
    };
}

/// A client connection to a game-session server.
///
/// Generic over the transport so tests can run against
/// [`MemoryTransport`](realmlink_transport::MemoryTransport), and over the
/// payload codec. The defaults are WebSocket and JSON.
///
/// ## Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use realmlink::prelude::*;
///
/// let mut client = GameClient::new(ClientConfig::default())?;
/// client.on_snapshot(|doc| println!("snapshot: {doc}"));
/// client.on_authenticated(|session| println!("session {session:?}"));
///
/// client.connect("127.0.0.1", 7777)?;
/// client.authenticate("player-token");
/// client.enter_region("harbor");
///
/// loop {
///     client.update(Duration::from_millis(16));
///     std::thread::sleep(Duration::from_millis(16));
/// }
/// # Ok::<(), ClientError>(())
/// ```
pub struct GameClient<T: Transport = WebSocketTransport, C: Codec = JsonCodec> {
    config: ClientConfig,
    transport: T,
    codec: C,
    decoders: ChannelDecoders,
    session: SessionManager,
    callbacks: CallbackRegistry,
    debug_log: DebugLog,
    /// Last address passed to `connect`; reconnect attempts reuse it.
    endpoint: Option<(String, u16)>,
    /// Region the caller last entered and has not left.
    region: Option<String>,
    server_version: Option<String>,
}

impl GameClient<WebSocketTransport, JsonCodec> {
    /// Creates a client with the WebSocket transport and JSON payloads.
    ///
    /// # Errors
    /// Returns [`ClientError::Transport`] if the transport's I/O driver
    /// cannot be created.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let transport = WebSocketTransport::new(config.transport.clone())?;
        Ok(Self::with_transport(config, transport))
    }
}

impl<T: Transport> GameClient<T, JsonCodec> {
    /// Creates a client over a caller-supplied transport.
    pub fn with_transport(config: ClientConfig, transport: T) -> Self {
        Self::with_codec(config, transport, JsonCodec)
    }
}

impl<T: Transport, C: Codec> GameClient<T, C> {
    /// Creates a client over a caller-supplied transport and codec.
    pub fn with_codec(config: ClientConfig, transport: T, codec: C) -> Self {
        let config = config.validated();
        Self {
            session: SessionManager::new(config.reconnect.clone()),
            debug_log: DebugLog::new(config.debug_log_capacity),
            config,
            transport,
            codec,
            decoders: ChannelDecoders::new(),
            callbacks: CallbackRegistry::new(),
            endpoint: None,
            region: None,
            server_version: None,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        self.session.state()
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    /// Session id from the last HELLO_ACK.
    pub fn session_id(&self) -> Option<&str> {
        self.session.session().session_id.as_deref()
    }

    /// Version the server reported during the last handshake.
    pub fn server_version(&self) -> Option<&str> {
        self.server_version.as_deref()
    }

    pub fn current_region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    /// Reconnect attempts made since the session was last acknowledged.
    pub fn reconnect_attempt(&self) -> u32 {
        self.session.policy().attempt()
    }

    /// Handle to the client's debug log. Install
    /// [`DebugLog::layer`] in a subscriber to fill it.
    pub fn debug_log(&self) -> DebugLog {
        self.debug_log.clone()
    }

    // -----------------------------------------------------------------------
    // Connection lifecycle
    // -----------------------------------------------------------------------

    /// Opens a connection and runs the version handshake.
    ///
    /// Blocks for at most the connect timeout plus the handshake timeout. On
    /// failure nothing is left open and the state is `Disconnected`.
    ///
    /// # Errors
    /// - [`ClientError::Transport`] if the address does not resolve, the
    ///   server refuses, or the connect times out.
    /// - [`ClientError::Handshake`] if the server rejects the client version,
    ///   does not answer in time, or drops the connection.
    pub fn connect(&mut self, host: &str, port: u16) -> Result<(), ClientError> {
        if self.transport.is_open() {
            debug!("closing previous connection");
            self.transport.close();
        }
        self.session.begin_connect();
        self.endpoint = Some((host.to_string(), port));

        match self.open_and_handshake(host, port) {
            Ok(()) => {
                self.session.connected();
                info!(host, port, "connected");
                Ok(())
            }
            Err(e) => {
                self.session.connect_failed();
                warn!(host, port, error = %e, "connect failed");
                Err(e)
            }
        }
    }

    /// Closes the connection and forgets the session.
    ///
    /// Clears the session id, the reconnection token, the region and any
    /// pending reconnect. No `disconnected` callback fires. The credential
    /// is kept so [`manual_reconnect`](Self::manual_reconnect) still works.
    pub fn disconnect(&mut self) {
        if self.transport.is_open() {
            self.transport.close();
        }
        self.decoders.clear();
        self.session.close();
        self.region = None;
        info!("disconnected");
    }

    /// Sends HELLO with `credential` and remembers it for reconnects.
    pub fn authenticate(&mut self, credential: impl Into<String>) {
        let credential = credential.into();
        self.session.remember_credential(credential.clone());
        self.send(&Hello {
            token: Some(credential),
            reconnect_token: None,
        });
    }

    /// Enables or disables automatic reconnection. Disabling it while a
    /// reconnect is pending cancels it.
    pub fn set_auto_reconnect(&mut self, enabled: bool) {
        if self.session.set_auto_reconnect(enabled) {
            info!("pending reconnect cancelled");
        }
    }

    /// Retries on the next [`update`](Self::update), with the attempt
    /// counter reset. Works with automatic reconnection disabled.
    ///
    /// # Errors
    /// [`ClientError::Session`] while connected, or with neither a
    /// reconnection token nor a credential to present.
    pub fn manual_reconnect(&mut self) -> Result<(), ClientError> {
        self.session.manual_reconnect()?;
        Ok(())
    }

    /// Advances the client by one tick.
    ///
    /// Drains the transport, dispatches every complete frame to its
    /// callback, then advances the reconnect countdown by `elapsed`.
    pub fn update(&mut self, elapsed: Duration) {
        self.pump();
        self.drive_reconnect(elapsed);
    }

    // -----------------------------------------------------------------------
    // Gameplay and admin sends
    // -----------------------------------------------------------------------

    pub fn enter_region(&mut self, region_id: impl Into<String>) {
        let region_id = region_id.into();
        self.region = Some(region_id.clone());
        self.send(&RegionEnter { region_id });
    }

    pub fn leave_region(&mut self) {
        self.region = None;
        self.send(&RegionLeave {});
    }

    /// Sends the held-direction `bitmask` sampled over `dt` seconds.
    pub fn send_move(&mut self, bitmask: u32, dt: f32) {
        self.send(&MoveInput { bitmask, dt });
    }

    pub fn battle_action(
        &mut self,
        battle_id: impl Into<String>,
        action: impl Into<String>,
        target_id: Option<&str>,
    ) {
        self.send(&BattleAction {
            battle_id: battle_id.into(),
            action: action.into(),
            target_id: target_id.map(str::to_string),
        });
    }

    pub fn leave_battle(&mut self, battle_id: impl Into<String>) {
        self.send(&BattleLeave {
            battle_id: battle_id.into(),
        });
    }

    pub fn admin_reload(&mut self, scope: impl Into<String>) {
        self.send(&AdminReload {
            scope: scope.into(),
        });
    }

    pub fn admin_kick(&mut self, user: impl Into<String>, reason: Option<&str>) {
        self.send(&AdminKick {
            user: user.into(),
            reason: reason.map(str::to_string),
        });
    }

    pub fn admin_stats_request(&mut self) {
        self.send(&AdminStatsRequest {});
    }

    pub fn admin_broadcast(&mut self, message: impl Into<String>, is_alert: bool) {
        self.send(&AdminBroadcast {
            message: message.into(),
            is_alert,
        });
    }

    // -----------------------------------------------------------------------
    // Callback registration
    // -----------------------------------------------------------------------

    /// Installs `handler` for `kind`, replacing any previous one.
    pub fn on<F>(&mut self, kind: EventKind, handler: F)
    where
        F: FnMut(&ClientEvent) + Send + 'static,
    {
        self.callbacks.set(kind, Box::new(handler));
    }

    /// Removes the handler for `kind`. Returns whether one was registered.
    pub fn clear_callback(&mut self, kind: EventKind) -> bool {
        self.callbacks.clear(kind)
    }

    on_document!(
        /// REGION_SNAPSHOT.
        on_snapshot => Snapshot
    );
    on_document!(on_move_state => MoveState);
    on_document!(on_battle_start => BattleStart);
    on_document!(on_battle_state => BattleState);
    on_document!(on_battle_result => BattleResult);
    on_document!(on_battle_log => BattleLog);
    on_document!(on_battle_end => BattleEnd);
    on_document!(on_battle_indicator_spawn => BattleIndicatorSpawn);
    on_document!(on_battle_indicator_despawn => BattleIndicatorDespawn);
    on_document!(
        /// RELOAD_OK.
        on_admin_reload => AdminReload
    );
    on_document!(on_admin_kick => AdminKick);
    on_document!(
        /// ADMIN_STATS_RESPONSE.
        on_admin_stats => AdminStats
    );
    on_document!(on_admin_broadcast => AdminBroadcast);

    /// Server ERROR_MSG (with its document) or a local decode diagnostic
    /// (without one).
    pub fn on_error<F>(&mut self, mut handler: F)
    where
        F: FnMut(&str, Option<&Value>) + Send + 'static,
    {
        self.callbacks.set(
            EventKind::Error,
            Box::new(move |event| {
                if let ClientEvent::Error { message, payload } = event {
                    handler(message, payload.as_ref());
                }
            }),
        );
    }

    /// Unexpected disconnects only, with the reason.
    pub fn on_disconnected<F>(&mut self, mut handler: F)
    where
        F: FnMut(&str) + Send + 'static,
    {
        self.callbacks.set(
            EventKind::Disconnected,
            Box::new(move |event| {
                if let ClientEvent::Disconnected { reason } = event {
                    handler(reason);
                }
            }),
        );
    }

    /// Fires before each reconnect attempt with `(attempt, delay)`.
    pub fn on_reconnecting<F>(&mut self, mut handler: F)
    where
        F: FnMut(u32, Duration) + Send + 'static,
    {
        self.callbacks.set(
            EventKind::Reconnecting,
            Box::new(move |event| {
                if let ClientEvent::Reconnecting { attempt, delay } = event {
                    handler(*attempt, *delay);
                }
            }),
        );
    }

    /// The server resumed the session; receives its resume state.
    pub fn on_reconnected<F>(&mut self, mut handler: F)
    where
        F: FnMut(&Value) + Send + 'static,
    {
        self.callbacks.set(
            EventKind::Reconnected,
            Box::new(move |event| {
                if let ClientEvent::Reconnected { resume_state } = event {
                    handler(resume_state);
                }
            }),
        );
    }

    /// Every attempt failed; receives the number of attempts made.
    pub fn on_reconnect_failed<F>(&mut self, mut handler: F)
    where
        F: FnMut(u32) + Send + 'static,
    {
        self.callbacks.set(
            EventKind::ReconnectFailed,
            Box::new(move |event| {
                if let ClientEvent::ReconnectFailed { attempts } = event {
                    handler(*attempts);
                }
            }),
        );
    }

    /// A fresh session was acknowledged; receives its id.
    pub fn on_authenticated<F>(&mut self, mut handler: F)
    where
        F: FnMut(Option<&str>) + Send + 'static,
    {
        self.callbacks.set(
            EventKind::Authenticated,
            Box::new(move |event| {
                if let ClientEvent::Authenticated { session_id } = event {
                    handler(session_id.as_deref());
                }
            }),
        );
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Encodes and sends `message` on its channel. Dropped with a debug log
    /// when not connected.
    fn send<M: OutboundMessage>(&mut self, message: &M) {
        if !self.session.is_connected() || !self.transport.is_open() {
            debug!(kind = %M::TYPE, "not connected, message dropped");
            return;
        }
        match encode_message(&self.codec, message) {
            Ok((kind, bytes)) => self.transport.send(kind.channel().id(), &bytes),
            Err(e) => warn!(kind = %M::TYPE, error = %e, "failed to encode message"),
        }
    }

    /// Opens the transport and runs the handshake. Closes the transport
    /// again if the handshake fails.
    fn open_and_handshake(&mut self, host: &str, port: u16) -> Result<(), ClientError> {
        self.decoders.clear();
        self.transport.open(host, port)?;

        let mut handshake = HandshakeController::new(
            self.config.client_version.clone(),
            self.config.handshake_timeout(),
            self.config.handshake_poll_interval(),
        );
        match handshake.run(&mut self.transport, &self.codec, &mut self.decoders) {
            Ok(server_version) => {
                self.server_version = server_version;
                Ok(())
            }
            Err(e) => {
                self.transport.close();
                self.decoders.clear();
                Err(e)
            }
        }
    }

    /// Drains the transport and dispatches what arrived. Stops as soon as
    /// the connection is no longer up.
    fn pump(&mut self) {
        if !self.session.is_connected() {
            return;
        }
        for event in self.transport.poll() {
            if !self.session.is_connected() {
                break;
            }
            match event {
                TransportEvent::Received { channel, data } => {
                    for frame in self.decoders.feed(channel, &data) {
                        if !self.session.is_connected() {
                            break;
                        }
                        self.dispatch(&frame);
                    }
                }
                TransportEvent::Disconnected { reason } => {
                    self.connection_lost(reason);
                }
            }
        }
    }

    fn dispatch(&mut self, frame: &Frame) {
        match dispatcher::handle_frame(&self.codec, frame) {
            Dispatch::Event(event) => {
                self.callbacks.emit(&event);
            }
            Dispatch::HelloAck(ack) => self.on_hello_ack(ack),
            Dispatch::Disconnect { reason } => {
                info!(%reason, "server closed the session");
                self.transport.close();
                self.connection_lost(reason);
            }
            Dispatch::Ignored => {}
        }
    }

    fn on_hello_ack(&mut self, ack: HelloAck) {
        let outcome =
            self.session
                .on_auth_ack(ack.session_id, ack.reconnect_token, ack.resumed);
        match outcome {
            AuthOutcome::Resumed => {
                self.callbacks.emit(&ClientEvent::Reconnected {
                    resume_state: ack.resume_state,
                });
            }
            AuthOutcome::Authenticated => {
                // A fresh session has no region yet; rejoin the one we were in.
                if let Some(region_id) = self.region.clone() {
                    debug!(%region_id, "re-entering region");
                    self.send(&RegionEnter { region_id });
                }
                let session_id = self.session.session().session_id.clone();
                self.callbacks
                    .emit(&ClientEvent::Authenticated { session_id });
            }
        }
    }

    /// Reports an unexpected drop and lets the session manager decide
    /// whether to retry.
    fn connection_lost(&mut self, reason: String) {
        self.decoders.clear();
        warn!(%reason, "connection lost");
        self.callbacks.emit(&ClientEvent::Disconnected { reason });

        match self.session.on_unexpected_disconnect() {
            DropOutcome::Reconnecting { delay } => {
                info!(delay_ms = delay.as_millis() as u64, "reconnect scheduled");
            }
            DropOutcome::Disconnected => {}
            DropOutcome::Exhausted => self.reconnect_failed(),
        }
    }

    fn drive_reconnect(&mut self, elapsed: Duration) {
        match self.session.tick(elapsed) {
            ReconnectStep::Wait => {}
            ReconnectStep::Attempt { attempt, delay } => {
                info!(attempt, "reconnecting");
                self.callbacks
                    .emit(&ClientEvent::Reconnecting { attempt, delay });
                self.attempt_reconnect(attempt);
            }
            ReconnectStep::Exhausted => self.reconnect_failed(),
        }
    }

    /// One blocking reconnect attempt: open, handshake, HELLO.
    fn attempt_reconnect(&mut self, attempt: u32) {
        let result = match (self.endpoint.clone(), self.session.resume_credential()) {
            (Some((host, port)), Some(credential)) => self
                .open_and_handshake(&host, port)
                .map(|()| credential),
            _ => {
                warn!("nothing to reconnect to");
                Err(SessionError::NoResumeCredential.into())
            }
        };

        match result {
            Ok(credential) => {
                self.session.attempt_succeeded();
                info!(attempt, "reconnect attempt connected, resuming session");
                let hello = match credential {
                    ResumeCredential::Token(token) => Hello {
                        token: None,
                        reconnect_token: Some(token),
                    },
                    ResumeCredential::Credential(credential) => Hello {
                        token: Some(credential),
                        reconnect_token: None,
                    },
                };
                self.send(&hello);
            }
            Err(e) => {
                warn!(attempt, error = %e, "reconnect attempt failed");
                if self.session.attempt_failed() {
                    self.reconnect_failed();
                }
            }
        }
    }

    fn reconnect_failed(&mut self) {
        let attempts = self.session.policy().attempt();
        warn!(attempts, "giving up on reconnecting");
        self.callbacks
            .emit(&ClientEvent::ReconnectFailed { attempts });
    }
}
