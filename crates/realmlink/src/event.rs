//! Events the client reports to the embedding application.
//!
//! Gameplay payloads are opaque to the client: they are handed over as the
//! parsed [`serde_json::Value`] document without being examined.

use std::fmt;
use std::time::Duration;

use serde_json::Value;

/// Something the application may want to react to.
///
/// Produced during [`GameClient::update`](crate::GameClient::update) and
/// handed to the handler registered for its [`EventKind`].
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// REGION_SNAPSHOT.
    Snapshot(Value),
    /// MOVE_STATE.
    MoveState(Value),

    BattleStart(Value),
    BattleState(Value),
    BattleResult(Value),
    BattleLog(Value),
    BattleEnd(Value),
    BattleIndicatorSpawn(Value),
    BattleIndicatorDespawn(Value),

    /// A server ERROR_MSG, or a local diagnostic for a frame that could not
    /// be decoded. `payload` is the server's document when there is one.
    Error {
        message: String,
        payload: Option<Value>,
    },

    /// The connection went away without the caller asking for it.
    Disconnected { reason: String },
    /// A reconnect attempt is starting. `delay` is the wait before the next
    /// attempt should this one fail.
    Reconnecting { attempt: u32, delay: Duration },
    /// The server resumed the previous session.
    Reconnected { resume_state: Value },
    /// Every reconnect attempt failed. The client is now disconnected.
    ReconnectFailed { attempts: u32 },
    /// The server acknowledged a fresh session.
    Authenticated { session_id: Option<String> },

    /// RELOAD_OK.
    AdminReload(Value),
    /// ADMIN_KICK.
    AdminKick(Value),
    /// ADMIN_STATS_RESPONSE.
    AdminStats(Value),
    /// ADMIN_BROADCAST.
    AdminBroadcast(Value),
}

impl ClientEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ClientEvent::Snapshot(_) => EventKind::Snapshot,
            ClientEvent::MoveState(_) => EventKind::MoveState,
            ClientEvent::BattleStart(_) => EventKind::BattleStart,
            ClientEvent::BattleState(_) => EventKind::BattleState,
            ClientEvent::BattleResult(_) => EventKind::BattleResult,
            ClientEvent::BattleLog(_) => EventKind::BattleLog,
            ClientEvent::BattleEnd(_) => EventKind::BattleEnd,
            ClientEvent::BattleIndicatorSpawn(_) => EventKind::BattleIndicatorSpawn,
            ClientEvent::BattleIndicatorDespawn(_) => EventKind::BattleIndicatorDespawn,
            ClientEvent::Error { .. } => EventKind::Error,
            ClientEvent::Disconnected { .. } => EventKind::Disconnected,
            ClientEvent::Reconnecting { .. } => EventKind::Reconnecting,
            ClientEvent::Reconnected { .. } => EventKind::Reconnected,
            ClientEvent::ReconnectFailed { .. } => EventKind::ReconnectFailed,
            ClientEvent::Authenticated { .. } => EventKind::Authenticated,
            ClientEvent::AdminReload(_) => EventKind::AdminReload,
            ClientEvent::AdminKick(_) => EventKind::AdminKick,
            ClientEvent::AdminStats(_) => EventKind::AdminStats,
            ClientEvent::AdminBroadcast(_) => EventKind::AdminBroadcast,
        }
    }
}

/// Name of an event slot. At most one handler is registered per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Snapshot,
    MoveState,
    BattleStart,
    BattleState,
    BattleResult,
    BattleLog,
    BattleEnd,
    BattleIndicatorSpawn,
    BattleIndicatorDespawn,
    Error,
    Disconnected,
    Reconnecting,
    Reconnected,
    ReconnectFailed,
    Authenticated,
    AdminReload,
    AdminKick,
    AdminStats,
    AdminBroadcast,
}

impl EventKind {
    pub const ALL: [EventKind; 19] = [
        EventKind::Snapshot,
        EventKind::MoveState,
        EventKind::BattleStart,
        EventKind::BattleState,
        EventKind::BattleResult,
        EventKind::BattleLog,
        EventKind::BattleEnd,
        EventKind::BattleIndicatorSpawn,
        EventKind::BattleIndicatorDespawn,
        EventKind::Error,
        EventKind::Disconnected,
        EventKind::Reconnecting,
        EventKind::Reconnected,
        EventKind::ReconnectFailed,
        EventKind::Authenticated,
        EventKind::AdminReload,
        EventKind::AdminKick,
        EventKind::AdminStats,
        EventKind::AdminBroadcast,
    ];

    /// Snake-case name, as used by embedders that expose events as signals.
    pub fn name(self) -> &'static str {
        match self {
            EventKind::Snapshot => "snapshot",
            EventKind::MoveState => "move_state",
            EventKind::BattleStart => "battle_start",
            EventKind::BattleState => "battle_state",
            EventKind::BattleResult => "battle_result",
            EventKind::BattleLog => "battle_log",
            EventKind::BattleEnd => "battle_end",
            EventKind::BattleIndicatorSpawn => "battle_indicator_spawn",
            EventKind::BattleIndicatorDespawn => "battle_indicator_despawn",
            EventKind::Error => "error",
            EventKind::Disconnected => "disconnected",
            EventKind::Reconnecting => "reconnecting",
            EventKind::Reconnected => "reconnected",
            EventKind::ReconnectFailed => "reconnect_failed",
            EventKind::Authenticated => "authenticated",
            EventKind::AdminReload => "admin_reload",
            EventKind::AdminKick => "admin_kick",
            EventKind::AdminStats => "admin_stats",
            EventKind::AdminBroadcast => "admin_broadcast",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
