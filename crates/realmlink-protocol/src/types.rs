//! Message identifiers, channel assignment, and outbound payload shapes.
//!
//! Type ids are protocol contract: they must match the server exactly. Every
//! message type travels on exactly one [`Channel`], fixed by the type.

use std::fmt;

use realmlink_transport::ChannelId;
use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Channel: logical purpose of an ordering lane
// ---------------------------------------------------------------------------

/// Logical channel a message is sent on.
///
/// Ordering is guaranteed within a channel only, so unrelated traffic
/// (movement snapshots vs. battle turns) never waits behind each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Handshake, authentication, admin, disconnect, and error traffic.
    Control,
    /// Movement input and region snapshots.
    Region,
    /// Battle actions, state, log, and end.
    Battle,
    /// Reserved. Nothing outbound uses it today.
    Notifications,
}

impl Channel {
    /// All channels, in transport-id order.
    pub const ALL: [Channel; 4] = [
        Channel::Control,
        Channel::Region,
        Channel::Battle,
        Channel::Notifications,
    ];

    /// The transport channel this logical channel maps to.
    pub fn id(self) -> ChannelId {
        let raw = match self {
            Channel::Control => 0,
            Channel::Region => 1,
            Channel::Battle => 2,
            Channel::Notifications => 3,
        };
        // All four ids are below MAX_CHANNELS.
        ChannelId::new(raw).unwrap_or_else(|| unreachable!("channel id {raw} out of range"))
    }

    /// The logical channel for a transport channel id.
    pub fn from_id(id: ChannelId) -> Channel {
        Self::ALL[id.into_inner() as usize]
    }
}

// ---------------------------------------------------------------------------
// MessageType
// ---------------------------------------------------------------------------

/// Every message type id the client knows.
///
/// Frames carry the raw `u16`; use `MessageType::try_from(raw)` to classify
/// one. Unknown ids are not an error for the client as a whole: servers may
/// add types, and older clients ignore them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum MessageType {
    VersionCheck = 0,
    Hello = 1,
    HelloAck = 2,
    Disconnect = 3,
    VersionMismatch = 4,

    RegionEnter = 10,
    RegionLeave = 11,
    MoveInput = 12,
    RegionSnapshot = 20,
    MoveState = 23,

    BattleIndicatorSpawn = 30,
    BattleIndicatorDespawn = 31,
    BattleLeave = 33,
    BattleStart = 34,
    BattleState = 35,
    BattleAction = 36,
    BattleResult = 37,
    BattleEnd = 38,
    BattleLog = 39,

    AdminReload = 100,
    ReloadOk = 101,
    AdminKick = 102,
    AdminStatsRequest = 103,
    AdminStatsResponse = 104,
    AdminBroadcast = 105,

    ErrorMsg = 200,
}

impl MessageType {
    /// The wire id.
    pub fn id(self) -> u16 {
        self as u16
    }

    /// The channel every message of this type is sent on.
    pub fn channel(self) -> Channel {
        use MessageType::*;
        match self {
            VersionCheck | Hello | HelloAck | Disconnect | VersionMismatch
            | AdminReload | ReloadOk | AdminKick | AdminStatsRequest
            | AdminStatsResponse | AdminBroadcast | ErrorMsg => Channel::Control,

            RegionEnter | RegionLeave | MoveInput | RegionSnapshot
            | MoveState => Channel::Region,

            BattleIndicatorSpawn | BattleIndicatorDespawn | BattleLeave
            | BattleStart | BattleState | BattleAction | BattleResult
            | BattleEnd | BattleLog => Channel::Battle,
        }
    }

    /// Upper-snake-case protocol name, used in logs.
    pub fn name(self) -> &'static str {
        use MessageType::*;
        match self {
            VersionCheck => "VERSION_CHECK",
            Hello => "HELLO",
            HelloAck => "HELLO_ACK",
            Disconnect => "DISCONNECT",
            VersionMismatch => "VERSION_MISMATCH",
            RegionEnter => "REGION_ENTER",
            RegionLeave => "REGION_LEAVE",
            MoveInput => "MOVE_INPUT",
            RegionSnapshot => "REGION_SNAPSHOT",
            MoveState => "MOVE_STATE",
            BattleIndicatorSpawn => "BATTLE_INDICATOR_SPAWN",
            BattleIndicatorDespawn => "BATTLE_INDICATOR_DESPAWN",
            BattleLeave => "BATTLE_LEAVE",
            BattleStart => "BATTLE_START",
            BattleState => "BATTLE_STATE",
            BattleAction => "BATTLE_ACTION",
            BattleResult => "BATTLE_RESULT",
            BattleEnd => "BATTLE_END",
            BattleLog => "BATTLE_LOG",
            AdminReload => "ADMIN_RELOAD",
            ReloadOk => "RELOAD_OK",
            AdminKick => "ADMIN_KICK",
            AdminStatsRequest => "ADMIN_STATS_REQUEST",
            AdminStatsResponse => "ADMIN_STATS_RESPONSE",
            AdminBroadcast => "ADMIN_BROADCAST",
            ErrorMsg => "ERROR_MSG",
        }
    }
}

impl TryFrom<u16> for MessageType {
    type Error = ProtocolError;

    fn try_from(raw: u16) -> Result<Self, Self::Error> {
        use MessageType::*;
        Ok(match raw {
            0 => VersionCheck,
            1 => Hello,
            2 => HelloAck,
            3 => Disconnect,
            4 => VersionMismatch,
            10 => RegionEnter,
            11 => RegionLeave,
            12 => MoveInput,
            20 => RegionSnapshot,
            23 => MoveState,
            30 => BattleIndicatorSpawn,
            31 => BattleIndicatorDespawn,
            33 => BattleLeave,
            34 => BattleStart,
            35 => BattleState,
            36 => BattleAction,
            37 => BattleResult,
            38 => BattleEnd,
            39 => BattleLog,
            100 => AdminReload,
            101 => ReloadOk,
            102 => AdminKick,
            103 => AdminStatsRequest,
            104 => AdminStatsResponse,
            105 => AdminBroadcast,
            200 => ErrorMsg,
            other => return Err(ProtocolError::UnknownMessageType(other)),
        })
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Outbound payloads (client → server)
// ---------------------------------------------------------------------------

/// A payload that knows which message type carries it.
pub trait OutboundMessage: Serialize {
    const TYPE: MessageType;
}

macro_rules! outbound {
    ($ty:ident => $kind:ident) => {
        impl OutboundMessage for $ty {
            const TYPE: MessageType = MessageType::$kind;
        }
    };
}

/// VERSION_CHECK request: the client's semantic version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionCheck {
    pub version: String,
}

/// HELLO: authenticate with a credential, or resume with a token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hello {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconnect_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionEnter {
    pub region_id: String,
}

/// Serializes as `{}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionLeave {}

/// Held-direction bitmask plus the frame time it was sampled over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveInput {
    pub bitmask: u32,
    pub dt: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleAction {
    pub battle_id: String,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleLeave {
    pub battle_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminReload {
    pub scope: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminKick {
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminStatsRequest {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminBroadcast {
    pub message: String,
    pub is_alert: bool,
}

outbound!(VersionCheck => VersionCheck);
outbound!(Hello => Hello);
outbound!(RegionEnter => RegionEnter);
outbound!(RegionLeave => RegionLeave);
outbound!(MoveInput => MoveInput);
outbound!(BattleAction => BattleAction);
outbound!(BattleLeave => BattleLeave);
outbound!(AdminReload => AdminReload);
outbound!(AdminKick => AdminKick);
outbound!(AdminStatsRequest => AdminStatsRequest);
outbound!(AdminBroadcast => AdminBroadcast);

// ---------------------------------------------------------------------------
// Handshake replies (server → client)
// ---------------------------------------------------------------------------

/// VERSION_CHECK reply. `status == "ok"` accepts the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionCheckReply {
    pub status: String,
    #[serde(default)]
    pub server_version: Option<String>,
}

impl VersionCheckReply {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// VERSION_MISMATCH: both versions, for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionMismatch {
    #[serde(default)]
    pub server_version: Option<String>,
    #[serde(default)]
    pub client_version: Option<String>,
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // =====================================================================
    // MessageType
    // =====================================================================

    #[test]
    fn test_message_type_ids_match_wire_contract() {
        let expected: [(MessageType, u16); 26] = [
            (MessageType::VersionCheck, 0),
            (MessageType::Hello, 1),
            (MessageType::HelloAck, 2),
            (MessageType::Disconnect, 3),
            (MessageType::VersionMismatch, 4),
            (MessageType::RegionEnter, 10),
            (MessageType::RegionLeave, 11),
            (MessageType::MoveInput, 12),
            (MessageType::RegionSnapshot, 20),
            (MessageType::MoveState, 23),
            (MessageType::BattleIndicatorSpawn, 30),
            (MessageType::BattleIndicatorDespawn, 31),
            (MessageType::BattleLeave, 33),
            (MessageType::BattleStart, 34),
            (MessageType::BattleState, 35),
            (MessageType::BattleAction, 36),
            (MessageType::BattleResult, 37),
            (MessageType::BattleEnd, 38),
            (MessageType::BattleLog, 39),
            (MessageType::AdminReload, 100),
            (MessageType::ReloadOk, 101),
            (MessageType::AdminKick, 102),
            (MessageType::AdminStatsRequest, 103),
            (MessageType::AdminStatsResponse, 104),
            (MessageType::AdminBroadcast, 105),
            (MessageType::ErrorMsg, 200),
        ];
        for (kind, id) in expected {
            assert_eq!(kind.id(), id, "{kind}");
            assert_eq!(MessageType::try_from(id).unwrap(), kind);
        }
    }

    #[test]
    fn test_message_type_unknown_id_is_error() {
        for raw in [5u16, 13, 32, 99, 199, 201, u16::MAX] {
            assert!(matches!(
                MessageType::try_from(raw),
                Err(ProtocolError::UnknownMessageType(r)) if r == raw
            ));
        }
    }

    #[test]
    fn test_message_type_channel_assignment() {
        assert_eq!(MessageType::VersionCheck.channel(), Channel::Control);
        assert_eq!(MessageType::Hello.channel(), Channel::Control);
        assert_eq!(MessageType::AdminBroadcast.channel(), Channel::Control);
        assert_eq!(MessageType::ErrorMsg.channel(), Channel::Control);
        assert_eq!(MessageType::MoveInput.channel(), Channel::Region);
        assert_eq!(MessageType::RegionSnapshot.channel(), Channel::Region);
        assert_eq!(MessageType::BattleAction.channel(), Channel::Battle);
        assert_eq!(MessageType::BattleLog.channel(), Channel::Battle);
    }

    #[test]
    fn test_message_type_display_uses_protocol_name() {
        assert_eq!(MessageType::BattleIndicatorSpawn.to_string(), "BATTLE_INDICATOR_SPAWN");
    }

    // =====================================================================
    // Channel
    // =====================================================================

    #[test]
    fn test_channel_ids_round_trip() {
        for channel in Channel::ALL {
            assert_eq!(Channel::from_id(channel.id()), channel);
        }
        assert_eq!(Channel::Control.id().into_inner(), 0);
        assert_eq!(Channel::Notifications.id().into_inner(), 3);
    }

    // =====================================================================
    // Payload JSON shapes
    // =====================================================================

    #[test]
    fn test_hello_omits_absent_fields() {
        let hello = Hello {
            token: Some("cred".into()),
            reconnect_token: None,
        };
        let json = serde_json::to_value(&hello).unwrap();
        assert_eq!(json, serde_json::json!({ "token": "cred" }));
    }

    #[test]
    fn test_empty_requests_serialize_as_empty_maps() {
        assert_eq!(serde_json::to_string(&RegionLeave {}).unwrap(), "{}");
        assert_eq!(serde_json::to_string(&AdminStatsRequest {}).unwrap(), "{}");
    }

    #[test]
    fn test_battle_action_target_is_optional() {
        let action = BattleAction {
            battle_id: "b-7".into(),
            action: "guard".into(),
            target_id: None,
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json, serde_json::json!({ "battle_id": "b-7", "action": "guard" }));
    }

    #[test]
    fn test_version_check_reply_status() {
        let ok: VersionCheckReply =
            serde_json::from_str(r#"{"status":"ok","server_version":"2.1.0"}"#).unwrap();
        assert!(ok.is_ok());
        assert_eq!(ok.server_version.as_deref(), Some("2.1.0"));

        let bare: VersionCheckReply = serde_json::from_str(r#"{"status":"busy"}"#).unwrap();
        assert!(!bare.is_ok());
        assert_eq!(bare.server_version, None);
    }

    #[test]
    fn test_version_mismatch_tolerates_missing_fields() {
        let mismatch: VersionMismatch = serde_json::from_str("{}").unwrap();
        assert_eq!(mismatch, VersionMismatch::default());
    }
}
