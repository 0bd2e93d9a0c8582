//! End-to-end client tests against a scripted in-memory server.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use realmlink::prelude::*;
use realmlink::session::SessionError;
use realmlink_protocol::{Channel, HEADER_LEN, MessageType, frame};
use realmlink_transport::{MemoryPeer, MemoryTransport, TransportEvent};
use serde_json::{Value, json};

// ---------------------------------------------------------------------------
// Test server
// ---------------------------------------------------------------------------

fn control(kind: MessageType, doc: Value) -> TransportEvent {
    TransportEvent::Received {
        channel: Channel::Control.id(),
        data: frame::encode(kind.id(), &serde_json::to_vec(&doc).unwrap()).unwrap(),
    }
}

fn body(data: &[u8]) -> Value {
    serde_json::from_slice(&data[HEADER_LEN..]).unwrap()
}

/// How the scripted server answers.
#[derive(Clone)]
struct Script {
    version_reply: Option<(MessageType, Value)>,
    issue_tokens: bool,
    resume_state: Value,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            version_reply: Some((
                MessageType::VersionCheck,
                json!({"status": "ok", "server_version": "1.0.0"}),
            )),
            issue_tokens: true,
            resume_state: json!({"region": "harbor", "hp": 7}),
        }
    }
}

/// Installs a responder that answers VERSION_CHECK and HELLO. Returns the
/// HELLO bodies it received.
fn serve(peer: &MemoryPeer, script: Script) -> Arc<Mutex<Vec<Value>>> {
    let hellos = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&hellos);
    let mut sessions = 0;
    peer.set_responder(move |_, data| {
        let header = frame::decode_header(data).unwrap();
        match header.message_type {
            0 => script
                .version_reply
                .clone()
                .map(|(kind, doc)| vec![control(kind, doc)])
                .unwrap_or_default(),
            1 => {
                let hello = body(data);
                let resumed = hello.get("reconnect_token").is_some();
                seen.lock().unwrap().push(hello);
                sessions += 1;
                let mut ack = json!({
                    "session_id": format!("s-{sessions}"),
                    "resumed": resumed,
                    "resume_state": script.resume_state.clone(),
                });
                if script.issue_tokens {
                    ack["reconnect_token"] = json!(format!("tok-{sessions}"));
                }
                vec![control(MessageType::HelloAck, ack)]
            }
            _ => Vec::new(),
        }
    });
    hellos
}

fn test_config() -> ClientConfig {
    ClientConfig {
        handshake_timeout_ms: 50,
        handshake_poll_interval_ms: 1,
        ..ClientConfig::default()
    }
}

fn client_pair() -> (GameClient<MemoryTransport>, MemoryPeer) {
    let (transport, peer) = MemoryTransport::pair();
    (GameClient::with_transport(test_config(), transport), peer)
}

/// Records every event the client fires, in order.
fn record_all(client: &mut GameClient<MemoryTransport>) -> Arc<Mutex<Vec<ClientEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    for kind in EventKind::ALL {
        let sink = Arc::clone(&events);
        client.on(kind, move |event| sink.lock().unwrap().push(event.clone()));
    }
    events
}

fn kinds(events: &Arc<Mutex<Vec<ClientEvent>>>) -> Vec<EventKind> {
    events.lock().unwrap().iter().map(ClientEvent::kind).collect()
}

/// Connects and authenticates, then clears recorded traffic.
fn authenticated(
    script: Script,
) -> (GameClient<MemoryTransport>, MemoryPeer, Arc<Mutex<Vec<Value>>>) {
    let (mut client, peer) = client_pair();
    let hellos = serve(&peer, script);
    client.connect("game.local", 7777).unwrap();
    client.authenticate("player-cred");
    client.update(Duration::from_millis(16));
    assert!(client.session_id().is_some());
    peer.take_sent();
    (client, peer, hellos)
}

const TICK: Duration = Duration::from_millis(100);

// ---------------------------------------------------------------------------
// Connect and handshake
// ---------------------------------------------------------------------------

#[test]
fn test_connect_handshake_ok_is_connected() {
    let (mut client, peer) = client_pair();
    serve(&peer, Script::default());

    client.connect("game.local", 7777).unwrap();

    assert!(client.is_connected());
    assert_eq!(client.state(), ConnectionState::Connected);
    assert_eq!(client.server_version(), Some("1.0.0"));
    assert_eq!(peer.last_address(), Some(("game.local".to_string(), 7777)));
}

#[test]
fn test_connect_version_mismatch_closes_connection() {
    let (mut client, peer) = client_pair();
    serve(
        &peer,
        Script {
            version_reply: Some((
                MessageType::VersionMismatch,
                json!({"server_version": "3.0.0", "client_version": "0.1.0"}),
            )),
            ..Script::default()
        },
    );

    let err = client.connect("game.local", 7777).unwrap_err();

    assert!(matches!(
        err,
        ClientError::Handshake(HandshakeError::Rejected { ref server_version, .. })
            if server_version == "3.0.0"
    ));
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert!(!peer.is_open());
    assert_eq!(peer.close_count(), 1);
}

#[test]
fn test_connect_silent_server_times_out_and_closes() {
    let (mut client, peer) = client_pair();
    serve(
        &peer,
        Script {
            version_reply: None,
            ..Script::default()
        },
    );

    let err = client.connect("game.local", 7777).unwrap_err();

    assert!(matches!(
        err,
        ClientError::Handshake(HandshakeError::Timeout(_))
    ));
    assert!(!client.is_connected());
    assert!(!peer.is_open());
}

#[test]
fn test_connect_drop_right_after_version_ok_fails() {
    let (mut client, peer) = client_pair();
    let events = record_all(&mut client);
    peer.set_responder(|_, _| {
        vec![
            control(MessageType::VersionCheck, json!({"status": "ok"})),
            TransportEvent::Disconnected {
                reason: "reset".into(),
            },
        ]
    });

    let err = client.connect("game.local", 7777).unwrap_err();

    assert!(matches!(
        err,
        ClientError::Handshake(HandshakeError::Aborted(ref reason)) if reason == "reset"
    ));
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert!(!peer.is_open());
    for _ in 0..10 {
        client.update(TICK);
    }
    assert!(events.lock().unwrap().is_empty());
}

#[test]
fn test_connect_refused_returns_transport_error() {
    let (mut client, peer) = client_pair();
    peer.set_refusing(true);

    let err = client.connect("game.local", 7777).unwrap_err();

    assert!(matches!(err, ClientError::Transport(_)));
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

// ---------------------------------------------------------------------------
// Authentication and dispatch
// ---------------------------------------------------------------------------

#[test]
fn test_authenticate_fires_authenticated_with_session_id() {
    let (mut client, peer) = client_pair();
    let hellos = serve(&peer, Script::default());
    let session = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&session);
    client.on_authenticated(move |id| *sink.lock().unwrap() = id.map(str::to_string));

    client.connect("game.local", 7777).unwrap();
    client.authenticate("player-cred");
    client.update(Duration::from_millis(16));

    assert_eq!(session.lock().unwrap().as_deref(), Some("s-1"));
    assert_eq!(client.session_id(), Some("s-1"));
    assert_eq!(hellos.lock().unwrap()[0], json!({"token": "player-cred"}));
}

#[test]
fn test_update_dispatches_snapshot_to_callback() {
    let (mut client, peer, _) = authenticated(Script::default());
    let snapshots = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&snapshots);
    client.on_snapshot(move |doc| sink.lock().unwrap().push(doc.clone()));

    let doc = json!({"tick": 12, "entities": [{"id": 1, "x": 3.5}]});
    peer.push(
        Channel::Region.id(),
        frame::encode(20, &serde_json::to_vec(&doc).unwrap()).unwrap(),
    );
    client.update(Duration::from_millis(16));

    assert_eq!(*snapshots.lock().unwrap(), vec![doc]);
}

#[test]
fn test_update_reassembles_frame_split_across_datagrams() {
    let (mut client, peer, _) = authenticated(Script::default());
    let events = record_all(&mut client);
    let bytes = frame::encode(35, br#"{"turn":2}"#).unwrap();

    peer.push(Channel::Battle.id(), bytes[..3].to_vec());
    client.update(Duration::from_millis(16));
    assert!(events.lock().unwrap().is_empty());

    peer.push(Channel::Battle.id(), bytes[3..].to_vec());
    client.update(Duration::from_millis(16));
    assert_eq!(
        *events.lock().unwrap(),
        vec![ClientEvent::BattleState(json!({"turn": 2}))]
    );
}

#[test]
fn test_unknown_message_type_fires_nothing() {
    let (mut client, peer, _) = authenticated(Script::default());
    let events = record_all(&mut client);

    peer.push(Channel::Notifications.id(), frame::encode(777, br#"{"new":true}"#).unwrap());
    client.update(Duration::from_millis(16));

    assert!(events.lock().unwrap().is_empty());
    assert!(client.is_connected());
}

#[test]
fn test_bad_payload_fires_error_and_keeps_connection() {
    let (mut client, peer, _) = authenticated(Script::default());
    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&errors);
    client.on_error(move |message, payload| {
        sink.lock().unwrap().push((message.to_string(), payload.cloned()));
    });

    peer.push(Channel::Battle.id(), frame::encode(38, b"{oops").unwrap());
    peer.push(
        Channel::Control.id(),
        frame::encode(200, br#"{"message":"region full"}"#).unwrap(),
    );
    client.update(Duration::from_millis(16));

    let errors = errors.lock().unwrap();
    assert_eq!(errors.len(), 2);
    assert!(errors[0].0.contains("BATTLE_END"));
    assert_eq!(errors[0].1, None);
    assert_eq!(errors[1].0, "region full");
    assert!(client.is_connected());
}

#[test]
fn test_clear_callback_stops_delivery() {
    let (mut client, peer, _) = authenticated(Script::default());
    let count = Arc::new(Mutex::new(0));
    let sink = Arc::clone(&count);
    client.on_admin_broadcast(move |_| *sink.lock().unwrap() += 1);
    let broadcast = frame::encode(105, br#"{"message":"hi","is_alert":false}"#).unwrap();

    peer.push(Channel::Control.id(), broadcast.clone());
    client.update(Duration::from_millis(16));
    assert!(client.clear_callback(EventKind::AdminBroadcast));
    peer.push(Channel::Control.id(), broadcast);
    client.update(Duration::from_millis(16));

    assert_eq!(*count.lock().unwrap(), 1);
}

#[test]
fn test_outbound_payload_shapes() {
    let (mut client, peer, _) = authenticated(Script::default());

    client.enter_region("harbor");
    client.send_move(0b1001, 0.25);
    client.battle_action("b-1", "attack", None);
    client.leave_battle("b-1");
    client.admin_kick("griefer", Some("spam"));
    client.admin_reload("items");
    client.admin_stats_request();

    let sent: Vec<(u16, Value)> = peer
        .take_sent()
        .iter()
        .map(|(_, bytes)| (frame::decode_header(bytes).unwrap().message_type, body(bytes)))
        .collect();
    assert_eq!(
        sent,
        vec![
            (10, json!({"region_id": "harbor"})),
            (12, json!({"bitmask": 9, "dt": 0.25})),
            (36, json!({"battle_id": "b-1", "action": "attack"})),
            (33, json!({"battle_id": "b-1"})),
            (102, json!({"user": "griefer", "reason": "spam"})),
            (100, json!({"scope": "items"})),
            (103, json!({})),
        ]
    );
}

// ---------------------------------------------------------------------------
// Reconnection
// ---------------------------------------------------------------------------

#[test]
fn test_backoff_attempts_at_one_two_four_seconds_then_fails() {
    let (mut client, peer, _) = authenticated(Script::default());
    let events = record_all(&mut client);
    let attempts = Arc::new(Mutex::new(Vec::new()));
    let clock = Arc::new(Mutex::new(Duration::ZERO));
    {
        let attempts = Arc::clone(&attempts);
        let clock = Arc::clone(&clock);
        client.on_reconnecting(move |attempt, _| {
            attempts.lock().unwrap().push((attempt, *clock.lock().unwrap()));
        });
    }

    peer.set_refusing(true);
    peer.drop_connection("network unreachable");
    for _ in 0..100 {
        *clock.lock().unwrap() += TICK;
        client.update(TICK);
        if client.state() == ConnectionState::Disconnected {
            break;
        }
    }

    assert_eq!(
        *attempts.lock().unwrap(),
        vec![
            (1, Duration::from_secs(1)),
            (2, Duration::from_secs(3)),
            (3, Duration::from_secs(7)),
        ]
    );
    assert_eq!(*clock.lock().unwrap(), Duration::from_secs(7));
    assert_eq!(client.state(), ConnectionState::Disconnected);
    let fired = kinds(&events);
    assert_eq!(fired.first(), Some(&EventKind::Disconnected));
    assert_eq!(fired.last(), Some(&EventKind::ReconnectFailed));
    assert_eq!(
        events.lock().unwrap().last(),
        Some(&ClientEvent::ReconnectFailed { attempts: 3 })
    );
}

#[test]
fn test_reconnect_dropped_after_version_ok_counts_as_failed_attempt() {
    let (mut client, peer, _) = authenticated(Script::default());
    let events = record_all(&mut client);
    peer.set_responder(|_, _| {
        vec![
            control(MessageType::VersionCheck, json!({"status": "ok"})),
            TransportEvent::Disconnected {
                reason: "reset".into(),
            },
        ]
    });

    peer.drop_connection("timeout");
    for _ in 0..100 {
        client.update(TICK);
        if client.state() == ConnectionState::Disconnected {
            break;
        }
    }

    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(
        events.lock().unwrap().last(),
        Some(&ClientEvent::ReconnectFailed { attempts: 3 })
    );
    assert!(!peer.is_open());
}

#[test]
fn test_zero_max_attempts_fails_in_same_update_as_drop() {
    let config = ClientConfig {
        reconnect: ReconnectConfig {
            max_attempts: 0,
            ..ReconnectConfig::default()
        },
        ..test_config()
    };
    let (transport, peer) = MemoryTransport::pair();
    let mut client = GameClient::with_transport(config, transport);
    serve(&peer, Script::default());
    client.connect("game.local", 7777).unwrap();
    client.authenticate("player-cred");
    client.update(Duration::from_millis(16));
    let events = record_all(&mut client);

    peer.drop_connection("timeout");
    client.update(Duration::from_millis(16));

    assert_eq!(
        *events.lock().unwrap(),
        vec![
            ClientEvent::Disconnected {
                reason: "timeout".into()
            },
            ClientEvent::ReconnectFailed { attempts: 0 },
        ]
    );
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(peer.open_count(), 1);
}

#[test]
fn test_resumption_fires_reconnected_and_resets_attempts() {
    let (mut client, peer, hellos) = authenticated(Script::default());
    let resumed = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&resumed);
    client.on_reconnected(move |state| *sink.lock().unwrap() = Some(state.clone()));

    peer.drop_connection("timeout");
    for _ in 0..10 {
        client.update(TICK);
    }
    assert_eq!(client.state(), ConnectionState::Connected);
    assert_eq!(client.reconnect_attempt(), 1);

    client.update(TICK);

    assert_eq!(
        *resumed.lock().unwrap(),
        Some(json!({"region": "harbor", "hp": 7}))
    );
    assert_eq!(client.reconnect_attempt(), 0);
    assert_eq!(
        hellos.lock().unwrap().last(),
        Some(&json!({"reconnect_token": "tok-1"}))
    );
}

#[test]
fn test_reconnect_without_token_falls_back_to_credential() {
    let (mut client, peer, hellos) = authenticated(Script {
        issue_tokens: false,
        ..Script::default()
    });
    let events = record_all(&mut client);
    client.enter_region("harbor");
    peer.take_sent();

    peer.drop_connection("timeout");
    for _ in 0..11 {
        client.update(TICK);
    }

    assert_eq!(
        hellos.lock().unwrap().last(),
        Some(&json!({"token": "player-cred"}))
    );
    assert!(kinds(&events).contains(&EventKind::Authenticated));
    // The fresh session is put back into the region the caller was in.
    let region_enters: Vec<Value> = peer
        .take_sent()
        .iter()
        .filter(|(_, bytes)| frame::decode_header(bytes).unwrap().message_type == 10)
        .map(|(_, bytes)| body(bytes))
        .collect();
    assert_eq!(region_enters, vec![json!({"region_id": "harbor"})]);
}

#[test]
fn test_server_disconnect_frame_closes_and_reconnects() {
    let (mut client, peer, _) = authenticated(Script::default());
    let reasons = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&reasons);
    client.on_disconnected(move |reason| sink.lock().unwrap().push(reason.to_string()));

    peer.push(
        Channel::Control.id(),
        frame::encode(3, br#"{"reason":"server restart"}"#).unwrap(),
    );
    client.update(Duration::from_millis(16));

    assert_eq!(*reasons.lock().unwrap(), vec!["server restart".to_string()]);
    assert_eq!(client.state(), ConnectionState::Reconnecting);
    assert!(!peer.is_open());
}

#[test]
fn test_manual_reconnect_retries_on_next_update() {
    let (mut client, peer, _) = authenticated(Script::default());
    let events = record_all(&mut client);
    client.set_auto_reconnect(false);

    peer.drop_connection("timeout");
    client.update(TICK);
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(kinds(&events), vec![EventKind::Disconnected]);

    client.manual_reconnect().unwrap();
    client.update(Duration::from_millis(16));

    assert_eq!(client.state(), ConnectionState::Connected);
    assert_eq!(
        kinds(&events),
        vec![EventKind::Disconnected, EventKind::Reconnecting]
    );
}

#[test]
fn test_manual_reconnect_skips_pending_backoff() {
    let (mut client, peer, _) = authenticated(Script::default());
    let attempts = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&attempts);
    client.on_reconnecting(move |attempt, _| sink.lock().unwrap().push(attempt));

    peer.set_refusing(true);
    peer.drop_connection("timeout");
    for _ in 0..100 {
        client.update(TICK);
        if client.reconnect_attempt() == 2 {
            break;
        }
    }
    // Attempt 2 failed; attempt 3 is four seconds out.
    client.update(TICK);
    assert_eq!(client.state(), ConnectionState::Reconnecting);
    assert_eq!(*attempts.lock().unwrap(), vec![1, 2]);

    peer.set_refusing(false);
    client.manual_reconnect().unwrap();
    client.update(Duration::from_millis(16));

    assert_eq!(*attempts.lock().unwrap(), vec![1, 2, 1]);
    assert_eq!(client.state(), ConnectionState::Connected);
    assert_eq!(peer.open_count(), 2);
}

#[test]
fn test_manual_reconnect_while_connected_is_rejected() {
    let (mut client, _peer, _) = authenticated(Script::default());
    let err = client.manual_reconnect().unwrap_err();
    assert!(matches!(
        err,
        ClientError::Session(SessionError::AlreadyConnected)
    ));
}

#[test]
fn test_manual_reconnect_without_credential_is_rejected() {
    let (mut client, _peer) = client_pair();
    let err = client.manual_reconnect().unwrap_err();
    assert!(matches!(
        err,
        ClientError::Session(SessionError::NoResumeCredential)
    ));
}

#[test]
fn test_disabling_auto_reconnect_cancels_pending_retry() {
    let (mut client, peer, _) = authenticated(Script::default());
    let events = record_all(&mut client);

    peer.drop_connection("timeout");
    client.update(TICK);
    assert_eq!(client.state(), ConnectionState::Reconnecting);
    client.set_auto_reconnect(false);
    for _ in 0..30 {
        client.update(TICK);
    }

    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(kinds(&events), vec![EventKind::Disconnected]);
    assert_eq!(peer.open_count(), 1);
}

#[test]
fn test_disconnect_forgets_session_and_fires_nothing() {
    let (mut client, peer, _) = authenticated(Script::default());
    let events = record_all(&mut client);

    client.disconnect();
    for _ in 0..30 {
        client.update(TICK);
    }

    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(client.session_id(), None);
    assert!(events.lock().unwrap().is_empty());
    assert!(!peer.is_open());
}
