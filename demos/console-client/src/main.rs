use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use clap::Parser;
use realmlink::prelude::*;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const FRAME: Duration = Duration::from_millis(16);

// ---------------------------------------------------------------------------
// Arguments and config
// ---------------------------------------------------------------------------

/// Connects to a game-session server and prints every event it pushes.
#[derive(Parser, Debug, PartialEq, Eq)]
#[command(name = "console-client", about = "Realmlink console client")]
struct Args {
    /// Server host name or address.
    host: String,

    /// Server port.
    port: u16,

    /// Credential sent with HELLO.
    credential: String,

    /// JSON client config (defaults are used when omitted).
    config: Option<PathBuf>,
}

fn load_config(path: &Path) -> Result<ClientConfig, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)?;
    let config: ClientConfig = serde_json::from_str(&text)?;
    Ok(config)
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

fn init_logging(debug_log: &DebugLog) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true))
        .with(debug_log.layer())
        .init();
}

// ---------------------------------------------------------------------------
// Event printing
// ---------------------------------------------------------------------------

fn register_handlers(client: &mut GameClient, done: &Arc<AtomicBool>) {
    client.on_authenticated(|session| println!("authenticated (session {})", session.unwrap_or("-")));
    client.on_snapshot(|doc| println!("snapshot: {doc}"));
    client.on_move_state(|doc| println!("move state: {doc}"));
    client.on_battle_start(|doc| println!("battle start: {doc}"));
    client.on_battle_state(|doc| println!("battle state: {doc}"));
    client.on_battle_log(|doc| println!("battle log: {doc}"));
    client.on_battle_result(|doc| println!("battle result: {doc}"));
    client.on_battle_end(|doc| println!("battle end: {doc}"));
    client.on_admin_broadcast(|doc| println!("broadcast: {doc}"));
    client.on_admin_kick(|doc| println!("kicked: {doc}"));
    client.on_error(|message, _| eprintln!("server error: {message}"));
    client.on_disconnected(|reason| eprintln!("disconnected: {reason}"));
    client.on_reconnecting(|attempt, delay| {
        eprintln!("reconnecting (attempt {attempt}, next retry in {delay:?})")
    });
    client.on_reconnected(|state| println!("session resumed: {state}"));

    let done = Arc::clone(done);
    client.on_reconnect_failed(move |attempts| {
        eprintln!("giving up after {attempts} attempts");
        done.store(true, Ordering::Relaxed);
    });
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ClientConfig::default(),
    };

    let mut client = GameClient::new(config)?;
    init_logging(&client.debug_log());

    let done = Arc::new(AtomicBool::new(false));
    register_handlers(&mut client, &done);

    if let Err(e) = client.connect(&args.host, args.port) {
        eprintln!("connect failed: {e}");
        for line in client.debug_log().lines() {
            eprintln!("  {line}");
        }
        std::process::exit(1);
    }
    client.authenticate(args.credential);

    let mut last = Instant::now();
    while !done.load(Ordering::Relaxed) {
        let now = Instant::now();
        client.update(now - last);
        last = now;
        std::thread::sleep(FRAME);
    }

    Ok(())
}
