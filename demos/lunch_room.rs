//! # Lunch Room Example
//!
//! Demonstrates a complete lunch roulette client lifecycle:
//!
//! 1. Connect to a room server via WebSocket (with automatic reconnects)
//! 2. Announce presence and resync via the automatic `REJOIN`
//! 3. Start a game once a second player is present, spin, and submit a
//!    meal cost when the round resolves
//! 4. Shut down gracefully on Ctrl+C, game completion, or giving up
//!
//! ## Running
//!
//! ```sh
//! # Start a lunch roulette server on localhost:8000, then:
//! cargo run --example lunch_room
//!
//! # Override server URL, room, or display name:
//! LUNCH_URL=ws://my-server:8000 LUNCH_ROOM=team-lunch LUNCH_PLAYER=alice \
//!     cargo run --example lunch_room
//! ```

use lunch_roulette_client::{
    ConnectionConfig, GamePhase, GameSession, RoomConnection, RoomEvent, ServerEvent,
    SessionUpdate, SnapshotStore, WebSocketConnector,
};

/// Default server URL when `LUNCH_URL` is not set.
const DEFAULT_URL: &str = "ws://localhost:8000";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ─────────────────────────────────────────────────────
    // Initialize tracing. Set `RUST_LOG=debug` for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // ── Configuration ───────────────────────────────────────────────
    let url = std::env::var("LUNCH_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
    let room_id = std::env::var("LUNCH_ROOM").unwrap_or_else(|_| "demo-room".to_string());
    let player = std::env::var("LUNCH_PLAYER").unwrap_or_else(|_| "RustPlayer".to_string());
    tracing::info!("Joining room {room_id} at {url} as {player}");

    // ── Connect ─────────────────────────────────────────────────────
    // The connector redials the same room endpoint after every drop; the
    // manager sends REJOIN for us on each (re)connect.
    let connector = WebSocketConnector::new(&url, &room_id, &player);
    let config = ConnectionConfig::new(&room_id, &player);
    let (mut connection, mut event_rx) = RoomConnection::open(connector, config);

    // Resume from any snapshot a previous run left behind.
    let store = SnapshotStore::new("./lunch-state");
    let mut session = GameSession::with_snapshot(&room_id, &player, store.restore(&room_id));

    // ── Event loop ──────────────────────────────────────────────────
    loop {
        tokio::select! {
            // Branch 1: Incoming event from the room (or transport layer).
            event = event_rx.recv() => {
                let Some(event) = event else {
                    tracing::info!("Event channel closed, exiting");
                    break;
                };

                match event {
                    RoomEvent::ConnectionChanged(true) => {
                        tracing::info!("Connected to room");
                        session.handle_connection_change(true);
                    }

                    RoomEvent::ConnectionChanged(false) => {
                        tracing::warn!("Connection lost, reconnecting…");
                        session.handle_connection_change(false);
                        store.save(&room_id, session.snapshot())?;
                    }

                    RoomEvent::RetriesExhausted => {
                        tracing::error!("Gave up reconnecting; snapshot saved for next run");
                        store.save(&room_id, session.snapshot())?;
                        break;
                    }

                    RoomEvent::Server(server_event) => {
                        let mut done = false;
                        for update in session.apply(&server_event) {
                            match update {
                                SessionUpdate::Command(cmd) => {
                                    if let Err(err) = connection.send(cmd) {
                                        tracing::warn!("Dropped command: {err}");
                                    }
                                }
                                SessionUpdate::Completed => done = true,
                            }
                        }
                        if done {
                            tracing::info!("All meals are in — lunch is settled!");
                            store.clear(&room_id);
                            break;
                        }
                        react_to_event(&server_event);
                    }
                }

                // Drive the game forward whenever our snapshot allows it.
                drive(&mut session, &connection);
            }

            // Branch 2: Ctrl+C — shut down gracefully.
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received, shutting down…");
                store.save(&room_id, session.snapshot())?;
                break;
            }
        }
    }

    // ── Cleanup ─────────────────────────────────────────────────────
    connection.shutdown().await;
    tracing::info!("Client shut down. Bon appétit!");
    Ok(())
}

/// Log noteworthy server events.
fn react_to_event(event: &ServerEvent) {
    match event {
        ServerEvent::PlayerList { players } => {
            tracing::info!("Room roster: {players:?}");
        }
        ServerEvent::Spined { player, score } => {
            tracing::info!("{player} spun {score}");
        }
        ServerEvent::GameEnded { loser, winners, .. } => {
            tracing::info!("{loser} pays for lunch; winners: {winners:?}");
        }
        ServerEvent::Error { message } => {
            tracing::error!("Server error: {message}");
        }
        _ => {}
    }
}

/// Auto-play: start as soon as a game is possible, spin when it is our
/// turn to, and submit a meal cost once the round resolves.
///
/// Send failures are tolerated — a command refused while the connection
/// is down is retried naturally once the post-reconnect resync lands.
fn drive(session: &mut GameSession, connection: &RoomConnection) {
    let intent = match session.phase() {
        GamePhase::Lobby => session.start().map(|cmd| ("starting a game", cmd)),
        GamePhase::Spinning => session.spin().map(|cmd| ("spinning the roulette", cmd)),
        GamePhase::MealCollection => {
            session.set_meal_draft(12.50, "USD");
            session.submit_meal().map(|cmd| ("submitting meal cost", cmd))
        }
        GamePhase::Completed => return,
    };
    if let Ok((what, cmd)) = intent {
        tracing::info!("{what}");
        if let Err(err) = connection.send(cmd) {
            tracing::warn!("Send failed ({err}), waiting for reconnect");
        }
    }
}
