//! End-to-end session tests: connection manager, game session, and
//! snapshot store wired together through `run_session`.
//!
//! Each test scripts a full server-side conversation on mock transports
//! and asserts the terminal outcome, the commands the client sent, and
//! what ended up persisted.

mod common;

use std::sync::atomic::{AtomicU32, Ordering};

use lunch_roulette_client::protocol::GameStatePayload;
use lunch_roulette_client::{
    run_session, ClientCommand, ConnectionConfig, GamePhase, GameSession, GameSnapshot,
    LunchRouletteError, RoomConnection, ServerEvent, SnapshotStore,
};

use common::{
    all_meals_submitted_json, game_ended_json, game_started_json, game_state_json,
    meal_submitted_json, player_list_json, rejoin_json, spined_json, MockConnector, MockTransport,
    ScriptItem,
};

fn recv(json: String) -> ScriptItem {
    ScriptItem::Recv(Some(Ok(json)))
}

fn temp_store(tag: &str) -> SnapshotStore {
    static COUNTER: AtomicU32 = AtomicU32::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let dir = std::env::temp_dir().join(format!(
        "lunch-roulette-session-{tag}-{}-{n}",
        std::process::id()
    ));
    SnapshotStore::new(dir)
}

fn sent_commands(sent: &std::sync::Arc<std::sync::Mutex<Vec<String>>>) -> Vec<ClientCommand> {
    sent.lock()
        .unwrap()
        .iter()
        .map(|raw| serde_json::from_str(raw).expect("parse sent command"))
        .collect()
}

// ════════════════════════════════════════════════════════════════════
// Happy path: lobby → spins → resolution → meals → done
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn full_game_cycle_completes_and_clears_the_snapshot() {
    let (transport, sent, closed) = MockTransport::scripted(vec![
        recv(player_list_json(&["alice", "bob"])),
        recv(game_started_json("g1")),
        recv(spined_json("alice", 10)),
        recv(spined_json("bob", 3)),
        // Wait for REJOIN + the client-triggered END_GAME before resolving.
        ScriptItem::AwaitSent(2),
        recv(game_ended_json("bob", &["alice"])),
        recv(meal_submitted_json("alice")),
        recv(meal_submitted_json("bob")),
        recv(all_meals_submitted_json()),
    ]);
    let (connector, _calls) = MockConnector::new(vec![transport]);
    let (connection, events) =
        RoomConnection::open(connector, ConnectionConfig::new("lunch-42", "alice"));

    let store = temp_store("happy");
    // Pretend there is a stale save that must be cleared on completion.
    store
        .save("lunch-42", &GameSnapshot::empty())
        .expect("seed save");

    let mut session = GameSession::new("lunch-42", "alice");
    run_session(connection, events, &mut session, &store)
        .await
        .expect("session should complete");

    assert_eq!(session.phase(), GamePhase::Completed);
    assert!(closed.load(Ordering::Relaxed));
    // Completion discards the persisted snapshot.
    assert_eq!(store.restore("lunch-42"), GameSnapshot::empty());

    // The second spin completed the player set, so the client asked the
    // server to resolve the round exactly once.
    let commands = sent_commands(&sent);
    let end_games: Vec<_> = commands
        .iter()
        .filter(|c| matches!(c, ClientCommand::EndGame { .. }))
        .collect();
    assert_eq!(end_games.len(), 1);
    if let ClientCommand::EndGame { room_id, game_id, scores } = end_games[0] {
        assert_eq!(room_id, "lunch-42");
        assert_eq!(game_id, "g1");
        assert_eq!(scores.len(), 2);
        assert_eq!(scores.get("alice"), Some(&10));
        assert_eq!(scores.get("bob"), Some(&3));
    }
    // And announced presence first.
    assert!(matches!(commands.first(), Some(ClientCommand::Rejoin { .. })));
}

// ════════════════════════════════════════════════════════════════════
// Reconnection mid-game
// ════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn reconnect_mid_game_resyncs_from_own_rejoin() {
    // The first connection sees the game start and then drops. After the
    // redial the server answers the automatic REJOIN with the full state.
    let mid_game = GameStatePayload {
        game_started: true,
        game_id: "g1".into(),
        players: vec!["alice".into(), "bob".into()],
        scores: [("bob".to_string(), 3)].into(),
        ..GameStatePayload::default()
    };

    let (first, _s1, _c1) = MockTransport::new(vec![
        Some(Ok(player_list_json(&["alice", "bob"]))),
        Some(Ok(game_started_json("g1"))),
        None, // connection drops
    ]);
    let (second, second_sent, _c2) = MockTransport::scripted(vec![
        recv(rejoin_json("alice", mid_game)),
        recv(spined_json("alice", 10)),
        // Wait for REJOIN + the client-triggered END_GAME before resolving.
        ScriptItem::AwaitSent(2),
        recv(game_ended_json("bob", &["alice"])),
        recv(meal_submitted_json("alice")),
        recv(meal_submitted_json("bob")),
        recv(all_meals_submitted_json()),
    ]);
    let (connector, calls) = MockConnector::new(vec![first, second]);
    let (connection, events) =
        RoomConnection::open(connector, ConnectionConfig::new("lunch-42", "alice"));

    let store = temp_store("reconnect");
    let mut session = GameSession::new("lunch-42", "alice");
    run_session(connection, events, &mut session, &store)
        .await
        .expect("session should complete after reconnect");

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(session.phase(), GamePhase::Completed);

    // The redial announced presence again, and the resynced state let the
    // client compute the END_GAME trigger with bob's pre-drop score intact.
    let commands: Vec<ClientCommand> = second_sent
        .lock()
        .unwrap()
        .iter()
        .map(|raw| serde_json::from_str(raw).expect("parse"))
        .collect();
    assert!(matches!(commands.first(), Some(ClientCommand::Rejoin { .. })));
    assert!(commands.iter().any(|c| matches!(
        c,
        ClientCommand::EndGame { scores, .. } if scores.len() == 2
    )));
}

// ════════════════════════════════════════════════════════════════════
// Giving up: snapshot persisted for a manual reload
// ════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn exhausted_retries_persist_the_snapshot() {
    // One good connection that sees real progress, then drops; every
    // redial fails until the manager gives up.
    let (transport, _sent, _closed) = MockTransport::new(vec![
        Some(Ok(player_list_json(&["alice", "bob"]))),
        Some(Ok(game_started_json("g1"))),
        Some(Ok(spined_json("bob", 3))),
        None,
    ]);
    let (connector, calls) = MockConnector::new(vec![transport]);
    let (connection, events) =
        RoomConnection::open(connector, ConnectionConfig::new("lunch-42", "alice"));

    let store = temp_store("exhausted");
    let mut session = GameSession::new("lunch-42", "alice");
    let err = run_session(connection, events, &mut session, &store)
        .await
        .expect_err("session should give up");
    assert!(matches!(err, LunchRouletteError::RetriesExhausted));
    assert_eq!(calls.load(Ordering::SeqCst), 6);

    // A later process can pick the game back up from the save.
    let restored = store.restore("lunch-42");
    assert!(restored.started);
    assert_eq!(restored.game_id, "g1");
    assert_eq!(restored.scores.get("bob"), Some(&3));

    let resumed = GameSession::with_snapshot("lunch-42", "alice", restored);
    assert_eq!(resumed.phase(), GamePhase::Spinning);
}

// ════════════════════════════════════════════════════════════════════
// Server-pushed resync and reset
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn game_state_push_replaces_local_state() {
    let pushed = GameStatePayload {
        game_started: true,
        game_id: "g9".into(),
        players: vec!["alice".into(), "bob".into(), "carol".into()],
        scores: [("carol".to_string(), 5)].into(),
        ..GameStatePayload::default()
    };

    let (transport, _sent, _closed) = MockTransport::new(vec![
        Some(Ok(player_list_json(&["alice"]))),
        Some(Ok(game_state_json(pushed))),
        Some(Ok(all_meals_submitted_json())),
    ]);
    let (connector, _calls) = MockConnector::new(vec![transport]);
    let (connection, events) =
        RoomConnection::open(connector, ConnectionConfig::new("lunch-42", "alice"));

    let store = temp_store("resync");
    let mut session = GameSession::new("lunch-42", "alice");

    // Observe the snapshot just before completion wipes it: reduce the
    // same script through a shadow session for the assertion.
    run_session(connection, events, &mut session, &store)
        .await
        .expect("session completes");

    let mut shadow = GameSession::new("lunch-42", "alice");
    shadow.apply(&ServerEvent::GameState(Box::new(GameStatePayload {
        game_started: true,
        game_id: "g9".into(),
        players: vec!["alice".into(), "bob".into(), "carol".into()],
        scores: [("carol".to_string(), 5)].into(),
        ..GameStatePayload::default()
    })));
    assert_eq!(shadow.snapshot().game_id, "g9");
    assert_eq!(shadow.snapshot().players.len(), 3);
    assert_eq!(shadow.snapshot().scores.get("carol"), Some(&5));
}
