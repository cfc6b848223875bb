#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing,
    dead_code
)]
//! Shared test utilities for lunch roulette client integration tests.
//!
//! Provides a scripted [`MockTransport`], a [`MockConnector`] serving a
//! queue of such transports, and helper functions for constructing common
//! server event JSON strings.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use lunch_roulette_client::protocol::{GameStatePayload, RejoinPayload, ServerEvent};
use lunch_roulette_client::{Connector, LunchRouletteError, Transport};

// ── MockTransport ───────────────────────────────────────────────────

/// One step of a scripted server-side conversation.
pub enum ScriptItem {
    /// The next value `recv()` returns. `None` simulates a clean drop.
    Recv(Option<Result<String, LunchRouletteError>>),
    /// Hold the script until the client has sent at least this many
    /// messages on this transport. Lets a test assert that an outbound
    /// command made it to the wire before the server moves on.
    AwaitSent(usize),
}

/// A scripted mock transport for integration testing.
///
/// Scripted server messages are consumed in order by `recv()`; once the
/// script is exhausted `recv()` hangs forever, so the connection loop stays
/// alive until shutdown (script a final `None` to simulate a drop instead).
/// All messages sent by the client are recorded in `sent`.
pub struct MockTransport {
    script: VecDeque<ScriptItem>,
    pub sent: Arc<StdMutex<Vec<String>>>,
    pub closed: Arc<AtomicBool>,
}

impl MockTransport {
    /// Create a mock transport with the given scripted incoming messages.
    ///
    /// Returns the transport plus shared handles for inspecting sent
    /// messages and whether close was called.
    pub fn new(
        incoming: Vec<Option<Result<String, LunchRouletteError>>>,
    ) -> (Self, Arc<StdMutex<Vec<String>>>, Arc<AtomicBool>) {
        Self::scripted(incoming.into_iter().map(ScriptItem::Recv).collect())
    }

    /// Create a mock transport from a full script, including
    /// [`ScriptItem::AwaitSent`] pacing gates.
    pub fn scripted(
        script: Vec<ScriptItem>,
    ) -> (Self, Arc<StdMutex<Vec<String>>>, Arc<AtomicBool>) {
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let transport = Self {
            script: VecDeque::from(script),
            sent: Arc::clone(&sent),
            closed: Arc::clone(&closed),
        };
        (transport, sent, closed)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, message: String) -> Result<(), LunchRouletteError> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    // Cancel-safe: a script item is only popped once it is ready to
    // resolve, so a cancelled call never loses a message.
    async fn recv(&mut self) -> Option<Result<String, LunchRouletteError>> {
        loop {
            match self.script.front() {
                Some(ScriptItem::AwaitSent(n)) => {
                    if self.sent.lock().unwrap().len() >= *n {
                        self.script.pop_front();
                    } else {
                        tokio::time::sleep(std::time::Duration::from_millis(1)).await;
                    }
                }
                Some(ScriptItem::Recv(_)) => {
                    if let Some(ScriptItem::Recv(item)) = self.script.pop_front() {
                        return item;
                    }
                }
                None => {
                    // No more scripted messages — hang forever so the
                    // connection loop stays alive until shutdown is called.
                    std::future::pending::<()>().await;
                }
            }
        }
    }

    async fn close(&mut self) -> Result<(), LunchRouletteError> {
        self.closed.store(true, Ordering::Relaxed);
        Ok(())
    }
}

// ── MockConnector ───────────────────────────────────────────────────

/// A [`Connector`] serving a queue of pre-built [`MockTransport`]s.
///
/// Each `connect()` call hands out the next transport; once the queue is
/// exhausted every further call fails, consuming reconnect attempts.
pub struct MockConnector {
    transports: VecDeque<MockTransport>,
    pub calls: Arc<AtomicU32>,
}

impl MockConnector {
    pub fn new(transports: Vec<MockTransport>) -> (Self, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let connector = Self {
            transports: VecDeque::from(transports),
            calls: Arc::clone(&calls),
        };
        (connector, calls)
    }

    /// A connector whose every `connect()` call fails.
    pub fn always_failing() -> (Self, Arc<AtomicU32>) {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl Connector for MockConnector {
    type Transport = MockTransport;

    async fn connect(&mut self) -> Result<MockTransport, LunchRouletteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.transports
            .pop_front()
            .ok_or_else(|| LunchRouletteError::TransportReceive("connection refused".into()))
    }
}

// ── JSON helper functions ───────────────────────────────────────────

/// Returns the JSON string for a `PLAYER_LIST` server event.
pub fn player_list_json(players: &[&str]) -> String {
    serde_json::to_string(&ServerEvent::PlayerList {
        players: players.iter().map(ToString::to_string).collect(),
    })
    .expect("player_list_json serialization")
}

/// Returns the JSON string for a `GAME_STARTED` server event.
pub fn game_started_json(game_id: &str) -> String {
    serde_json::to_string(&ServerEvent::GameStarted {
        message: "Game started".into(),
        game_id: game_id.into(),
    })
    .expect("game_started_json serialization")
}

/// Returns the JSON string for a `SPINED` server event.
pub fn spined_json(player: &str, score: i32) -> String {
    serde_json::to_string(&ServerEvent::Spined {
        player: player.into(),
        score,
    })
    .expect("spined_json serialization")
}

/// Returns the JSON string for a `GAME_ENDED` server event.
pub fn game_ended_json(loser: &str, winners: &[&str]) -> String {
    serde_json::to_string(&ServerEvent::GameEnded {
        message: format!("{loser} pays for lunch"),
        loser: loser.into(),
        winners: winners.iter().map(ToString::to_string).collect(),
    })
    .expect("game_ended_json serialization")
}

/// Returns the JSON string for a `MEAL_SUBMITTED` server event.
pub fn meal_submitted_json(player: &str) -> String {
    serde_json::to_string(&ServerEvent::MealSubmitted {
        message: "Meal submitted".into(),
        player: player.into(),
        meal: None,
    })
    .expect("meal_submitted_json serialization")
}

/// Returns the JSON string for the terminal `ALL_MEALS_SUBMITTED` event.
pub fn all_meals_submitted_json() -> String {
    serde_json::to_string(&ServerEvent::AllMealsSubmitted {
        message: "All meals are in".into(),
    })
    .expect("all_meals_submitted_json serialization")
}

/// Returns the JSON string for a `GAME_STATE` full-state push.
pub fn game_state_json(state: GameStatePayload) -> String {
    serde_json::to_string(&ServerEvent::GameState(Box::new(state)))
        .expect("game_state_json serialization")
}

/// Returns the JSON string for a server-issued `REJOIN` event.
pub fn rejoin_json(player: &str, state: GameStatePayload) -> String {
    serde_json::to_string(&ServerEvent::Rejoin(Box::new(RejoinPayload {
        player: player.into(),
        state,
    })))
    .expect("rejoin_json serialization")
}

/// Returns the JSON string for a `USER_DISJOINED` server event.
pub fn user_disjoined_json(player: &str) -> String {
    serde_json::to_string(&ServerEvent::UserDisjoined {
        player: player.into(),
    })
    .expect("user_disjoined_json serialization")
}

/// Returns the JSON string for a `GAME_RESET` server event.
pub fn game_reset_json() -> String {
    serde_json::to_string(&ServerEvent::GameReset {
        message: "Game reset".into(),
    })
    .expect("game_reset_json serialization")
}
