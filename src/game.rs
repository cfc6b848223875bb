//! Client-local game state machine for one room membership.
//!
//! [`GameSession`] reduces the inbound [`ServerEvent`] stream plus local
//! user intents into a [`GameSnapshot`] — the authoritative-as-known view
//! of one game — and emits the outbound commands those intents and
//! transitions require. It never talks to a transport itself: intents and
//! [`GameSession::apply`] return [`ClientCommand`]s/[`SessionUpdate`]s for
//! the caller to forward, which keeps the whole machine synchronous and
//! directly testable.
//!
//! The server owns membership, scoring, and win/lose determination. The
//! session applies local intents optimistically only where re-submission
//! is locally guarded (meal submission), and otherwise waits for the
//! server's authoritative events.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{LunchRouletteError, Result};
use crate::protocol::{ClientCommand, GameStatePayload, MealPrice, ServerEvent};

/// Default currency for the meal-entry draft.
const DEFAULT_MEAL_CURRENCY: &str = "USD";

// ── Snapshot ────────────────────────────────────────────────────────

/// The full in-memory view of one game's progress.
///
/// Mutated only by reducing inbound events or local optimistic intents.
/// Serializable so the resilience snapshot can persist it across a reload.
///
/// Invariants maintained by [`GameSession`]:
/// - `loser` is set if and only if `winners` is non-empty (both assigned
///   together from one `GAME_ENDED` event).
/// - `scores` and `meal_submitted` are cleared exactly when a new `game_id`
///   is assigned or on an explicit reset.
/// - A participant's key appears in `scores` at most once per game; once
///   recorded it is never overwritten within the same `game_id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameSnapshot {
    /// Known room members. Kept in a `BTreeSet` so iteration order is
    /// stable for rendering.
    pub players: BTreeSet<String>,
    /// Opaque game identifier; empty when no game is active.
    pub game_id: String,
    pub started: bool,
    /// Recorded spin results. A key's presence means that participant has
    /// spun this game.
    pub scores: BTreeMap<String, i32>,
    /// Set only once the server has resolved the round.
    pub loser: Option<String>,
    /// Populated together with `loser`.
    pub winners: Vec<String>,
    /// Per-participant meal-cost submission flags.
    pub meal_submitted: BTreeMap<String, bool>,
    /// The local user's unsubmitted meal-entry draft. Not shared state.
    pub meal_amount: f64,
    /// Currency of the meal-entry draft. Not shared state.
    pub meal_currency: String,
}

impl GameSnapshot {
    /// An empty snapshot with the draft currency defaulted.
    pub fn empty() -> Self {
        Self {
            meal_currency: DEFAULT_MEAL_CURRENCY.into(),
            ..Self::default()
        }
    }

    /// Replace every shared field from a server-pushed full state,
    /// resetting the local-only meal draft.
    fn replace_from(&mut self, state: &GameStatePayload) {
        self.players = state.players.iter().cloned().collect();
        self.game_id = state.game_id.clone();
        self.started = state.game_started;
        self.scores = state.scores.clone();
        self.loser = state.loser.clone();
        self.winners = state.winners.clone();
        self.meal_submitted = state.meal_submitted.clone();
        self.meal_amount = 0.0;
        self.meal_currency = DEFAULT_MEAL_CURRENCY.into();
    }
}

/// Conceptual phase of the game-flow state machine, derived from the
/// snapshot rather than stored beside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamePhase {
    /// No game active; waiting for a start intent.
    Lobby,
    /// Game running, round not yet resolved.
    Spinning,
    /// Round resolved; collecting meal costs.
    MealCollection,
    /// The game-and-payment cycle is fully done for this membership.
    Completed,
}

// ── Session updates ─────────────────────────────────────────────────

/// Output of reducing one server event.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    /// A command that must be forwarded to the room connection.
    Command(ClientCommand),
    /// Terminal: close the connection, discard the persisted snapshot,
    /// and leave the room.
    Completed,
}

// ── Session ─────────────────────────────────────────────────────────

/// One participant's game state synchronizer for one room membership.
pub struct GameSession {
    room_id: String,
    player: String,
    snapshot: GameSnapshot,
    /// Guard against duplicate spin sends before the server responds.
    spin_pending: bool,
    completed: bool,
}

impl GameSession {
    /// Create a session with an empty snapshot.
    pub fn new(room_id: impl Into<String>, player: impl Into<String>) -> Self {
        Self {
            room_id: room_id.into(),
            player: player.into(),
            snapshot: GameSnapshot::empty(),
            spin_pending: false,
            completed: false,
        }
    }

    /// Create a session seeded from a restored snapshot. Best-effort: the
    /// restored view is superseded by the first authoritative resync.
    pub fn with_snapshot(
        room_id: impl Into<String>,
        player: impl Into<String>,
        snapshot: GameSnapshot,
    ) -> Self {
        Self {
            snapshot,
            ..Self::new(room_id, player)
        }
    }

    /// The current authoritative-as-known snapshot.
    pub fn snapshot(&self) -> &GameSnapshot {
        &self.snapshot
    }

    /// Display name of the local participant.
    pub fn player(&self) -> &str {
        &self.player
    }

    /// Derived game-flow phase.
    pub fn phase(&self) -> GamePhase {
        if self.completed {
            GamePhase::Completed
        } else if self.snapshot.loser.is_some() {
            GamePhase::MealCollection
        } else if self.snapshot.started {
            GamePhase::Spinning
        } else {
            GamePhase::Lobby
        }
    }

    /// Whether a spin request is in flight for the local participant.
    pub fn spin_pending(&self) -> bool {
        self.spin_pending
    }

    // ── Local intents ───────────────────────────────────────────────

    /// Intent: start a new game with the currently known players.
    ///
    /// Does not change local state — the server's `GAME_STARTED` is the
    /// authoritative transition, so a start the server rejects never
    /// corrupts the snapshot.
    ///
    /// # Errors
    ///
    /// [`LunchRouletteError::NotEnoughPlayers`] with fewer than two known
    /// players.
    pub fn start(&self) -> Result<ClientCommand> {
        if self.snapshot.players.len() < 2 {
            return Err(LunchRouletteError::NotEnoughPlayers);
        }
        Ok(ClientCommand::StartGame {
            room_id: self.room_id.clone(),
            players: self.snapshot.players.iter().cloned().collect(),
        })
    }

    /// Intent: spin the roulette.
    ///
    /// Marks a spin as pending so a second click before the server's
    /// `SPINED` response cannot produce a duplicate send.
    ///
    /// # Errors
    ///
    /// [`LunchRouletteError::NoActiveGame`] outside the spinning phase;
    /// [`LunchRouletteError::SpinUnavailable`] if the local participant
    /// already has a score or a spin is already in flight.
    pub fn spin(&mut self) -> Result<ClientCommand> {
        if self.phase() != GamePhase::Spinning {
            return Err(LunchRouletteError::NoActiveGame);
        }
        if self.spin_pending || self.snapshot.scores.contains_key(&self.player) {
            return Err(LunchRouletteError::SpinUnavailable);
        }
        self.spin_pending = true;
        Ok(ClientCommand::Spin {
            player: self.player.clone(),
        })
    }

    /// Update the local meal-entry draft.
    pub fn set_meal_draft(&mut self, amount: f64, currency: impl Into<String>) {
        self.snapshot.meal_amount = amount;
        self.snapshot.meal_currency = currency.into();
    }

    /// Intent: submit the drafted meal cost.
    ///
    /// Optimistically marks the local participant as submitted — safe
    /// because this same flag blocks resubmission, and the server's
    /// `MEAL_SUBMITTED` echo converges to the same value.
    ///
    /// # Errors
    ///
    /// [`LunchRouletteError::NoActiveGame`] outside the meal-collection
    /// phase; [`LunchRouletteError::MealAlreadySubmitted`] on a repeat.
    pub fn submit_meal(&mut self) -> Result<ClientCommand> {
        if self.phase() != GamePhase::MealCollection || self.snapshot.game_id.is_empty() {
            return Err(LunchRouletteError::NoActiveGame);
        }
        if self
            .snapshot
            .meal_submitted
            .get(&self.player)
            .copied()
            .unwrap_or(false)
        {
            return Err(LunchRouletteError::MealAlreadySubmitted);
        }
        self.snapshot
            .meal_submitted
            .insert(self.player.clone(), true);
        Ok(ClientCommand::SubmitMeal {
            player: self.player.clone(),
            meal: MealPrice {
                amount: self.snapshot.meal_amount,
                currency: self.snapshot.meal_currency.clone(),
            },
            game_id: self.snapshot.game_id.clone(),
        })
    }

    // ── Event reduction ─────────────────────────────────────────────

    /// Connectivity input from the connection manager.
    ///
    /// A disconnect clears the spin-pending guard: any spin in flight was
    /// lost with the connection, and the post-reconnect resync will say
    /// whether it landed.
    pub fn handle_connection_change(&mut self, connected: bool) {
        if !connected {
            self.spin_pending = false;
        }
    }

    /// Reduce one server event into the snapshot, returning any commands
    /// or lifecycle transitions it produced.
    ///
    /// Unknown participants and duplicate terminal events are no-ops —
    /// the authoritative resync events correct any divergence.
    pub fn apply(&mut self, event: &ServerEvent) -> Vec<SessionUpdate> {
        match event {
            ServerEvent::PlayerList { players } => {
                // Membership reconciliation only: game-progress fields are
                // untouched, so a join/leave mid-game cannot corrupt them.
                self.snapshot.players = players.iter().cloned().collect();
                Vec::new()
            }
            ServerEvent::GameStarted { game_id, .. } => {
                self.snapshot.game_id = game_id.clone();
                self.snapshot.started = true;
                self.snapshot.scores.clear();
                self.snapshot.meal_submitted.clear();
                self.snapshot.loser = None;
                self.snapshot.winners.clear();
                self.snapshot.meal_amount = 0.0;
                self.snapshot.meal_currency = DEFAULT_MEAL_CURRENCY.into();
                self.spin_pending = false;
                self.completed = false;
                debug!(game_id = %game_id, "game started");
                Vec::new()
            }
            ServerEvent::Spined { player, score } => self.apply_spin(player, *score),
            ServerEvent::GameEnded { loser, winners, .. } => {
                // Both-or-neither: assigned together from the one event.
                self.snapshot.loser = Some(loser.clone());
                self.snapshot.winners = winners.clone();
                debug!(loser = %loser, "round resolved");
                Vec::new()
            }
            ServerEvent::MealSubmitted { player, .. } => {
                // Idempotent against the optimistic local mark.
                self.snapshot.meal_submitted.insert(player.clone(), true);
                Vec::new()
            }
            ServerEvent::AllMealsSubmitted { .. } => {
                if self.completed {
                    // Duplicate terminal event.
                    return Vec::new();
                }
                self.completed = true;
                self.snapshot = GameSnapshot::empty();
                self.spin_pending = false;
                vec![SessionUpdate::Completed]
            }
            ServerEvent::GameState(state) => {
                self.snapshot.replace_from(state);
                self.spin_pending = false;
                debug!("applied full-state resync");
                Vec::new()
            }
            ServerEvent::Rejoin(payload) => {
                if payload.player == self.player {
                    // Own-name rejoin is a full-state replace — this is how
                    // the client recovers after reconnecting mid-game.
                    self.snapshot.replace_from(&payload.state);
                    self.spin_pending = false;
                } else {
                    // Incremental join for anyone else.
                    self.snapshot.players.insert(payload.player.clone());
                }
                Vec::new()
            }
            ServerEvent::UserDisjoined { player } => {
                self.snapshot.players.remove(player);
                Vec::new()
            }
            ServerEvent::GameReset { .. } => {
                self.snapshot = GameSnapshot::empty();
                self.spin_pending = false;
                self.completed = false;
                debug!("game state reset");
                Vec::new()
            }
            ServerEvent::Error { message } => {
                warn!(%message, "server reported an error");
                Vec::new()
            }
        }
    }

    fn apply_spin(&mut self, player: &str, score: i32) -> Vec<SessionUpdate> {
        if !self.snapshot.players.contains(player) {
            debug!(%player, "ignoring spin for unknown participant");
            return Vec::new();
        }
        if player == self.player {
            self.spin_pending = false;
        }
        if self.snapshot.scores.contains_key(player) {
            // At most one recorded score per participant per game; the
            // local participant's own entry is never overwritten.
            debug!(%player, "ignoring duplicate spin");
            return Vec::new();
        }
        self.snapshot.scores.insert(player.to_owned(), score);

        // Client-initiated end trigger: the recording that completes the
        // player set fires exactly once, because duplicates are dropped
        // above. Several clients may observe completion independently; the
        // server deduplicates END_GAME by game id.
        let all_spun = self
            .snapshot
            .players
            .iter()
            .all(|p| self.snapshot.scores.contains_key(p));
        if all_spun {
            debug!("all players have spun, requesting round resolution");
            return vec![SessionUpdate::Command(ClientCommand::EndGame {
                room_id: self.room_id.clone(),
                game_id: self.snapshot.game_id.clone(),
                scores: self.snapshot.scores.clone(),
            })];
        }
        Vec::new()
    }
}

impl std::fmt::Debug for GameSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameSession")
            .field("room_id", &self.room_id)
            .field("player", &self.player)
            .field("phase", &self.phase())
            .field("spin_pending", &self.spin_pending)
            .finish()
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::protocol::RejoinPayload;

    fn session_with_players(players: &[&str]) -> GameSession {
        let mut session = GameSession::new("room-1", "alice");
        session.apply(&ServerEvent::PlayerList {
            players: players.iter().map(ToString::to_string).collect(),
        });
        session
    }

    fn started_session(players: &[&str]) -> GameSession {
        let mut session = session_with_players(players);
        session.apply(&ServerEvent::GameStarted {
            message: String::new(),
            game_id: "g1".into(),
        });
        session
    }

    fn spined(player: &str, score: i32) -> ServerEvent {
        ServerEvent::Spined {
            player: player.into(),
            score,
        }
    }

    fn full_state(players: &[&str]) -> GameStatePayload {
        GameStatePayload {
            game_started: true,
            game_ended: false,
            game_id: "g1".into(),
            players: players.iter().map(ToString::to_string).collect(),
            loser: None,
            winners: Vec::new(),
            meal_submitted: BTreeMap::new(),
            scores: BTreeMap::new(),
        }
    }

    // ── Phases and intents ──────────────────────────────────────────

    #[test]
    fn new_session_is_in_lobby() {
        let session = GameSession::new("room-1", "alice");
        assert_eq!(session.phase(), GamePhase::Lobby);
        assert!(session.snapshot().players.is_empty());
        assert!(session.snapshot().game_id.is_empty());
    }

    #[test]
    fn start_requires_two_players() {
        let session = session_with_players(&["alice"]);
        assert!(matches!(
            session.start(),
            Err(LunchRouletteError::NotEnoughPlayers)
        ));

        let session = session_with_players(&["alice", "bob"]);
        let cmd = session.start().unwrap();
        assert_eq!(
            cmd,
            ClientCommand::StartGame {
                room_id: "room-1".into(),
                players: vec!["alice".into(), "bob".into()],
            }
        );
    }

    #[test]
    fn start_does_not_transition_locally() {
        let session = session_with_players(&["alice", "bob"]);
        let _ = session.start().unwrap();
        // Still the lobby: the server's GAME_STARTED is authoritative.
        assert_eq!(session.phase(), GamePhase::Lobby);
    }

    #[test]
    fn game_started_resets_progress_whatever_the_prior_state() {
        let mut session = started_session(&["alice", "bob"]);
        session.apply(&spined("alice", 10));
        session.apply(&spined("bob", 3));
        session.apply(&ServerEvent::GameEnded {
            message: String::new(),
            loser: "bob".into(),
            winners: vec!["alice".into()],
        });
        session.apply(&ServerEvent::MealSubmitted {
            message: String::new(),
            player: "alice".into(),
            meal: None,
        });

        session.apply(&ServerEvent::GameStarted {
            message: String::new(),
            game_id: "g2".into(),
        });

        let snap = session.snapshot();
        assert_eq!(snap.game_id, "g2");
        assert!(snap.started);
        assert!(snap.scores.is_empty());
        assert!(snap.meal_submitted.is_empty());
        assert!(snap.loser.is_none());
        assert!(snap.winners.is_empty());
        assert_eq!(session.phase(), GamePhase::Spinning);
    }

    #[test]
    fn spin_guards_against_duplicates() {
        let mut session = started_session(&["alice", "bob"]);

        let cmd = session.spin().unwrap();
        assert_eq!(
            cmd,
            ClientCommand::Spin {
                player: "alice".into()
            }
        );
        assert!(session.spin_pending());

        // Second click while the first is in flight.
        assert!(matches!(
            session.spin(),
            Err(LunchRouletteError::SpinUnavailable)
        ));

        // Server responds; pending clears, but the recorded score still
        // blocks another spin this game.
        session.apply(&spined("alice", 42));
        assert!(!session.spin_pending());
        assert!(matches!(
            session.spin(),
            Err(LunchRouletteError::SpinUnavailable)
        ));
    }

    #[test]
    fn spin_outside_spinning_phase_is_rejected() {
        let mut session = session_with_players(&["alice", "bob"]);
        assert!(matches!(session.spin(), Err(LunchRouletteError::NoActiveGame)));
    }

    // ── END_GAME emission ───────────────────────────────────────────

    #[test]
    fn emits_exactly_one_end_game_regardless_of_arrival_order() {
        // Every permutation of three spins produces exactly one END_GAME
        // carrying all three scores.
        let orders: [[(&str, i32); 3]; 6] = [
            [("alice", 10), ("bob", 3), ("carol", 7)],
            [("alice", 10), ("carol", 7), ("bob", 3)],
            [("bob", 3), ("alice", 10), ("carol", 7)],
            [("bob", 3), ("carol", 7), ("alice", 10)],
            [("carol", 7), ("alice", 10), ("bob", 3)],
            [("carol", 7), ("bob", 3), ("alice", 10)],
        ];

        for order in orders {
            let mut session = started_session(&["alice", "bob", "carol"]);
            let mut end_games = Vec::new();
            for (player, score) in order {
                for update in session.apply(&spined(player, score)) {
                    end_games.push(update);
                }
            }
            assert_eq!(end_games.len(), 1, "order {order:?}");
            let expected: BTreeMap<String, i32> = [
                ("alice".to_string(), 10),
                ("bob".to_string(), 3),
                ("carol".to_string(), 7),
            ]
            .into();
            assert_eq!(
                end_games[0],
                SessionUpdate::Command(ClientCommand::EndGame {
                    room_id: "room-1".into(),
                    game_id: "g1".into(),
                    scores: expected,
                })
            );
        }
    }

    #[test]
    fn duplicate_spins_do_not_retrigger_end_game() {
        let mut session = started_session(&["alice", "bob"]);
        assert!(session.apply(&spined("alice", 10)).is_empty());
        assert_eq!(session.apply(&spined("bob", 3)).len(), 1);
        // A replayed SPINED for an already-scored player is a no-op.
        assert!(session.apply(&spined("bob", 99)).is_empty());
        assert_eq!(session.snapshot().scores["bob"], 3);
    }

    #[test]
    fn spin_for_unknown_participant_is_ignored() {
        let mut session = started_session(&["alice", "bob"]);
        assert!(session.apply(&spined("mallory", 50)).is_empty());
        assert!(session.snapshot().scores.is_empty());
    }

    #[test]
    fn own_score_is_never_overwritten_within_a_game() {
        let mut session = started_session(&["alice", "bob"]);
        session.apply(&spined("alice", 10));
        session.apply(&spined("alice", 90));
        assert_eq!(session.snapshot().scores["alice"], 10);
    }

    // ── Round resolution and meals ──────────────────────────────────

    #[test]
    fn loser_and_winners_set_atomically() {
        let mut session = started_session(&["alice", "bob", "carol"]);
        let snap = session.snapshot();
        assert!(snap.loser.is_none() && snap.winners.is_empty());

        session.apply(&ServerEvent::GameEnded {
            message: String::new(),
            loser: "bob".into(),
            winners: vec!["alice".into(), "carol".into()],
        });

        let snap = session.snapshot();
        assert_eq!(snap.loser.as_deref(), Some("bob"));
        assert_eq!(snap.winners, vec!["alice".to_string(), "carol".to_string()]);
        assert_eq!(session.phase(), GamePhase::MealCollection);
    }

    #[test]
    fn full_round_scenario() {
        // Players {alice,bob,carol} join, the game runs to resolution.
        let mut session = started_session(&["alice", "bob", "carol"]);

        session.apply(&spined("alice", 10));
        session.apply(&spined("bob", 3));
        let updates = session.apply(&spined("carol", 7));
        assert!(matches!(
            updates.as_slice(),
            [SessionUpdate::Command(ClientCommand::EndGame { .. })]
        ));

        session.apply(&ServerEvent::GameEnded {
            message: String::new(),
            loser: "bob".into(),
            winners: vec!["alice".into(), "carol".into()],
        });

        assert_eq!(session.phase(), GamePhase::MealCollection);
        assert_eq!(session.snapshot().loser.as_deref(), Some("bob"));
    }

    #[test]
    fn meal_submission_is_optimistic_and_guarded() {
        let mut session = started_session(&["alice", "bob"]);
        session.apply(&spined("alice", 10));
        session.apply(&spined("bob", 3));
        session.apply(&ServerEvent::GameEnded {
            message: String::new(),
            loser: "bob".into(),
            winners: vec!["alice".into()],
        });

        session.set_meal_draft(12.5, "EUR");
        let cmd = session.submit_meal().unwrap();
        assert_eq!(
            cmd,
            ClientCommand::SubmitMeal {
                player: "alice".into(),
                meal: MealPrice {
                    amount: 12.5,
                    currency: "EUR".into(),
                },
                game_id: "g1".into(),
            }
        );
        // Optimistically marked before any server echo.
        assert_eq!(session.snapshot().meal_submitted["alice"], true);

        // Locally blocked from resubmitting.
        assert!(matches!(
            session.submit_meal(),
            Err(LunchRouletteError::MealAlreadySubmitted)
        ));

        // The server echo converges to the same value.
        session.apply(&ServerEvent::MealSubmitted {
            message: String::new(),
            player: "alice".into(),
            meal: None,
        });
        assert_eq!(session.snapshot().meal_submitted["alice"], true);
        assert_eq!(session.snapshot().meal_submitted.len(), 1);
    }

    #[test]
    fn meal_submitted_event_is_idempotent() {
        let mut session = started_session(&["alice", "bob"]);
        let event = ServerEvent::MealSubmitted {
            message: String::new(),
            player: "bob".into(),
            meal: None,
        };
        session.apply(&event);
        session.apply(&event);
        assert_eq!(session.snapshot().meal_submitted["bob"], true);
        assert_eq!(session.snapshot().meal_submitted.len(), 1);
    }

    #[test]
    fn submit_meal_outside_collection_phase_is_rejected() {
        let mut session = started_session(&["alice", "bob"]);
        assert!(matches!(
            session.submit_meal(),
            Err(LunchRouletteError::NoActiveGame)
        ));
    }

    // ── Terminal and reset ──────────────────────────────────────────

    #[test]
    fn all_meals_submitted_completes_the_membership() {
        let mut session = started_session(&["alice", "bob"]);
        let updates = session.apply(&ServerEvent::AllMealsSubmitted {
            message: String::new(),
        });
        assert_eq!(updates, vec![SessionUpdate::Completed]);
        assert_eq!(session.phase(), GamePhase::Completed);

        // A duplicate terminal event is a no-op.
        let updates = session.apply(&ServerEvent::AllMealsSubmitted {
            message: String::new(),
        });
        assert!(updates.is_empty());
    }

    #[test]
    fn game_reset_clears_everything_from_any_state() {
        let mut session = started_session(&["alice", "bob"]);
        session.apply(&spined("alice", 10));
        session.apply(&ServerEvent::GameEnded {
            message: String::new(),
            loser: "alice".into(),
            winners: vec!["bob".into()],
        });

        session.apply(&ServerEvent::GameReset {
            message: String::new(),
        });

        assert_eq!(session.phase(), GamePhase::Lobby);
        assert_eq!(*session.snapshot(), GameSnapshot::empty());
    }

    // ── Membership reconciliation and resync ────────────────────────

    #[test]
    fn player_list_never_touches_progress_fields() {
        let mut session = started_session(&["alice", "bob"]);
        session.apply(&spined("alice", 10));

        session.apply(&ServerEvent::PlayerList {
            players: vec!["alice".into(), "bob".into(), "carol".into()],
        });

        let snap = session.snapshot();
        assert_eq!(snap.players.len(), 3);
        assert_eq!(snap.scores["alice"], 10);
        assert!(snap.started);
    }

    #[test]
    fn user_disjoined_removes_only_the_player() {
        let mut session = started_session(&["alice", "bob", "carol"]);
        session.apply(&spined("bob", 3));

        session.apply(&ServerEvent::UserDisjoined {
            player: "carol".into(),
        });

        let snap = session.snapshot();
        assert!(!snap.players.contains("carol"));
        assert_eq!(snap.scores["bob"], 3);
    }

    #[test]
    fn own_rejoin_fully_replaces_the_snapshot() {
        let mut session = started_session(&["alice", "bob"]);
        session.apply(&spined("alice", 10));

        let mut state = full_state(&["alice", "bob", "carol"]);
        state.game_id = "g7".into();
        state.scores = [("bob".to_string(), 5)].into();
        state.loser = Some("bob".into());
        state.winners = vec!["alice".into(), "carol".into()];
        state.meal_submitted = [("carol".to_string(), true)].into();

        session.apply(&ServerEvent::Rejoin(Box::new(RejoinPayload {
            player: "alice".into(),
            state: state.clone(),
        })));

        let snap = session.snapshot();
        assert_eq!(snap.game_id, "g7");
        assert_eq!(snap.players.len(), 3);
        assert_eq!(snap.scores, state.scores);
        assert_eq!(snap.loser.as_deref(), Some("bob"));
        assert_eq!(snap.meal_submitted, state.meal_submitted);
        // The stale local score for alice is gone — full replace.
        assert!(!snap.scores.contains_key("alice"));
    }

    #[test]
    fn other_rejoin_only_adds_to_players() {
        // REJOIN for a non-local name mid-meal-collection: players gains
        // the name, progress fields are untouched.
        let mut session = started_session(&["alice", "bob"]);
        session.apply(&spined("alice", 10));
        session.apply(&spined("bob", 3));
        session.apply(&ServerEvent::GameEnded {
            message: String::new(),
            loser: "bob".into(),
            winners: vec!["alice".into()],
        });
        session.apply(&ServerEvent::MealSubmitted {
            message: String::new(),
            player: "alice".into(),
            meal: None,
        });
        let before = session.snapshot().clone();

        session.apply(&ServerEvent::Rejoin(Box::new(RejoinPayload {
            player: "dana".into(),
            state: GameStatePayload::default(),
        })));

        let snap = session.snapshot();
        assert!(snap.players.contains("dana"));
        assert_eq!(snap.scores, before.scores);
        assert_eq!(snap.loser, before.loser);
        assert_eq!(snap.meal_submitted, before.meal_submitted);
    }

    #[test]
    fn game_state_resync_fully_replaces_the_snapshot() {
        let mut session = GameSession::new("room-1", "alice");
        let mut state = full_state(&["alice", "bob"]);
        state.scores = [("alice".to_string(), 42)].into();

        session.apply(&ServerEvent::GameState(Box::new(state)));

        let snap = session.snapshot();
        assert!(snap.started);
        assert_eq!(snap.game_id, "g1");
        assert_eq!(snap.scores["alice"], 42);
        assert_eq!(session.phase(), GamePhase::Spinning);
    }

    #[test]
    fn restored_snapshot_is_superseded_by_resync() {
        let mut stale = GameSnapshot::empty();
        stale.players = ["alice".to_string(), "ghost".to_string()].into();
        stale.started = true;
        stale.game_id = "old".into();
        stale.scores = [("ghost".to_string(), 1)].into();

        let mut session = GameSession::with_snapshot("room-1", "alice", stale);
        assert_eq!(session.phase(), GamePhase::Spinning);

        session.apply(&ServerEvent::GameState(Box::new(full_state(&[
            "alice", "bob",
        ]))));

        let snap = session.snapshot();
        assert_eq!(snap.game_id, "g1");
        assert!(!snap.players.contains("ghost"));
        assert!(snap.scores.is_empty());
    }

    // ── Connectivity ────────────────────────────────────────────────

    #[test]
    fn disconnect_clears_stale_spin_pending() {
        let mut session = started_session(&["alice", "bob"]);
        let _ = session.spin().unwrap();
        assert!(session.spin_pending());

        session.handle_connection_change(false);
        assert!(!session.spin_pending());

        // After the resync the user may spin again if no score landed.
        session.handle_connection_change(true);
        session.apply(&ServerEvent::GameState(Box::new(full_state(&[
            "alice", "bob",
        ]))));
        assert!(session.spin().is_ok());
    }
}
