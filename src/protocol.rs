//! Wire-compatible protocol types for the lunch roulette room channel.
//!
//! Every type in this module produces identical JSON to the server's message
//! models. Messages are flat, internally tagged objects with a
//! `SCREAMING_SNAKE_CASE` `type` field. The server mixes field-name
//! conventions on the wire (`roomId`, `game_id`, `gameStarted`); those
//! spellings are preserved here with explicit renames rather than
//! normalized, so the JSON matches byte for byte.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A meal cost entry: amount plus currency code (e.g. `"USD"`, `"Kč"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealPrice {
    pub amount: f64,
    pub currency: String,
}

// ── Client → server ─────────────────────────────────────────────────

/// Commands sent from the client to the room channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientCommand {
    /// Announce presence in the room and request an authoritative resync.
    /// Sent automatically by the connection manager after every successful
    /// (re)connect.
    Rejoin {
        player: String,
        #[serde(rename = "roomId")]
        room_id: String,
    },
    /// Ask the server to start a new game for the given players.
    StartGame {
        #[serde(rename = "roomId")]
        room_id: String,
        players: Vec<String>,
    },
    /// Request a roulette spin for the local participant.
    Spin { player: String },
    /// Submit the local participant's meal cost for the finished game.
    SubmitMeal {
        player: String,
        meal: MealPrice,
        #[serde(rename = "game_id")]
        game_id: String,
    },
    /// Report that every player has spun; asks the server to resolve the
    /// round. May be sent concurrently by several clients — the server
    /// deduplicates by game id.
    EndGame {
        #[serde(rename = "roomId")]
        room_id: String,
        #[serde(rename = "game_id")]
        game_id: String,
        scores: BTreeMap<String, i32>,
    },
}

// ── Server → client ─────────────────────────────────────────────────

/// Full game state as pushed by the server on a resync.
///
/// Also embedded (flattened) in an own-name [`ServerEvent::Rejoin`], where
/// every field may be absent for incremental joins — hence the defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameStatePayload {
    #[serde(rename = "gameStarted", default)]
    pub game_started: bool,
    #[serde(rename = "gameEnded", default)]
    pub game_ended: bool,
    #[serde(rename = "gameId", default)]
    pub game_id: String,
    #[serde(default)]
    pub players: Vec<String>,
    #[serde(default)]
    pub loser: Option<String>,
    #[serde(default)]
    pub winners: Vec<String>,
    #[serde(rename = "mealSubmitted", default)]
    pub meal_submitted: BTreeMap<String, bool>,
    #[serde(default)]
    pub scores: BTreeMap<String, i32>,
}

/// Payload for the server-issued `REJOIN` event.
///
/// For the local participant's own name this carries the full game state
/// (flattened alongside `player`) and is treated as a full-state replace.
/// For any other name only `player` is meaningful — an incremental join.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejoinPayload {
    pub player: String,
    #[serde(flatten)]
    pub state: GameStatePayload,
}

/// Events broadcast by the server to room members.
///
/// Unknown `type` tags fail deserialization; the connection manager logs
/// and skips such messages without dropping the connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerEvent {
    /// Authoritative replacement for the room's player roster.
    PlayerList { players: Vec<String> },
    /// A new game started; all per-game progress must be cleared.
    GameStarted {
        #[serde(default)]
        message: String,
        #[serde(rename = "game_id")]
        game_id: String,
    },
    /// A participant's roulette spin resolved to a score.
    Spined { player: String, score: i32 },
    /// A participant submitted their meal cost.
    MealSubmitted {
        #[serde(default)]
        message: String,
        player: String,
        #[serde(default)]
        meal: Option<MealPrice>,
    },
    /// A participant left the room.
    UserDisjoined { player: String },
    /// The server resolved the round: the loser pays, everyone else wins.
    /// `loser` and `winners` always arrive together in this one event.
    GameEnded {
        #[serde(default)]
        message: String,
        loser: String,
        winners: Vec<String>,
    },
    /// Terminal event: every participant's meal is in. No further traffic
    /// is expected for this room/game lifecycle.
    AllMealsSubmitted {
        #[serde(default)]
        message: String,
    },
    /// Proactive full-state push, e.g. right after the client's automatic
    /// post-reconnect `REJOIN`.
    GameState(Box<GameStatePayload>),
    /// A participant (re)joined. See [`RejoinPayload`] for own-name vs
    /// other-name semantics.
    Rejoin(Box<RejoinPayload>),
    /// Explicit server-issued reset back to an empty lobby.
    GameReset {
        #[serde(default)]
        message: String,
    },
    /// Free-form error notification from the server.
    Error { message: String },
}
