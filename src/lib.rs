//! # Lunch Roulette Client
//!
//! Transport-agnostic Rust client for the lunch roulette party-game
//! protocol.
//!
//! The crate splits one room membership into three cooperating pieces:
//!
//! - [`RoomConnection`] — a resilient connection manager. It dials the room
//!   channel through a [`Connector`], announces presence with an automatic
//!   `REJOIN` after every (re)connect, retries drops with a linear backoff
//!   up to a fixed ceiling, and delivers decoded traffic as an ordered
//!   [`RoomEvent`] stream.
//! - [`GameSession`] — a synchronous state machine that reduces server
//!   events and local intents (start, spin, submit meal) into a
//!   [`GameSnapshot`] and the outbound commands they require.
//! - [`SnapshotStore`] — per-room persistence of the snapshot, so an app
//!   restart mid-game resumes with a plausible view until the
//!   post-reconnect resync replaces it.
//!
//! [`run_session`] wires the three together and drives a membership to its
//! terminal outcome.
//!
//! ## Features
//!
//! - **Transport-agnostic** — implement [`Transport`] and [`Connector`]
//!   for any backend
//! - **Wire-compatible** — all protocol types match the server's JSON
//!   format exactly, mixed field-name spellings included
//! - **WebSocket built-in** — the default `transport-websocket` feature
//!   provides [`WebSocketTransport`] and [`WebSocketConnector`]
//! - **Event-driven** — consume typed [`RoomEvent`]s from a channel
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lunch_roulette_client::{
//!     run_session, ConnectionConfig, GameSession, RoomConnection, SnapshotStore,
//!     WebSocketConnector,
//! };
//!
//! # async fn example() -> Result<(), lunch_roulette_client::LunchRouletteError> {
//! let connector = WebSocketConnector::new("ws://localhost:8000", "lunch-42", "alice");
//! let config = ConnectionConfig::new("lunch-42", "alice");
//! let (connection, events) = RoomConnection::open(connector, config);
//!
//! let store = SnapshotStore::new("./state");
//! let mut session =
//!     GameSession::with_snapshot("lunch-42", "alice", store.restore("lunch-42"));
//!
//! run_session(connection, events, &mut session, &store).await?;
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod error;
pub mod event;
pub mod game;
pub mod protocol;
pub mod session;
pub mod snapshot;
pub mod transport;
pub mod transports;

// Re-export primary types for ergonomic imports.
pub use connection::{ConnectionConfig, RoomConnection};
pub use error::LunchRouletteError;
pub use event::RoomEvent;
pub use game::{GamePhase, GameSession, GameSnapshot, SessionUpdate};
pub use protocol::{ClientCommand, GameStatePayload, MealPrice, RejoinPayload, ServerEvent};
pub use session::run_session;
pub use snapshot::SnapshotStore;
pub use transport::{Connector, Transport};

#[cfg(feature = "transport-websocket")]
pub use transports::{WebSocketConnector, WebSocketTransport};
