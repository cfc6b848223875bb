//! Error types for the lunch roulette client.

use thiserror::Error;

/// Errors that can occur when using the lunch roulette client.
#[derive(Debug, Error)]
pub enum LunchRouletteError {
    /// Failed to send a message through the transport.
    #[error("transport send error: {0}")]
    TransportSend(String),

    /// Failed to receive a message from the transport.
    #[error("transport receive error: {0}")]
    TransportReceive(String),

    /// The transport connection was closed unexpectedly.
    #[error("transport connection closed")]
    TransportClosed,

    /// Failed to serialize or deserialize a protocol message.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A send was attempted while the room connection is down. The message
    /// is dropped, never queued; authoritative state is recovered through
    /// the automatic `REJOIN` resync after reconnection.
    #[error("not connected to room")]
    NotConnected,

    /// The reconnect ceiling was exhausted and the connection manager gave
    /// up. Recovery is left to the caller (typically a full reload of the
    /// room view).
    #[error("reconnect attempts exhausted")]
    RetriesExhausted,

    /// A game can only be started with at least two players in the room.
    #[error("at least two players are required to start a game")]
    NotEnoughPlayers,

    /// The local participant already has a recorded score for this game,
    /// or a spin request is already in flight.
    #[error("spin unavailable: score already recorded or spin in flight")]
    SpinUnavailable,

    /// The local participant already submitted a meal cost for this game.
    #[error("meal already submitted")]
    MealAlreadySubmitted,

    /// The intent requires an active game but none is in progress.
    #[error("no active game")]
    NoActiveGame,

    /// An operation timed out.
    #[error("operation timed out")]
    Timeout,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized [`Result`] type for lunch roulette client operations.
pub type Result<T> = std::result::Result<T, LunchRouletteError>;
