//! Transport abstraction for the lunch roulette room channel.
//!
//! The [`Transport`] trait defines a bidirectional text message channel
//! between the client and the room server. The protocol uses JSON text
//! messages, so every transport implementation must handle message framing
//! internally (e.g. WebSocket frames, length-prefixed TCP).
//!
//! Unlike a one-shot client, the connection manager reconnects after drops,
//! so it cannot be handed a single connected transport. The [`Connector`]
//! trait is the factory seam: each call to [`Connector::connect`] must
//! produce a fresh, connected transport for the same room membership.
//!
//! # Implementing a Custom Transport
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use lunch_roulette_client::error::LunchRouletteError;
//! use lunch_roulette_client::transport::Transport;
//!
//! struct MyTransport { /* ... */ }
//!
//! #[async_trait]
//! impl Transport for MyTransport {
//!     async fn send(&mut self, message: String) -> Result<(), LunchRouletteError> {
//!         // Send the JSON text message over your transport
//!         todo!()
//!     }
//!
//!     async fn recv(&mut self) -> Option<Result<String, LunchRouletteError>> {
//!         // Receive the next JSON text message
//!         // Return None when the connection is closed cleanly
//!         todo!()
//!     }
//!
//!     async fn close(&mut self) -> Result<(), LunchRouletteError> {
//!         // Gracefully shut down the connection
//!         todo!()
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::error::LunchRouletteError;

/// A bidirectional text message transport for one live room connection.
///
/// Implementors shuttle serialized JSON strings between the client and
/// server. Each call to [`send`](Transport::send) transmits one complete
/// JSON message; each call to [`recv`](Transport::recv) returns one.
///
/// # Cancel Safety
///
/// The [`recv`](Transport::recv) method **MUST** be cancel-safe because it
/// is used inside `tokio::select!`. If `recv` is cancelled before
/// completion, calling it again must not lose data.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Send a JSON text message to the server.
    ///
    /// # Errors
    ///
    /// Returns [`LunchRouletteError::TransportSend`] if the message could
    /// not be sent (e.g. connection broken, write buffer full).
    async fn send(&mut self, message: String) -> Result<(), LunchRouletteError>;

    /// Receive the next JSON text message from the server.
    ///
    /// Returns:
    /// - `Some(Ok(text))` — a complete message was received
    /// - `Some(Err(e))` — a transport error occurred
    /// - `None` — the connection was closed cleanly by the server
    ///
    /// # Cancel Safety
    ///
    /// This method **MUST** be cancel-safe (see [trait documentation](Transport)).
    async fn recv(&mut self) -> Option<Result<String, LunchRouletteError>>;

    /// Close the transport connection gracefully.
    ///
    /// # Errors
    ///
    /// Returns an error if the graceful shutdown fails. Implementations
    /// should still release resources even if the close handshake fails.
    async fn close(&mut self) -> Result<(), LunchRouletteError>;
}

/// Factory for establishing (and re-establishing) room transports.
///
/// The connection manager calls [`connect`](Connector::connect) once at
/// startup and again after every unexpected drop, up to its retry ceiling.
/// Implementations carry whatever addressing state they need (URL, room id,
/// participant name) and must target the same room membership every time.
#[async_trait]
pub trait Connector: Send + 'static {
    /// The transport type produced by this connector.
    type Transport: Transport;

    /// Establish a fresh connection to the room channel.
    ///
    /// # Errors
    ///
    /// Returns any transport-level error; the connection manager treats a
    /// failure as one consumed reconnect attempt.
    async fn connect(&mut self) -> Result<Self::Transport, LunchRouletteError>;
}
