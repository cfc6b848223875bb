//! Transport implementations for the lunch roulette room channel.
//!
//! Concrete [`Transport`](crate::Transport) implementations live behind
//! feature gates. Enable the corresponding Cargo feature to pull in a
//! transport:
//!
//! | Feature                | Transport              |
//! |------------------------|------------------------|
//! | `transport-websocket`  | [`WebSocketTransport`] |
//!
//! # Example
//!
//! ```rust,ignore
//! # async fn example() -> Result<(), lunch_roulette_client::LunchRouletteError> {
//! use lunch_roulette_client::{Transport, WebSocketTransport};
//!
//! let mut ws = WebSocketTransport::connect(
//!     "ws://localhost:8000/v1/ws/rooms/lunch-42/ws?player=alice",
//! )
//! .await?;
//! ws.send(r#"{"type":"REJOIN","player":"alice","roomId":"lunch-42"}"#.to_string())
//!     .await?;
//!
//! if let Some(Ok(msg)) = ws.recv().await {
//!     println!("server said: {msg}");
//! }
//!
//! ws.close().await?;
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "transport-websocket")]
pub mod websocket;

#[cfg(feature = "transport-websocket")]
pub use websocket::{WebSocketConnector, WebSocketTransport};
