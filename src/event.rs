//! Events emitted by the room connection manager to its consumer.
//!
//! [`RoomEvent`] is what comes out of the receiver returned by
//! [`RoomConnection::open`](crate::connection::RoomConnection::open):
//! decoded server traffic interleaved, in order, with connectivity
//! transitions. A single ordered channel replaces the source protocol's
//! per-type listener registry and its separate connection-change observer —
//! consumers dispatch with a `match` on the closed [`ServerEvent`] union.

use crate::protocol::ServerEvent;

/// An event on the room connection's single ordered event channel.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomEvent {
    /// Connectivity transition. Emitted with `true` after every successful
    /// (re)connect (following the automatic `REJOIN` send) and with `false`
    /// after every drop, including the manager's own terminal close.
    ConnectionChanged(bool),
    /// A decoded event from the server.
    Server(ServerEvent),
    /// The reconnect ceiling was exhausted; the manager will make no
    /// further attempts. Terminal — the caller should surface a manual
    /// reload prompt.
    RetriesExhausted,
}

impl From<ServerEvent> for RoomEvent {
    fn from(event: ServerEvent) -> Self {
        Self::Server(event)
    }
}
