//! Session driver: wires a room connection to a game session.
//!
//! [`run_session`] consumes the connection's ordered event stream, reduces
//! each event through the [`GameSession`], forwards any commands the
//! reducer emits, and persists the snapshot at the moments that matter for
//! crash recovery. It owns the connection for its whole life and returns
//! only on a terminal outcome.

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::connection::RoomConnection;
use crate::error::{LunchRouletteError, Result};
use crate::event::RoomEvent;
use crate::game::{GameSession, SessionUpdate};
use crate::snapshot::SnapshotStore;

/// Drive one room membership to completion.
///
/// Runs until either the game-and-payment cycle completes (the connection
/// is shut down, the saved snapshot cleared, and `Ok(())` returned) or the
/// connection manager exhausts its reconnect attempts (the snapshot is
/// saved for a later manual reload and
/// [`LunchRouletteError::RetriesExhausted`] returned).
///
/// Commands that fail to send because the connection is momentarily down
/// are dropped with a log line; the post-reconnect resync reconverges the
/// state, so retrying stale commands would only duplicate server work.
///
/// # Errors
///
/// [`LunchRouletteError::RetriesExhausted`] when the manager gives up
/// reconnecting; [`LunchRouletteError::TransportClosed`] if the event
/// stream ends without either terminal outcome.
pub async fn run_session(
    mut connection: RoomConnection,
    mut events: mpsc::Receiver<RoomEvent>,
    session: &mut GameSession,
    store: &SnapshotStore,
) -> Result<()> {
    let room_id = connection.room_id().to_owned();

    while let Some(event) = events.recv().await {
        match event {
            RoomEvent::ConnectionChanged(connected) => {
                debug!(connected, "connectivity changed");
                session.handle_connection_change(connected);
                if !connected {
                    // Persist on every drop so an app crash during the
                    // reconnect window still has a fresh save.
                    if let Err(err) = store.save(&room_id, session.snapshot()) {
                        warn!(%err, "failed to save snapshot on disconnect");
                    }
                }
            }
            RoomEvent::Server(server_event) => {
                for update in session.apply(&server_event) {
                    match update {
                        SessionUpdate::Command(command) => {
                            if let Err(err) = connection.send(command) {
                                warn!(%err, "dropping command emitted while disconnected");
                            }
                        }
                        SessionUpdate::Completed => {
                            info!(room_id, "game cycle completed");
                            connection.shutdown().await;
                            store.clear(&room_id);
                            return Ok(());
                        }
                    }
                }
            }
            RoomEvent::RetriesExhausted => {
                warn!(room_id, "reconnect attempts exhausted, saving snapshot");
                if let Err(err) = store.save(&room_id, session.snapshot()) {
                    warn!(%err, "failed to save snapshot after giving up");
                }
                connection.shutdown().await;
                return Err(LunchRouletteError::RetriesExhausted);
            }
        }
    }

    // The manager's loop always emits a terminal event before closing the
    // channel; reaching here means it was torn down externally.
    Err(LunchRouletteError::TransportClosed)
}
