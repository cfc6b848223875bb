//! Persistent room connection manager.
//!
//! [`RoomConnection`] owns one live transport to a room's event channel for
//! one participant, reconnecting automatically with linear backoff after
//! unexpected drops. It is a thin handle over a background connection loop
//! task: commands flow in over an unbounded MPSC channel, decoded
//! [`RoomEvent`]s flow out over a bounded channel returned from
//! [`RoomConnection::open`].
//!
//! # Example
//!
//! ```rust,ignore
//! let connector = WebSocketConnector::new("ws://localhost:8000", "room-1", "alice");
//! let config = ConnectionConfig::new("room-1", "alice");
//! let (conn, mut events) = RoomConnection::open(connector, config);
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         RoomEvent::Server(ev) => { /* reduce into the game session */ }
//!         RoomEvent::ConnectionChanged(up) => { /* show reconnecting UI */ }
//!         RoomEvent::RetriesExhausted => break,
//!     }
//! }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::error::{LunchRouletteError, Result};
use crate::event::RoomEvent;
use crate::protocol::{ClientCommand, ServerEvent};
use crate::transport::{Connector, Transport};

/// Default capacity of the bounded event channel.
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Default timeout for the graceful shutdown.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Maximum number of consecutive failed connection attempts before the
/// manager gives up. Matches the room server deployment's expectations.
const MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Per-attempt backoff step: attempt `n` waits `n` times this.
const RETRY_DELAY_STEP: Duration = Duration::from_millis(1000);

/// Ceiling on the backoff delay.
const MAX_RETRY_DELAY: Duration = Duration::from_millis(5000);

/// Backoff delay before reconnect attempt `attempt` (1-indexed):
/// `min(1000ms * attempt, 5000ms)`.
fn retry_delay(attempt: u32) -> Duration {
    MAX_RETRY_DELAY.min(RETRY_DELAY_STEP.saturating_mul(attempt))
}

// ── Configuration ───────────────────────────────────────────────────

/// Configuration for a [`RoomConnection`].
///
/// `room_id` and `player` identify the membership; everything else has
/// sensible defaults.
///
/// # Example
///
/// ```
/// use lunch_roulette_client::connection::ConnectionConfig;
///
/// let config = ConnectionConfig::new("room-1", "alice");
/// assert_eq!(config.room_id, "room-1");
/// assert_eq!(config.event_channel_capacity, 256);
/// ```
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Identifier of the room this connection represents.
    pub room_id: String,
    /// Display name of the local participant.
    pub player: String,
    /// Capacity of the bounded event channel.
    ///
    /// When the consumer cannot keep up with incoming server events, events
    /// are dropped (with a warning logged) to avoid blocking the connection
    /// loop. Connectivity transitions and [`RoomEvent::RetriesExhausted`]
    /// are always delivered regardless of capacity.
    ///
    /// Defaults to **256**. Values below 1 are clamped to 1.
    pub event_channel_capacity: usize,
    /// Timeout for the graceful shutdown.
    ///
    /// When [`RoomConnection::shutdown`] is called, the background loop is
    /// given this much time to close the transport; after that the task is
    /// aborted. Defaults to **1 second**.
    pub shutdown_timeout: Duration,
}

impl ConnectionConfig {
    /// Create a configuration for the given room membership with defaults.
    pub fn new(room_id: impl Into<String>, player: impl Into<String>) -> Self {
        Self {
            room_id: room_id.into(),
            player: player.into(),
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    /// Set the capacity of the bounded event channel.
    #[must_use]
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity.max(1);
        self
    }

    /// Set the timeout for the graceful shutdown.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

// ── Shared state ────────────────────────────────────────────────────

/// Internal shared state between the handle and the connection loop.
struct ConnState {
    connected: AtomicBool,
    exhausted: AtomicBool,
}

impl ConnState {
    fn new() -> Self {
        Self {
            connected: AtomicBool::new(false),
            exhausted: AtomicBool::new(false),
        }
    }
}

// ── Connection handle ───────────────────────────────────────────────

/// Handle to one persistent room connection.
///
/// Created via [`RoomConnection::open`], which spawns the background
/// connection loop and returns this handle together with an event receiver.
///
/// [`send`](RoomConnection::send) is at-most-once by design: a command
/// issued while the connection is down is dropped with
/// [`LunchRouletteError::NotConnected`], never queued or retried. Callers
/// needing delivery rely on the automatic post-reconnect `REJOIN` resync
/// instead.
pub struct RoomConnection {
    /// Sender half of the command channel to the connection loop.
    cmd_tx: mpsc::UnboundedSender<ClientCommand>,
    /// Shared state updated by the connection loop.
    state: Arc<ConnState>,
    /// Handle to the background connection loop task.
    task: Option<tokio::task::JoinHandle<()>>,
    /// Oneshot sender to signal the loop to shut down gracefully.
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    /// Timeout for the graceful shutdown.
    shutdown_timeout: Duration,
    room_id: String,
    player: String,
}

impl RoomConnection {
    /// Open a room connection: spawn the connection loop and immediately
    /// begin connecting through `connector`.
    ///
    /// On every successful (re)connect the loop sends a
    /// [`ClientCommand::Rejoin`] for this membership before any other
    /// traffic — that is the state-recovery mechanism after any network
    /// interruption, including the very first connection.
    ///
    /// # Returns
    ///
    /// A tuple of `(handle, event_receiver)`. The receiver yields
    /// [`RoomEvent`]s until the loop exits (shutdown, terminal event, or
    /// retry-ceiling exhaustion).
    #[must_use = "the event receiver must be used to receive room events"]
    pub fn open(
        connector: impl Connector,
        config: ConnectionConfig,
    ) -> (Self, mpsc::Receiver<RoomEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<ClientCommand>();
        // Clamp capacity to at least 1 (tokio panics on 0).
        let capacity = config.event_channel_capacity.max(1);
        let (event_tx, event_rx) = mpsc::channel::<RoomEvent>(capacity);
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let state = Arc::new(ConnState::new());
        let loop_state = Arc::clone(&state);

        let task = tokio::spawn(connection_loop(
            connector,
            cmd_rx,
            event_tx,
            loop_state,
            shutdown_rx,
            config.room_id.clone(),
            config.player.clone(),
        ));

        let connection = Self {
            cmd_tx,
            state,
            task: Some(task),
            shutdown_tx: Some(shutdown_tx),
            shutdown_timeout: config.shutdown_timeout,
            room_id: config.room_id,
            player: config.player,
        };

        (connection, event_rx)
    }

    /// Send a command to the room channel.
    ///
    /// # Errors
    ///
    /// Returns [`LunchRouletteError::NotConnected`] if the connection is
    /// not currently up. The command is dropped — at-most-once, never
    /// queued.
    pub fn send(&self, command: ClientCommand) -> Result<()> {
        if !self.state.connected.load(Ordering::Acquire) {
            warn!(
                "dropping command while disconnected: {:?}",
                std::mem::discriminant(&command)
            );
            return Err(LunchRouletteError::NotConnected);
        }
        self.cmd_tx
            .send(command)
            .map_err(|_| LunchRouletteError::NotConnected)
    }

    /// Shut down the connection, closing the transport and stopping the
    /// background loop. Idempotent; also cancels any pending reconnect
    /// timer.
    pub async fn shutdown(&mut self) {
        debug!("RoomConnection: shutdown requested");

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        // Await the loop with a timeout. If it doesn't exit in time, abort
        // it so the task cannot detach and run indefinitely.
        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    warn!("connection loop terminated with join error: {join_err}");
                }
                Err(_) => {
                    warn!("connection loop did not exit within timeout; aborting task");
                    task.abort();
                    if let Err(join_err) = task.await {
                        debug!("connection loop aborted: {join_err}");
                    }
                }
            }
        }

        self.state.connected.store(false, Ordering::Release);
    }

    // ── State accessors ─────────────────────────────────────────────

    /// Returns `true` if the transport is believed to be connected.
    pub fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::Acquire)
    }

    /// Returns `true` once the reconnect ceiling has been exhausted.
    pub fn retries_exhausted(&self) -> bool {
        self.state.exhausted.load(Ordering::Acquire)
    }

    /// Identifier of the room this connection represents.
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Display name of the local participant.
    pub fn player(&self) -> &str {
        &self.player
    }
}

impl std::fmt::Debug for RoomConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomConnection")
            .field("room_id", &self.room_id)
            .field("player", &self.player)
            .field("connected", &self.is_connected())
            .field("has_task", &self.task.is_some())
            .finish()
    }
}

impl Drop for RoomConnection {
    fn drop(&mut self) {
        // `Drop` is synchronous so we cannot await a graceful shutdown.
        // Aborting the spawned task drops the connection loop future
        // immediately, which also cancels any pending reconnect timer.
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ── Connection loop ─────────────────────────────────────────────────

/// Why a live transport stopped being driven.
enum TransportEnd {
    /// Unexpected drop — eligible for reconnection.
    Dropped,
    /// Shutdown was requested or the handle went away.
    Shutdown,
    /// The terminal `ALL_MEALS_SUBMITTED` event arrived; the transport was
    /// closed on the manager's own initiative.
    Terminal,
}

/// Background loop: connect, drive the transport, reconnect on drops with
/// linear backoff, give up after [`MAX_RECONNECT_ATTEMPTS`] consecutive
/// failures.
async fn connection_loop<C: Connector>(
    mut connector: C,
    mut cmd_rx: mpsc::UnboundedReceiver<ClientCommand>,
    event_tx: mpsc::Sender<RoomEvent>,
    state: Arc<ConnState>,
    mut shutdown_rx: tokio::sync::oneshot::Receiver<()>,
    room_id: String,
    player: String,
) {
    debug!(room = %room_id, player = %player, "connection loop started");

    let mut attempts: u32 = 0;

    loop {
        let connected = tokio::select! {
            _ = &mut shutdown_rx => {
                debug!("shutdown before connect completed");
                return;
            }
            result = connector.connect() => result,
        };

        match connected {
            Ok(mut transport) => {
                // Recover authoritative state before any other traffic.
                let rejoin = ClientCommand::Rejoin {
                    player: player.clone(),
                    room_id: room_id.clone(),
                };
                if let Err(e) = send_command(&mut transport, &rejoin).await {
                    error!("failed to send rejoin on fresh connection: {e}");
                } else {
                    attempts = 0;
                    state.connected.store(true, Ordering::Release);
                    emit_reliable(&event_tx, RoomEvent::ConnectionChanged(true)).await;

                    let end = drive_transport(
                        transport,
                        &mut cmd_rx,
                        &event_tx,
                        &mut shutdown_rx,
                    )
                    .await;

                    state.connected.store(false, Ordering::Release);
                    emit_reliable(&event_tx, RoomEvent::ConnectionChanged(false)).await;

                    match end {
                        TransportEnd::Shutdown => {
                            debug!("connection loop exiting: shutdown");
                            return;
                        }
                        TransportEnd::Terminal => {
                            debug!("connection loop exiting: room lifecycle complete");
                            return;
                        }
                        TransportEnd::Dropped => {}
                    }
                }
            }
            Err(e) => {
                warn!(room = %room_id, "room connect attempt failed: {e}");
            }
        }

        attempts += 1;
        if attempts > MAX_RECONNECT_ATTEMPTS {
            warn!(
                room = %room_id,
                "reconnect ceiling reached after {MAX_RECONNECT_ATTEMPTS} consecutive failures; giving up"
            );
            state.exhausted.store(true, Ordering::Release);
            emit_reliable(&event_tx, RoomEvent::RetriesExhausted).await;
            return;
        }

        let delay = retry_delay(attempts);
        debug!(
            attempt = attempts,
            delay_ms = delay.as_millis() as u64,
            "scheduling reconnect"
        );
        tokio::select! {
            _ = &mut shutdown_rx => {
                debug!("shutdown cancelled pending reconnect");
                return;
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

/// Drive one live transport until it drops, shutdown is requested, or the
/// terminal event arrives.
async fn drive_transport<T: Transport>(
    mut transport: T,
    cmd_rx: &mut mpsc::UnboundedReceiver<ClientCommand>,
    event_tx: &mpsc::Sender<RoomEvent>,
    shutdown_rx: &mut tokio::sync::oneshot::Receiver<()>,
) -> TransportEnd {
    loop {
        tokio::select! {
            // Branch 1: outgoing command from the handle
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(command) => {
                        debug!(
                            "sending client command: {:?}",
                            std::mem::discriminant(&command)
                        );
                        if let Err(e) = send_command(&mut transport, &command).await {
                            match e {
                                LunchRouletteError::Serialization(e) => {
                                    // Serialization failures are programming
                                    // bugs; don't kill the connection.
                                    error!("failed to serialize client command: {e}");
                                }
                                e => {
                                    error!("transport send error: {e}");
                                    return TransportEnd::Dropped;
                                }
                            }
                        }
                    }
                    // Command channel closed — handle dropped.
                    None => {
                        debug!("command channel closed, closing transport");
                        let _ = transport.close().await;
                        return TransportEnd::Shutdown;
                    }
                }
            }

            // Branch 2: shutdown signal
            _ = &mut *shutdown_rx => {
                debug!("shutdown signal received");
                let _ = transport.close().await;
                return TransportEnd::Shutdown;
            }

            // Branch 3: incoming message from the server
            incoming = transport.recv() => {
                match incoming {
                    Some(Ok(text)) => {
                        match serde_json::from_str::<ServerEvent>(&text) {
                            Ok(event) => {
                                let terminal =
                                    matches!(event, ServerEvent::AllMealsSubmitted { .. });
                                emit_event(event_tx, RoomEvent::Server(event)).await;
                                if terminal {
                                    // No further traffic is expected in this
                                    // room lifecycle; close without waiting
                                    // for the caller.
                                    debug!("terminal event received, closing transport");
                                    let _ = transport.close().await;
                                    return TransportEnd::Terminal;
                                }
                            }
                            Err(e) => {
                                // Fail closed for this message only.
                                warn!("failed to deserialize server event: {e} — raw: {text}");
                            }
                        }
                    }
                    Some(Err(e)) => {
                        error!("transport receive error: {e}");
                        return TransportEnd::Dropped;
                    }
                    // Transport closed by the server.
                    None => {
                        debug!("transport closed by server");
                        return TransportEnd::Dropped;
                    }
                }
            }
        }
    }
}

/// Serialize and send one command over the transport.
async fn send_command<T: Transport>(transport: &mut T, command: &ClientCommand) -> Result<()> {
    let json = serde_json::to_string(command)?;
    transport.send(json).await
}

/// Emit a server event. If the channel is full, log a warning and drop the
/// event to avoid blocking the connection loop.
async fn emit_event(event_tx: &mpsc::Sender<RoomEvent>, event: RoomEvent) {
    match event_tx.try_send(event) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(dropped)) => {
            warn!("event channel full, dropping event: {dropped:?}");
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            debug!("event channel closed, receiver dropped");
        }
    }
}

/// Emit a lifecycle event that must never be silently dropped
/// (connectivity transitions and retry exhaustion). Uses a blocking
/// `send().await` rather than `try_send`.
async fn emit_reliable(event_tx: &mpsc::Sender<RoomEvent>, event: RoomEvent) {
    if event_tx.send(event).await.is_err() {
        debug!("event channel closed, receiver dropped");
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
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicU32;
    use std::sync::Mutex as StdMutex;

    // ── Mock transport ──────────────────────────────────────────────

    /// A mock transport that records sent messages and replays scripted
    /// responses.
    struct MockTransport {
        /// Messages that `recv()` will yield in order. An explicit `None`
        /// entry signals a clean transport close.
        incoming: VecDeque<Option<std::result::Result<String, LunchRouletteError>>>,
        /// Recorded outgoing messages.
        sent: Arc<StdMutex<Vec<String>>>,
        /// Whether `close()` was called.
        closed: Arc<AtomicBool>,
        /// Whether `recv()` hangs forever once the script is exhausted
        /// (true) or reports a clean close (false).
        hang_when_empty: bool,
    }

    /// Shared inspection handles for a [`MockTransport`].
    struct TransportProbe {
        sent: Arc<StdMutex<Vec<String>>>,
        closed: Arc<AtomicBool>,
    }

    impl MockTransport {
        fn new(
            incoming: Vec<Option<std::result::Result<String, LunchRouletteError>>>,
        ) -> (Self, TransportProbe) {
            Self::with_behavior(incoming, true)
        }

        fn with_behavior(
            incoming: Vec<Option<std::result::Result<String, LunchRouletteError>>>,
            hang_when_empty: bool,
        ) -> (Self, TransportProbe) {
            let sent = Arc::new(StdMutex::new(Vec::new()));
            let closed = Arc::new(AtomicBool::new(false));
            let transport = Self {
                incoming: VecDeque::from(incoming),
                sent: Arc::clone(&sent),
                closed: Arc::clone(&closed),
                hang_when_empty,
            };
            (transport, TransportProbe { sent, closed })
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(
            &mut self,
            message: String,
        ) -> std::result::Result<(), LunchRouletteError> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }

        async fn recv(&mut self) -> Option<std::result::Result<String, LunchRouletteError>> {
            if let Some(item) = self.incoming.pop_front() {
                item
            } else if self.hang_when_empty {
                // Stay alive until shutdown.
                std::future::pending().await
            } else {
                None
            }
        }

        async fn close(&mut self) -> std::result::Result<(), LunchRouletteError> {
            self.closed.store(true, Ordering::Relaxed);
            Ok(())
        }
    }

    // ── Mock connector ──────────────────────────────────────────────

    /// Connector that hands out pre-scripted transports in order and fails
    /// every attempt once the script is exhausted.
    struct MockConnector {
        transports: Arc<StdMutex<VecDeque<MockTransport>>>,
        calls: Arc<AtomicU32>,
    }

    impl MockConnector {
        fn new(transports: Vec<MockTransport>) -> (Self, Arc<AtomicU32>) {
            let calls = Arc::new(AtomicU32::new(0));
            let connector = Self {
                transports: Arc::new(StdMutex::new(VecDeque::from(transports))),
                calls: Arc::clone(&calls),
            };
            (connector, calls)
        }

        fn always_failing() -> (Self, Arc<AtomicU32>) {
            Self::new(Vec::new())
        }
    }

    #[async_trait]
    impl Connector for MockConnector {
        type Transport = MockTransport;

        async fn connect(&mut self) -> std::result::Result<MockTransport, LunchRouletteError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.transports.lock().unwrap().pop_front() {
                Some(transport) => Ok(transport),
                None => Err(LunchRouletteError::TransportClosed),
            }
        }
    }

    // ── Helpers ─────────────────────────────────────────────────────

    fn config() -> ConnectionConfig {
        ConnectionConfig::new("room-1", "alice")
    }

    fn player_list_json(players: &[&str]) -> String {
        serde_json::to_string(&ServerEvent::PlayerList {
            players: players.iter().map(ToString::to_string).collect(),
        })
        .unwrap()
    }

    fn all_meals_submitted_json() -> String {
        serde_json::to_string(&ServerEvent::AllMealsSubmitted {
            message: "All meals have been submitted!".into(),
        })
        .unwrap()
    }

    // ── Tests ───────────────────────────────────────────────────────

    #[test]
    fn retry_delay_grows_linearly_and_caps() {
        assert_eq!(retry_delay(1), Duration::from_millis(1000));
        assert_eq!(retry_delay(2), Duration::from_millis(2000));
        assert_eq!(retry_delay(3), Duration::from_millis(3000));
        assert_eq!(retry_delay(4), Duration::from_millis(4000));
        assert_eq!(retry_delay(5), Duration::from_millis(5000));
        // Capped beyond the ceiling.
        assert_eq!(retry_delay(6), Duration::from_millis(5000));
        assert_eq!(retry_delay(100), Duration::from_millis(5000));
    }

    #[tokio::test]
    async fn open_sends_rejoin_before_anything_else() {
        let (transport, probe) = MockTransport::new(vec![]);
        let (connector, _calls) = MockConnector::new(vec![transport]);

        let (mut conn, mut events) = RoomConnection::open(connector, config());

        let event = events.recv().await.unwrap();
        assert_eq!(event, RoomEvent::ConnectionChanged(true));

        {
            let sent = probe.sent.lock().unwrap();
            assert_eq!(sent.len(), 1);
            let first: ClientCommand = serde_json::from_str(&sent[0]).unwrap();
            assert_eq!(
                first,
                ClientCommand::Rejoin {
                    player: "alice".into(),
                    room_id: "room-1".into(),
                }
            );
        }

        conn.shutdown().await;
    }

    #[tokio::test]
    async fn rejoin_wire_format_matches_server() {
        let (transport, probe) = MockTransport::new(vec![]);
        let (connector, _calls) = MockConnector::new(vec![transport]);

        let (mut conn, mut events) = RoomConnection::open(connector, config());
        let _ = events.recv().await; // ConnectionChanged(true)

        {
            let sent = probe.sent.lock().unwrap();
            let raw: serde_json::Value = serde_json::from_str(&sent[0]).unwrap();
            assert_eq!(raw["type"], "REJOIN");
            assert_eq!(raw["player"], "alice");
            assert_eq!(raw["roomId"], "room-1");
        }

        conn.shutdown().await;
    }

    #[tokio::test]
    async fn server_events_dispatched_in_order() {
        let (transport, _probe) = MockTransport::new(vec![
            Some(Ok(player_list_json(&["alice", "bob"]))),
            Some(Ok(player_list_json(&["alice", "bob", "carol"]))),
        ]);
        let (connector, _calls) = MockConnector::new(vec![transport]);

        let (mut conn, mut events) = RoomConnection::open(connector, config());

        let _ = events.recv().await; // ConnectionChanged(true)
        let first = events.recv().await.unwrap();
        let second = events.recv().await.unwrap();
        assert_eq!(
            first,
            RoomEvent::Server(ServerEvent::PlayerList {
                players: vec!["alice".into(), "bob".into()],
            })
        );
        assert_eq!(
            second,
            RoomEvent::Server(ServerEvent::PlayerList {
                players: vec!["alice".into(), "bob".into(), "carol".into()],
            })
        );

        conn.shutdown().await;
    }

    #[tokio::test]
    async fn malformed_payload_is_skipped_not_fatal() {
        let (transport, _probe) = MockTransport::new(vec![
            Some(Ok("{not json".into())),
            Some(Ok(r#"{"type":"NO_SUCH_EVENT"}"#.into())),
            Some(Ok(player_list_json(&["alice"]))),
        ]);
        let (connector, _calls) = MockConnector::new(vec![transport]);

        let (mut conn, mut events) = RoomConnection::open(connector, config());

        let _ = events.recv().await; // ConnectionChanged(true)
        // Both bad payloads are dropped; the next well-formed event still
        // comes through on the same connection.
        let event = events.recv().await.unwrap();
        assert_eq!(
            event,
            RoomEvent::Server(ServerEvent::PlayerList {
                players: vec!["alice".into()],
            })
        );
        assert!(conn.is_connected());

        conn.shutdown().await;
    }

    #[tokio::test]
    async fn terminal_event_closes_transport_without_reconnect() {
        let (transport, probe) = MockTransport::new(vec![Some(Ok(all_meals_submitted_json()))]);
        let (connector, calls) = MockConnector::new(vec![transport]);

        let (mut conn, mut events) = RoomConnection::open(connector, config());

        let _ = events.recv().await; // ConnectionChanged(true)
        let event = events.recv().await.unwrap();
        assert!(matches!(
            event,
            RoomEvent::Server(ServerEvent::AllMealsSubmitted { .. })
        ));
        // The manager closes on its own initiative after dispatching.
        let event = events.recv().await.unwrap();
        assert_eq!(event, RoomEvent::ConnectionChanged(false));
        // Channel ends — the loop exited instead of retrying.
        assert!(events.recv().await.is_none());

        assert!(probe.closed.load(Ordering::Relaxed));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!conn.is_connected());
        assert!(matches!(
            conn.send(ClientCommand::Spin {
                player: "alice".into()
            }),
            Err(LunchRouletteError::NotConnected)
        ));

        conn.shutdown().await;
    }

    #[tokio::test]
    async fn send_while_connected_reaches_transport() {
        let (transport, probe) = MockTransport::new(vec![]);
        let (connector, _calls) = MockConnector::new(vec![transport]);

        let (mut conn, mut events) = RoomConnection::open(connector, config());
        let _ = events.recv().await; // ConnectionChanged(true)

        conn.send(ClientCommand::Spin {
            player: "alice".into(),
        })
        .unwrap();

        // Give the loop a moment to process.
        tokio::time::sleep(Duration::from_millis(50)).await;

        {
            let sent = probe.sent.lock().unwrap();
            // First message is the automatic REJOIN.
            assert_eq!(sent.len(), 2);
            let last: ClientCommand = serde_json::from_str(&sent[1]).unwrap();
            assert!(matches!(last, ClientCommand::Spin { .. }));
        }

        conn.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn send_while_disconnected_is_dropped_with_error() {
        let (connector, _calls) = MockConnector::always_failing();

        let (mut conn, mut events) = RoomConnection::open(connector, config());

        // The very first connect fails, so the connection never comes up.
        let result = conn.send(ClientCommand::Spin {
            player: "alice".into(),
        });
        assert!(matches!(result, Err(LunchRouletteError::NotConnected)));

        // Drain to the terminal exhaustion event; no transport ever existed
        // so nothing could have been written.
        loop {
            match events.recv().await {
                Some(RoomEvent::RetriesExhausted) | None => break,
                Some(_) => {}
            }
        }

        conn.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn retries_exhausted_after_five_consecutive_failures() {
        let (connector, calls) = MockConnector::always_failing();

        let (mut conn, mut events) = RoomConnection::open(connector, config());

        let start = tokio::time::Instant::now();
        let event = events.recv().await.unwrap();
        assert_eq!(event, RoomEvent::RetriesExhausted);

        // 1 initial attempt + 5 retries, no 6th retry scheduled.
        assert_eq!(calls.load(Ordering::SeqCst), 6);
        assert!(conn.retries_exhausted());
        assert!(!conn.is_connected());

        // Linear backoff: 1s + 2s + 3s + 4s + 5s of virtual time.
        assert_eq!(start.elapsed(), Duration::from_secs(15));

        // The channel ends after the terminal event.
        assert!(events.recv().await.is_none());

        conn.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn reconnects_after_drop_and_resends_rejoin() {
        // First transport reports a clean server-side close immediately;
        // second stays up and delivers a player list.
        let (first, first_probe) = MockTransport::new(vec![None]);
        let (second, second_probe) =
            MockTransport::new(vec![Some(Ok(player_list_json(&["alice", "bob"])))]);
        let (connector, calls) = MockConnector::new(vec![first, second]);

        let (mut conn, mut events) = RoomConnection::open(connector, config());

        assert_eq!(events.recv().await.unwrap(), RoomEvent::ConnectionChanged(true));
        assert_eq!(
            events.recv().await.unwrap(),
            RoomEvent::ConnectionChanged(false)
        );
        assert_eq!(events.recv().await.unwrap(), RoomEvent::ConnectionChanged(true));
        assert!(matches!(
            events.recv().await.unwrap(),
            RoomEvent::Server(ServerEvent::PlayerList { .. })
        ));

        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // Both connections started with a REJOIN.
        for probe in [&first_probe, &second_probe] {
            let sent = probe.sent.lock().unwrap();
            let first_cmd: ClientCommand = serde_json::from_str(&sent[0]).unwrap();
            assert!(matches!(first_cmd, ClientCommand::Rejoin { .. }));
        }

        conn.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn attempt_counter_resets_after_successful_connect() {
        // One transport that connects and then drops immediately: the
        // post-drop retries start again from attempt 1 and run the full
        // ceiling of 5 before giving up.
        let (transport, _probe) = MockTransport::with_behavior(vec![None], false);
        let (connector, calls) = MockConnector::new(vec![transport]);

        let (mut conn, mut events) = RoomConnection::open(connector, config());

        assert_eq!(events.recv().await.unwrap(), RoomEvent::ConnectionChanged(true));
        assert_eq!(
            events.recv().await.unwrap(),
            RoomEvent::ConnectionChanged(false)
        );
        assert_eq!(events.recv().await.unwrap(), RoomEvent::RetriesExhausted);

        // 1 successful attempt + 5 failed attempts after the drop.
        assert_eq!(calls.load(Ordering::SeqCst), 6);

        conn.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_cancels_pending_reconnect() {
        // A single transport that drops right away, then no more: the loop
        // ends up sleeping in backoff when shutdown arrives.
        let (transport, _probe) = MockTransport::with_behavior(vec![None], false);
        let (connector, calls) = MockConnector::new(vec![transport]);

        let (mut conn, mut events) = RoomConnection::open(connector, config());

        let _ = events.recv().await; // ConnectionChanged(true)
        let _ = events.recv().await; // ConnectionChanged(false)

        conn.shutdown().await;

        // At most the initial connect plus one retry could have happened;
        // the pending timer was cancelled rather than exhausting the ceiling.
        assert!(calls.load(Ordering::SeqCst) <= 2);
        assert!(!conn.retries_exhausted());
    }

    #[tokio::test]
    async fn double_shutdown_does_not_panic() {
        let (transport, _probe) = MockTransport::new(vec![]);
        let (connector, _calls) = MockConnector::new(vec![transport]);

        let (mut conn, mut events) = RoomConnection::open(connector, config());
        let _ = events.recv().await; // ConnectionChanged(true)

        conn.shutdown().await;
        conn.shutdown().await; // should not panic
    }

    #[tokio::test]
    async fn drop_without_explicit_shutdown() {
        let (transport, _probe) = MockTransport::new(vec![]);
        let (connector, _calls) = MockConnector::new(vec![transport]);

        let (conn, mut events) = RoomConnection::open(connector, config());
        let _ = events.recv().await; // ConnectionChanged(true)

        drop(conn);

        // The loop task is aborted; the event channel closes. We only
        // verify we neither hang nor panic.
        while events.recv().await.is_some() {}
    }

    #[tokio::test]
    async fn config_defaults_and_builders() {
        let config = ConnectionConfig::new("room-9", "dana");
        assert_eq!(config.room_id, "room-9");
        assert_eq!(config.player, "dana");
        assert_eq!(config.event_channel_capacity, 256);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(1));

        let tuned = config
            .with_event_channel_capacity(0)
            .with_shutdown_timeout(Duration::from_secs(5));
        assert_eq!(tuned.event_channel_capacity, 1); // clamped
        assert_eq!(tuned.shutdown_timeout, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn event_channel_backpressure_drops_but_does_not_block() {
        let mut incoming = Vec::new();
        for _ in 0..20 {
            incoming.push(Some(Ok(player_list_json(&["alice"]))));
        }
        incoming.push(None);
        let (transport, _probe) = MockTransport::with_behavior(incoming, false);
        let (connector, _calls) = MockConnector::new(vec![transport]);

        let config = config().with_event_channel_capacity(1);
        let (mut conn, mut events) = RoomConnection::open(connector, config);

        // Don't read yet: the tiny channel fills and server events get
        // dropped rather than blocking the loop.
        tokio::time::sleep(Duration::from_millis(100)).await;

        // Now drain. The disconnect transition is delivered even though
        // most of the 20 player lists were not.
        let mut server_events = 0;
        loop {
            match events.recv().await.expect("channel should stay open") {
                RoomEvent::Server(_) => server_events += 1,
                RoomEvent::ConnectionChanged(false) => break,
                _ => {}
            }
        }
        assert!(server_events < 20, "expected backpressure drops, got all");

        conn.shutdown().await;
    }

    #[tokio::test]
    async fn debug_impl_for_connection() {
        let (transport, _probe) = MockTransport::new(vec![]);
        let (connector, _calls) = MockConnector::new(vec![transport]);

        let (mut conn, mut events) = RoomConnection::open(connector, config());
        let _ = events.recv().await;

        let debug_str = format!("{conn:?}");
        assert!(debug_str.contains("RoomConnection"));
        assert!(debug_str.contains("room-1"));

        conn.shutdown().await;
    }
}
