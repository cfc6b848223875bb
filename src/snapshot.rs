//! Persistence for the resilience snapshot.
//!
//! [`SnapshotStore`] writes one JSON file per room, so two concurrent room
//! memberships never overwrite each other's saved state. Restore is
//! best-effort: a missing or unreadable file yields an empty snapshot and a
//! log line, never an error — the post-reconnect resync is the real source
//! of truth and a corrupt file must not block startup.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::Result;
use crate::game::GameSnapshot;

/// File-backed store for per-room [`GameSnapshot`]s.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    /// A store rooted at `dir`. The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, room_id: &str) -> PathBuf {
        // Room ids are server-issued identifiers, but sanitize anyway so a
        // hostile id cannot escape the store directory.
        let safe: String = room_id
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("lunch-room-{safe}.json"))
    }

    /// Persist `snapshot` for `room_id`, replacing any previous save.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created, the snapshot
    /// cannot be serialized, or the file cannot be written.
    pub fn save(&self, room_id: &str, snapshot: &GameSnapshot) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_string(snapshot)?;
        let path = self.path_for(room_id);
        fs::write(&path, json)?;
        debug!(room_id, path = %path.display(), "saved game snapshot");
        Ok(())
    }

    /// Load the saved snapshot for `room_id`.
    ///
    /// Missing, unreadable, or corrupt saves all come back as an empty
    /// snapshot; only corruption is worth a warning.
    pub fn restore(&self, room_id: &str) -> GameSnapshot {
        let path = self.path_for(room_id);
        let json = match fs::read_to_string(&path) {
            Ok(json) => json,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(room_id, "no saved snapshot");
                return GameSnapshot::empty();
            }
            Err(err) => {
                warn!(room_id, %err, "failed to read saved snapshot, starting empty");
                return GameSnapshot::empty();
            }
        };
        match serde_json::from_str(&json) {
            Ok(snapshot) => {
                debug!(room_id, "restored game snapshot");
                snapshot
            }
            Err(err) => {
                warn!(room_id, %err, "saved snapshot is corrupt, starting empty");
                GameSnapshot::empty()
            }
        }
    }

    /// Remove the saved snapshot for `room_id`, if any.
    pub fn clear(&self, room_id: &str) {
        let path = self.path_for(room_id);
        match fs::remove_file(&path) {
            Ok(()) => debug!(room_id, "cleared saved snapshot"),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => warn!(room_id, %err, "failed to clear saved snapshot"),
        }
    }

    /// The directory this store writes into.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

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

    use std::sync::atomic::{AtomicU32, Ordering};

    fn temp_store(tag: &str) -> SnapshotStore {
        static COUNTER: AtomicU32 = AtomicU32::new(0);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        let dir = std::env::temp_dir().join(format!(
            "lunch-roulette-snapshot-{tag}-{}-{n}",
            std::process::id()
        ));
        SnapshotStore::new(dir)
    }

    fn sample_snapshot() -> GameSnapshot {
        let mut snapshot = GameSnapshot::empty();
        snapshot.players = ["alice".to_string(), "bob".to_string()].into();
        snapshot.game_id = "g1".into();
        snapshot.started = true;
        snapshot.scores = [("alice".to_string(), 10)].into();
        snapshot
    }

    #[test]
    fn save_then_restore_round_trips() {
        let store = temp_store("roundtrip");
        let snapshot = sample_snapshot();
        store.save("room-1", &snapshot).unwrap();
        assert_eq!(store.restore("room-1"), snapshot);
    }

    #[test]
    fn restore_missing_yields_empty() {
        let store = temp_store("missing");
        assert_eq!(store.restore("nope"), GameSnapshot::empty());
    }

    #[test]
    fn restore_corrupt_yields_empty() {
        let store = temp_store("corrupt");
        fs::create_dir_all(store.dir()).unwrap();
        fs::write(store.path_for("room-1"), "{not json").unwrap();
        assert_eq!(store.restore("room-1"), GameSnapshot::empty());
    }

    #[test]
    fn rooms_are_partitioned() {
        let store = temp_store("partition");
        let first = sample_snapshot();
        let mut second = sample_snapshot();
        second.game_id = "g2".into();

        store.save("room-1", &first).unwrap();
        store.save("room-2", &second).unwrap();

        assert_eq!(store.restore("room-1"), first);
        assert_eq!(store.restore("room-2"), second);
    }

    #[test]
    fn clear_removes_only_the_room() {
        let store = temp_store("clear");
        store.save("room-1", &sample_snapshot()).unwrap();
        store.save("room-2", &sample_snapshot()).unwrap();

        store.clear("room-1");
        assert_eq!(store.restore("room-1"), GameSnapshot::empty());
        assert_eq!(store.restore("room-2"), sample_snapshot());

        // Clearing a room with no save is fine.
        store.clear("room-1");
    }

    #[test]
    fn hostile_room_id_stays_inside_the_store_dir() {
        let store = temp_store("hostile");
        let path = store.path_for("../../etc/passwd");
        assert!(path.starts_with(store.dir()));
        assert!(!path.to_string_lossy().contains(".."));
    }
}
