//! Tree Store
//!
//! Persisted copies of trees, addressed by a string handle. A store keeps the snapshot
//! form of a tree and can report whether the persisted copy changed since this store
//! instance last loaded or saved it.

pub mod file;
pub mod persistence;

pub use file::JsonFileStore;
pub use persistence::SledTreeStore;

use crate::error::StorageError;
use crate::snapshot::Snapshot;
use crate::tree::Container;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

/// Which persisted copy of a handle was read or written, for change tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Revision {
    Counter(u64),
    File { modified: SystemTime, len: u64 },
}

/// Tree Store interface
pub trait TreeStore: Send + Sync {
    /// Read the persisted snapshot for `handle` and the revision it was read at.
    /// Change tracking is left untouched.
    fn read_snapshot(&self, handle: &str) -> Result<(Snapshot, Revision), StorageError>;

    /// Record `revision` as the copy this instance has taken in
    fn mark_seen(&self, handle: &str, revision: Revision);

    /// Persist `snapshot` under `handle`, replacing any previous copy
    fn save(&self, handle: &str, snapshot: &Snapshot) -> Result<(), StorageError>;

    /// True when the persisted copy differs from what this instance last loaded or saved.
    /// Unknown handles report false.
    fn has_changed(&self, handle: &str) -> Result<bool, StorageError>;

    /// Handles currently persisted, in no particular order
    fn handles(&self) -> Result<Vec<String>, StorageError>;

    /// Read the persisted snapshot for `handle`
    fn load_snapshot(&self, handle: &str) -> Result<Snapshot, StorageError> {
        let (snapshot, revision) = self.read_snapshot(handle)?;
        self.mark_seen(handle, revision);
        Ok(snapshot)
    }

    /// Read the persisted tree for `handle` as a fresh container. A copy that cannot be
    /// rebuilt is not marked as seen.
    fn load(&self, handle: &str) -> Result<Container, StorageError> {
        let (snapshot, revision) = self.read_snapshot(handle)?;
        let tree = snapshot.to_container()?;
        self.mark_seen(handle, revision);
        Ok(tree)
    }

    fn exists(&self, handle: &str) -> Result<bool, StorageError> {
        Ok(self.handles()?.iter().any(|h| h == handle))
    }
}

/// Handles become file names and key prefixes, so they are restricted to a safe set
pub fn validate_handle(handle: &str) -> Result<(), StorageError> {
    let valid = !handle.is_empty()
        && handle != "."
        && handle != ".."
        && handle
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(StorageError::Backend(format!("Invalid tree handle: {:?}", handle)))
    }
}

struct MemoryEntry {
    snapshot: Snapshot,
    version: u64,
}

/// In-process store, used by tests and short-lived tools
#[derive(Clone, Default)]
pub struct MemoryTreeStore {
    entries: Arc<Mutex<HashMap<String, MemoryEntry>>>,
    seen: Arc<Mutex<HashMap<String, Revision>>>,
    saves: Arc<AtomicU64>,
}

impl MemoryTreeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A second view over the same persisted data with its own change tracking, as another
    /// process would see it
    pub fn view(&self) -> MemoryTreeStore {
        MemoryTreeStore {
            entries: Arc::clone(&self.entries),
            seen: Arc::new(Mutex::new(HashMap::new())),
            saves: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Number of `save` calls made through this view
    pub fn save_count(&self) -> u64 {
        self.saves.load(Ordering::SeqCst)
    }

    /// Version counter of the persisted copy, if any
    pub fn version(&self, handle: &str) -> Option<u64> {
        self.entries.lock().get(handle).map(|entry| entry.version)
    }

    /// Persist a tree's current state, as [`TreeStore::save`] would after a snapshot
    pub fn put_tree(&self, handle: &str, tree: &Container) -> Result<(), StorageError> {
        self.save(handle, &Snapshot::capture(tree))
    }
}

impl TreeStore for MemoryTreeStore {
    fn read_snapshot(&self, handle: &str) -> Result<(Snapshot, Revision), StorageError> {
        let entries = self.entries.lock();
        let entry = entries
            .get(handle)
            .ok_or_else(|| StorageError::NotFound(handle.to_string()))?;
        Ok((entry.snapshot.clone(), Revision::Counter(entry.version)))
    }

    fn mark_seen(&self, handle: &str, revision: Revision) {
        self.seen.lock().insert(handle.to_string(), revision);
    }

    fn save(&self, handle: &str, snapshot: &Snapshot) -> Result<(), StorageError> {
        validate_handle(handle)?;
        let mut entries = self.entries.lock();
        let version = entries.get(handle).map_or(1, |entry| entry.version + 1);
        entries.insert(
            handle.to_string(),
            MemoryEntry {
                snapshot: snapshot.clone(),
                version,
            },
        );
        self.mark_seen(handle, Revision::Counter(version));
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn has_changed(&self, handle: &str) -> Result<bool, StorageError> {
        let current = self.entries.lock().get(handle).map(|entry| entry.version);
        let seen = self.seen.lock().get(handle).copied();
        Ok(match current {
            Some(version) => seen != Some(Revision::Counter(version)),
            None => false,
        })
    }

    fn handles(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.entries.lock().keys().cloned().collect())
    }
}
