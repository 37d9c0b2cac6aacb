//! Persistence layer for the sled-backed Tree Store

use crate::error::StorageError;
use crate::snapshot::Snapshot;
use crate::store::{validate_handle, Revision, TreeStore};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;

const TREE_PREFIX: &str = "tree:";
const VERSION_PREFIX: &str = "version:";

/// Sled-based implementation of TreeStore
///
/// Snapshots are stored bincode-encoded under `tree:<handle>`; every save bumps a
/// big-endian counter under `version:<handle>`, which is what the change probe compares.
pub struct SledTreeStore {
    db: sled::Db,
    seen: Mutex<HashMap<String, Revision>>,
}

impl SledTreeStore {
    /// Open (or create) a sled database at the given path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path).map_err(|e| {
            StorageError::Backend(format!("Failed to open sled database: {}", e))
        })?;
        Ok(Self::from_db(db))
    }

    /// Wrap an already opened database. Each wrapper tracks changes on its own.
    pub fn from_db(db: sled::Db) -> Self {
        Self {
            db,
            seen: Mutex::new(HashMap::new()),
        }
    }

    /// Get the underlying sled database (for advanced operations)
    pub fn db(&self) -> &sled::Db {
        &self.db
    }

    /// Current version counter for `handle`
    pub fn version(&self, handle: &str) -> Result<Option<u64>, StorageError> {
        let key = format!("{}{}", VERSION_PREFIX, handle);
        Ok(self.db.get(key.as_bytes())?.map(|bytes| decode_version(&bytes)))
    }

    /// Flush all pending writes to disk
    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }
}

fn decode_version(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    let len = bytes.len().min(8);
    buf[8 - len..].copy_from_slice(&bytes[bytes.len() - len..]);
    u64::from_be_bytes(buf)
}

fn increment(old: Option<&[u8]>) -> Option<Vec<u8>> {
    let next = old.map_or(0, decode_version) + 1;
    Some(next.to_be_bytes().to_vec())
}

impl TreeStore for SledTreeStore {
    fn read_snapshot(&self, handle: &str) -> Result<(Snapshot, Revision), StorageError> {
        validate_handle(handle)?;
        // Version first: a save landing in between only makes the probe fire again
        let version = self.version(handle)?.unwrap_or(0);
        let key = format!("{}{}", TREE_PREFIX, handle);
        let bytes = self
            .db
            .get(key.as_bytes())?
            .ok_or_else(|| StorageError::NotFound(handle.to_string()))?;
        let snapshot: Snapshot = bincode::deserialize(&bytes)?;
        Ok((snapshot, Revision::Counter(version)))
    }

    fn mark_seen(&self, handle: &str, revision: Revision) {
        self.seen.lock().insert(handle.to_string(), revision);
    }

    fn save(&self, handle: &str, snapshot: &Snapshot) -> Result<(), StorageError> {
        validate_handle(handle)?;
        let value = bincode::serialize(snapshot)?;
        let key = format!("{}{}", TREE_PREFIX, handle);
        self.db.insert(key.as_bytes(), value)?;

        // The tree is written before the counter moves, so a probe never sees a new
        // version ahead of its data
        let version_key = format!("{}{}", VERSION_PREFIX, handle);
        let version = self
            .db
            .update_and_fetch(version_key.as_bytes(), increment)?
            .map(|bytes| decode_version(&bytes))
            .unwrap_or(0);
        self.mark_seen(handle, Revision::Counter(version));
        Ok(())
    }

    fn has_changed(&self, handle: &str) -> Result<bool, StorageError> {
        let current = self.version(handle)?;
        let seen = self.seen.lock().get(handle).copied();
        Ok(match current {
            Some(version) => seen != Some(Revision::Counter(version)),
            None => false,
        })
    }

    fn handles(&self) -> Result<Vec<String>, StorageError> {
        let mut handles = Vec::new();
        for item in self.db.scan_prefix(TREE_PREFIX.as_bytes()) {
            let (key, _) = item?;
            let key = String::from_utf8_lossy(&key);
            if let Some(handle) = key.strip_prefix(TREE_PREFIX) {
                handles.push(handle.to_string());
            }
        }
        Ok(handles)
    }

    fn exists(&self, handle: &str) -> Result<bool, StorageError> {
        let key = format!("{}{}", TREE_PREFIX, handle);
        Ok(self.db.contains_key(key.as_bytes())?)
    }
}
