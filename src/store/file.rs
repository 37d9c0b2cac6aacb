//! JSON file store
//!
//! One pretty-printed JSON document per handle (`<dir>/<handle>.json`). Writes go to a
//! temporary file that is renamed over the target. The change probe compares the file's
//! modification time and length with what this instance last observed.

use crate::error::StorageError;
use crate::snapshot::Snapshot;
use crate::store::{validate_handle, Revision, TreeStore};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::{self, File, Metadata};
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

const EXTENSION: &str = "json";

static TEMP_SEQUENCE: AtomicU64 = AtomicU64::new(0);

pub struct JsonFileStore {
    dir: PathBuf,
    seen: Mutex<HashMap<String, Revision>>,
}

impl JsonFileStore {
    /// Open a store rooted at `dir`, creating the directory when needed
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            seen: Mutex::new(HashMap::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File backing `handle`
    pub fn path_for(&self, handle: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", handle, EXTENSION))
    }

    fn current_revision(&self, handle: &str) -> Result<Option<Revision>, StorageError> {
        match fs::metadata(self.path_for(handle)) {
            Ok(meta) => Ok(Some(revision_of(&meta)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn revision_of(meta: &Metadata) -> std::io::Result<Revision> {
    Ok(Revision::File {
        modified: meta.modified()?,
        len: meta.len(),
    })
}

impl TreeStore for JsonFileStore {
    fn read_snapshot(&self, handle: &str) -> Result<(Snapshot, Revision), StorageError> {
        validate_handle(handle)?;
        let path = self.path_for(handle);
        let mut file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(handle.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        // Stamp and bytes come from the same open file, even if it is replaced meanwhile
        let revision = revision_of(&file.metadata()?)?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
        debug!(handle, path = %path.display(), leaves = snapshot.len(), "Loaded tree file");
        Ok((snapshot, revision))
    }

    fn mark_seen(&self, handle: &str, revision: Revision) {
        self.seen.lock().insert(handle.to_string(), revision);
    }

    fn save(&self, handle: &str, snapshot: &Snapshot) -> Result<(), StorageError> {
        validate_handle(handle)?;
        let path = self.path_for(handle);
        let temp = self.dir.join(format!(
            "{}.{}.{}.tmp",
            handle,
            std::process::id(),
            TEMP_SEQUENCE.fetch_add(1, Ordering::Relaxed)
        ));
        let json = serde_json::to_vec_pretty(snapshot)?;
        fs::write(&temp, json)?;
        // Rename keeps the stamp, so this is the revision of our own copy
        let revision = match fs::metadata(&temp).and_then(|meta| revision_of(&meta)) {
            Ok(revision) => revision,
            Err(e) => {
                let _ = fs::remove_file(&temp);
                return Err(e.into());
            }
        };
        if let Err(e) = fs::rename(&temp, &path) {
            let _ = fs::remove_file(&temp);
            return Err(e.into());
        }
        self.mark_seen(handle, revision);
        debug!(handle, path = %path.display(), leaves = snapshot.len(), "Saved tree file");
        Ok(())
    }

    fn has_changed(&self, handle: &str) -> Result<bool, StorageError> {
        validate_handle(handle)?;
        let current = self.current_revision(handle)?;
        let seen = self.seen.lock().get(handle).copied();
        Ok(match current {
            Some(revision) => seen != Some(revision),
            None => false,
        })
    }

    fn handles(&self) -> Result<Vec<String>, StorageError> {
        let mut handles = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                handles.push(stem.to_string());
            }
        }
        handles.sort();
        Ok(handles)
    }
}
