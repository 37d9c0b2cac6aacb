//! Background Synchronization
//!
//! Two tokio loops keep a live tree and its persisted copy in step:
//! - [`AutoSave`] debounces change events and writes a snapshot to the store
//! - [`AutoUpdate`] polls the store and reconciles external changes into the tree
//!
//! Every cycle of either loop is bracketed by [`SyncSignal::Started`] and
//! [`SyncSignal::Finished`] on a broadcast channel.

pub mod auto_save;
pub mod auto_update;
pub mod reconcile;

pub use auto_save::{AutoSave, AutoSaveOptions};
pub use auto_update::{AutoUpdate, AutoUpdateOptions};
pub use reconcile::{reconcile, ReconcilePolicy};

use crate::error::{ApiError, StorageError};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

const SIGNAL_CAPACITY: usize = 64;

/// Result of one save or update cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The cycle ran to completion. `changes` is the number of leaves written by a save,
    /// or the number of nodes added, removed or updated by an update.
    Completed { changes: usize },
    /// The cycle was aborted; the loop keeps running
    Failed(String),
}

impl SyncOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, SyncOutcome::Failed(_))
    }
}

/// Lifecycle signal of a sync cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncSignal {
    Started,
    Finished(SyncOutcome),
}

fn signal_channel() -> broadcast::Sender<SyncSignal> {
    broadcast::channel(SIGNAL_CAPACITY).0
}

/// Send a signal; having no receivers is fine
fn emit(signals: &broadcast::Sender<SyncSignal>, signal: SyncSignal) {
    let _ = signals.send(signal);
}

/// Run blocking store I/O off the async workers
async fn blocking<T, F>(work: F) -> Result<T, StorageError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, StorageError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| StorageError::Backend(format!("Store task failed: {}", e)))?
}

fn require_runtime() -> Result<(), ApiError> {
    tokio::runtime::Handle::try_current()
        .map(|_| ())
        .map_err(|_| ApiError::SyncError("A tokio runtime is required to start the loop".to_string()))
}

/// Running loop task plus its shutdown switch
struct Worker {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl Worker {
    async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        // A panicked task has nothing left to clean up
        let _ = self.task.await;
    }
}
