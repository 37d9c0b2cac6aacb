//! Debounced persister
//!
//! Listens to a tree's change events and writes a snapshot of the tree to a store once
//! changes have been quiet for the configured delay. Only one save runs at a time; a
//! change that arrives while a save is in flight opens the next debounce window.

use crate::config::AutoSaveConfig;
use crate::error::ApiError;
use crate::snapshot::Snapshot;
use crate::store::TreeStore;
use crate::sync::{blocking, emit, require_runtime, signal_channel, SyncOutcome, SyncSignal, Worker};
use crate::tree::path;
use crate::tree::{ChangeEvent, Container, SubscriptionId};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, warn};

/// Auto-save settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoSaveOptions {
    /// Quiet period after the last qualifying change before saving
    pub delay: Duration,
    /// When false every change qualifies and `filters` is ignored
    pub filter_enabled: bool,
    /// Paths whose changes qualify; each also covers everything below it
    pub filters: Vec<String>,
}

impl Default for AutoSaveOptions {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(500),
            filter_enabled: false,
            filters: Vec::new(),
        }
    }
}

impl AutoSaveOptions {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    /// Enable filtering on the given paths
    pub fn filtered<I, S>(mut self, filters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filter_enabled = true;
        self.filters = filters.into_iter().map(Into::into).collect();
        self
    }

    /// Whether a change at `changed` should schedule a save
    pub fn qualifies(&self, changed: &str) -> bool {
        !self.filter_enabled
            || self
                .filters
                .iter()
                .any(|filter| path::is_within(changed, filter))
    }
}

impl From<&AutoSaveConfig> for AutoSaveOptions {
    fn from(config: &AutoSaveConfig) -> Self {
        Self {
            delay: Duration::from_millis(config.delay_ms),
            filter_enabled: config.filter_enabled,
            filters: config.filters.clone(),
        }
    }
}

/// State shared by the loop task and explicit saves
struct SaveContext {
    tree: Container,
    store: Arc<dyn TreeStore>,
    handle: String,
    signals: broadcast::Sender<SyncSignal>,
    /// Held for the duration of one save cycle
    in_flight: tokio::sync::Mutex<()>,
}

impl SaveContext {
    async fn save_cycle(&self) -> SyncOutcome {
        let _cycle = self.in_flight.lock().await;
        emit(&self.signals, SyncSignal::Started);

        let snapshot = Snapshot::capture(&self.tree);
        let leaves = snapshot.len();
        let store = Arc::clone(&self.store);
        let handle = self.handle.clone();
        let outcome = match blocking(move || store.save(&handle, &snapshot)).await {
            Ok(()) => {
                debug!(handle = %self.handle, leaves, "Saved tree");
                SyncOutcome::Completed { changes: leaves }
            }
            Err(e) => {
                warn!(handle = %self.handle, error = %e, "Auto-save failed");
                SyncOutcome::Failed(e.to_string())
            }
        };

        emit(&self.signals, SyncSignal::Finished(outcome.clone()));
        outcome
    }
}

struct Running {
    worker: Worker,
    subscription: SubscriptionId,
}

/// Debounced persister for one tree
pub struct AutoSave {
    context: Arc<SaveContext>,
    options: AutoSaveOptions,
    running: Mutex<Option<Running>>,
}

impl AutoSave {
    pub fn new(
        tree: Container,
        store: Arc<dyn TreeStore>,
        handle: impl Into<String>,
        options: AutoSaveOptions,
    ) -> Self {
        Self {
            context: Arc::new(SaveContext {
                tree,
                store,
                handle: handle.into(),
                signals: signal_channel(),
                in_flight: tokio::sync::Mutex::new(()),
            }),
            options,
            running: Mutex::new(None),
        }
    }

    pub fn options(&self) -> &AutoSaveOptions {
        &self.options
    }

    pub fn handle(&self) -> &str {
        &self.context.handle
    }

    /// Receive `Started` / `Finished` signals for every save cycle
    pub fn signals(&self) -> broadcast::Receiver<SyncSignal> {
        self.context.signals.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    /// Subscribe to the tree and spawn the debounce loop. Starting twice is a no-op.
    pub fn start(&self) -> Result<(), ApiError> {
        require_runtime()?;
        let mut running = self.running.lock();
        if running.is_some() {
            return Ok(());
        }

        let (change_tx, change_rx) = mpsc::unbounded_channel();
        let options = self.options.clone();
        let subscription = self.context.tree.subscribe(move |event: &ChangeEvent| {
            if options.qualifies(&event.path) {
                let _ = change_tx.send(());
            }
        });

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let context = Arc::clone(&self.context);
        let delay = self.options.delay;
        let task = tokio::spawn(async move {
            Self::run(context, delay, change_rx, shutdown_rx).await;
        });

        *running = Some(Running {
            worker: Worker {
                shutdown: shutdown_tx,
                task,
            },
            subscription,
        });
        info!(
            handle = %self.context.handle,
            delay_ms = delay.as_millis() as u64,
            filter_enabled = self.options.filter_enabled,
            "Auto-save started"
        );
        Ok(())
    }

    /// Unsubscribe and wait for the loop to exit. A change still waiting for its quiet
    /// period is saved before the loop exits.
    pub async fn stop(&self) -> Result<(), ApiError> {
        let running = self.running.lock().take();
        let Some(running) = running else {
            return Ok(());
        };
        self.context.tree.unsubscribe(running.subscription);
        running.worker.shutdown().await;
        info!(handle = %self.context.handle, "Auto-save stopped");
        Ok(())
    }

    /// Save immediately, outside the debounce window
    pub async fn save_now(&self) -> SyncOutcome {
        self.context.save_cycle().await
    }

    async fn run(
        context: Arc<SaveContext>,
        delay: Duration,
        mut changes: mpsc::UnboundedReceiver<()>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            // Idle until the first qualifying change
            tokio::select! {
                _ = shutdown.changed() => return,
                change = changes.recv() => {
                    if change.is_none() {
                        return;
                    }
                }
            }

            // Every further change restarts the quiet period
            let mut coalesced = 1usize;
            let stopping = loop {
                tokio::select! {
                    _ = shutdown.changed() => break true,
                    change = changes.recv() => match change {
                        Some(()) => coalesced += 1,
                        None => break true,
                    },
                    _ = tokio::time::sleep(delay) => break false,
                }
            };

            debug!(handle = %context.handle, coalesced, "Debounce window closed");
            context.save_cycle().await;
            if stopping {
                return;
            }
        }
    }
}

impl Drop for AutoSave {
    fn drop(&mut self) {
        if let Some(running) = self.running.get_mut().take() {
            self.context.tree.unsubscribe(running.subscription);
            running.worker.task.abort();
        }
    }
}
