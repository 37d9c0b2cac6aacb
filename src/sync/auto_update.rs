//! Polling reconciler
//!
//! On a fixed interval, asks the store whether the persisted tree changed and, when it
//! did, loads it and reconciles it into the live tree.

use crate::config::AutoUpdateConfig;
use crate::error::ApiError;
use crate::store::TreeStore;
use crate::sync::reconcile::{reconcile, ReconcilePolicy};
use crate::sync::{blocking, emit, require_runtime, signal_channel, SyncOutcome, SyncSignal, Worker};
use crate::tree::Container;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Auto-update settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoUpdateOptions {
    pub interval: Duration,
    pub policy: ReconcilePolicy,
}

impl Default for AutoUpdateOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            policy: ReconcilePolicy::default(),
        }
    }
}

impl From<&AutoUpdateConfig> for AutoUpdateOptions {
    fn from(config: &AutoUpdateConfig) -> Self {
        Self {
            interval: Duration::from_millis(config.interval_ms),
            policy: ReconcilePolicy {
                can_add: config.can_add,
                can_remove: config.can_remove,
            },
        }
    }
}

struct UpdateContext {
    tree: Container,
    store: Arc<dyn TreeStore>,
    handle: String,
    policy: ReconcilePolicy,
    signals: broadcast::Sender<SyncSignal>,
    in_flight: tokio::sync::Mutex<()>,
}

impl UpdateContext {
    async fn poll(&self) -> SyncOutcome {
        let _cycle = self.in_flight.lock().await;
        emit(&self.signals, SyncSignal::Started);

        let store = Arc::clone(&self.store);
        let handle = self.handle.clone();
        let loaded = blocking(move || {
            if !store.has_changed(&handle)? {
                return Ok(None);
            }
            store.load(&handle).map(Some)
        })
        .await;

        let outcome = match loaded {
            Ok(Some(external)) => {
                let changes = reconcile(&self.tree, &external, self.policy);
                debug!(handle = %self.handle, changes, "Reconciled external tree");
                SyncOutcome::Completed { changes }
            }
            Ok(None) => SyncOutcome::Completed { changes: 0 },
            Err(e) => {
                warn!(handle = %self.handle, error = %e, "Auto-update tick failed");
                SyncOutcome::Failed(e.to_string())
            }
        };

        emit(&self.signals, SyncSignal::Finished(outcome.clone()));
        outcome
    }
}

/// Polling reconciler for one tree
pub struct AutoUpdate {
    context: Arc<UpdateContext>,
    interval: Duration,
    worker: Mutex<Option<Worker>>,
}

impl AutoUpdate {
    pub fn new(
        tree: Container,
        store: Arc<dyn TreeStore>,
        handle: impl Into<String>,
        options: AutoUpdateOptions,
    ) -> Self {
        Self {
            context: Arc::new(UpdateContext {
                tree,
                store,
                handle: handle.into(),
                policy: options.policy,
                signals: signal_channel(),
                in_flight: tokio::sync::Mutex::new(()),
            }),
            interval: options.interval,
            worker: Mutex::new(None),
        }
    }

    pub fn policy(&self) -> ReconcilePolicy {
        self.context.policy
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Receive `Started` / `Finished` signals for every poll
    pub fn signals(&self) -> broadcast::Receiver<SyncSignal> {
        self.context.signals.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.worker.lock().is_some()
    }

    /// Spawn the polling loop. The first poll happens one interval after starting.
    pub fn start(&self) -> Result<(), ApiError> {
        require_runtime()?;
        if self.interval.is_zero() {
            return Err(ApiError::SyncError(
                "Auto-update interval must be greater than zero".to_string(),
            ));
        }
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return Ok(());
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let context = Arc::clone(&self.context);
        let interval = self.interval;
        let task = tokio::spawn(async move {
            Self::run(context, interval, shutdown_rx).await;
        });

        *worker = Some(Worker {
            shutdown: shutdown_tx,
            task,
        });
        info!(
            handle = %self.context.handle,
            interval_ms = interval.as_millis() as u64,
            can_add = self.context.policy.can_add,
            can_remove = self.context.policy.can_remove,
            "Auto-update started"
        );
        Ok(())
    }

    /// Stop polling and wait for the loop to exit. A poll in progress completes first.
    pub async fn stop(&self) -> Result<(), ApiError> {
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            worker.shutdown().await;
            info!(handle = %self.context.handle, "Auto-update stopped");
        }
        Ok(())
    }

    /// Run one poll inline, with the usual signals
    pub async fn poll_now(&self) -> SyncOutcome {
        self.context.poll().await
    }

    async fn run(
        context: Arc<UpdateContext>,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.changed() => return,
                _ = ticker.tick() => {
                    context.poll().await;
                }
            }
        }
    }
}

impl Drop for AutoUpdate {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.get_mut().take() {
            worker.task.abort();
        }
    }
}
