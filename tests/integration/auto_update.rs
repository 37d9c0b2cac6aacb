//! Integration tests for the polling auto-update loop

use super::test_utils::next_finished;
use keytree::error::{ApiError, StorageError};
use keytree::snapshot::Snapshot;
use keytree::store::{MemoryTreeStore, Revision, TreeStore};
use keytree::sync::{AutoUpdate, AutoUpdateOptions, ReconcilePolicy, SyncOutcome, SyncSignal};
use keytree::tree::Container;
use std::sync::Arc;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(5);

fn options(policy: ReconcilePolicy) -> AutoUpdateOptions {
    AutoUpdateOptions {
        interval: Duration::from_millis(50),
        policy,
    }
}

/// Live
/// ├── Volume = 5
/// ├── LocalOnly = true
/// └── Ui
///     └── Zoom = 100
fn local_tree() -> Container {
    let root = Container::new("Live");
    root.add_leaf("Volume", 5i32).unwrap();
    root.add_leaf("LocalOnly", true).unwrap();
    root.add_container("Ui").unwrap().add_leaf("Zoom", 100i32).unwrap();
    root
}

/// Live
/// ├── Volume = 9
/// ├── Added = "new"
/// └── Ui
///     └── Zoom = 100
fn external_tree() -> Container {
    let root = Container::new("Live");
    root.add_leaf("Volume", 9i32).unwrap();
    root.add_leaf("Added", "new").unwrap();
    root.add_container("Ui").unwrap().add_leaf("Zoom", 100i32).unwrap();
    root
}

/// Store whose change probe always fails
struct BrokenStore;

impl TreeStore for BrokenStore {
    fn read_snapshot(&self, handle: &str) -> Result<(Snapshot, Revision), StorageError> {
        Err(StorageError::NotFound(handle.to_string()))
    }

    fn mark_seen(&self, _handle: &str, _revision: Revision) {}

    fn save(&self, _handle: &str, _snapshot: &Snapshot) -> Result<(), StorageError> {
        Ok(())
    }

    fn has_changed(&self, _handle: &str) -> Result<bool, StorageError> {
        Err(StorageError::Backend("connection lost".to_string()))
    }

    fn handles(&self) -> Result<Vec<String>, StorageError> {
        Ok(Vec::new())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_update_only_policy_changes_values() {
    let shared = MemoryTreeStore::new();
    shared.put_tree("live", &external_tree()).unwrap();

    let tree = local_tree();
    let (_id, mut events) = tree.subscribe_channel();
    let updater = AutoUpdate::new(
        tree.clone(),
        Arc::new(shared.view()),
        "live",
        options(ReconcilePolicy::update_only()),
    );
    let mut signals = updater.signals();
    updater.start().unwrap();

    let finished = next_finished(&mut signals, WAIT).await;
    assert_eq!(
        finished,
        Some(SyncSignal::Finished(SyncOutcome::Completed { changes: 1 }))
    );
    updater.stop().await.unwrap();

    assert_eq!(tree.get_value::<i32>("Volume"), Some(9));
    assert!(tree.find("Added").is_none());
    assert!(tree.find("LocalOnly").is_some());

    let event = events.try_recv().unwrap();
    assert_eq!(event.path, "Volume");
    assert!(events.try_recv().is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_full_policy_adds_and_removes() {
    let shared = MemoryTreeStore::new();
    shared.put_tree("live", &external_tree()).unwrap();

    let tree = local_tree();
    let updater = AutoUpdate::new(
        tree.clone(),
        Arc::new(shared.view()),
        "live",
        options(ReconcilePolicy::full()),
    );
    let mut signals = updater.signals();
    updater.start().unwrap();

    // Volume updated, Added added, LocalOnly removed
    let finished = next_finished(&mut signals, WAIT).await;
    assert_eq!(
        finished,
        Some(SyncSignal::Finished(SyncOutcome::Completed { changes: 3 }))
    );
    assert_eq!(tree.keys(), vec!["Volume", "Ui", "Added"]);

    // Later polls see nothing new
    let idle = next_finished(&mut signals, WAIT).await;
    assert_eq!(
        idle,
        Some(SyncSignal::Finished(SyncOutcome::Completed { changes: 0 }))
    );

    // A further external save is picked up on the next tick
    let newer = external_tree();
    newer.set_value("Ui.Zoom", 150i32);
    shared.put_tree("live", &newer).unwrap();
    let mut seen_update = false;
    for _ in 0..5 {
        if next_finished(&mut signals, WAIT).await
            == Some(SyncSignal::Finished(SyncOutcome::Completed { changes: 1 }))
        {
            seen_update = true;
            break;
        }
    }
    assert!(seen_update);
    assert_eq!(tree.get_value::<i32>("Ui.Zoom"), Some(150));

    updater.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failures_keep_polling() {
    let updater = AutoUpdate::new(
        local_tree(),
        Arc::new(BrokenStore),
        "live",
        options(ReconcilePolicy::default()),
    );
    let mut signals = updater.signals();
    updater.start().unwrap();

    for _ in 0..2 {
        let finished = next_finished(&mut signals, WAIT).await;
        assert!(matches!(
            finished,
            Some(SyncSignal::Finished(SyncOutcome::Failed(message))) if message.contains("connection lost")
        ));
    }
    assert!(updater.is_running());
    updater.stop().await.unwrap();
    assert!(!updater.is_running());
}

#[tokio::test]
async fn test_zero_interval_is_rejected() {
    let updater = AutoUpdate::new(
        local_tree(),
        Arc::new(MemoryTreeStore::new()),
        "live",
        AutoUpdateOptions {
            interval: Duration::ZERO,
            policy: ReconcilePolicy::default(),
        },
    );
    assert!(matches!(updater.start(), Err(ApiError::SyncError(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_first_poll_waits_one_interval() {
    let shared = MemoryTreeStore::new();
    shared.put_tree("live", &external_tree()).unwrap();
    let tree = local_tree();
    let updater = AutoUpdate::new(
        tree.clone(),
        Arc::new(shared.view()),
        "live",
        AutoUpdateOptions {
            interval: Duration::from_secs(60),
            policy: ReconcilePolicy::default(),
        },
    );
    updater.start().unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(tree.get_value::<i32>("Volume"), Some(5));
    updater.stop().await.unwrap();
}
