//! Shared test utilities for integration tests
//!
//! Serializes access to the configuration environment variables and provides the small
//! sample trees most tests start from.

use keytree::sync::SyncSignal;
use keytree::tree::Container;
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::broadcast;

/// Global mutex to serialize environment variable access across all tests
static ENV_MUTEX: Mutex<()> = Mutex::new(());

const ENV_VARS: &[&str] = &["HOME", "XDG_CONFIG_HOME", "KEYTREE_ENV"];

/// Environment variable state to restore after test
struct EnvState {
    saved: Vec<(&'static str, Option<String>)>,
}

impl EnvState {
    fn capture() -> Self {
        Self {
            saved: ENV_VARS
                .iter()
                .map(|name| (*name, std::env::var(name).ok()))
                .collect(),
        }
    }

    fn restore(self) {
        for (name, value) in self.saved {
            match value {
                Some(orig) => std::env::set_var(name, orig),
                None => std::env::remove_var(name),
            }
        }
    }
}

/// Run `f` with HOME and XDG_CONFIG_HOME pointed into `test_dir`
pub fn with_config_home<F, R>(test_dir: &TempDir, f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let env_state = EnvState::capture();

    let test_home = test_dir.path().join("home");
    std::fs::create_dir_all(&test_home).unwrap();

    std::env::set_var("HOME", test_home.to_str().unwrap());
    std::env::set_var("XDG_CONFIG_HOME", test_dir.path().to_str().unwrap());
    std::env::remove_var("KEYTREE_ENV");

    let result = f();

    env_state.restore();

    result
}

/// The tree used throughout the notification tests:
///
/// ```text
/// Root
/// ├── A1 = 1
/// └── AA
///     ├── AA1 = "one"
///     └── AAA
///         └── AA1 = 10
/// ```
pub fn sample_tree() -> Container {
    let root = Container::new("Root");
    root.add_leaf("A1", 1i32).unwrap();
    let aa = root.add_container("AA").unwrap();
    aa.add_leaf("AA1", "one").unwrap();
    let aaa = aa.add_container("AAA").unwrap();
    aaa.add_leaf("AA1", 10i32).unwrap();
    root
}

/// Wait for the next `Finished` signal, skipping `Started`
pub async fn next_finished(signals: &mut broadcast::Receiver<SyncSignal>, within: Duration) -> Option<SyncSignal> {
    tokio::time::timeout(within, async {
        loop {
            match signals.recv().await {
                Ok(signal @ SyncSignal::Finished(_)) => return Some(signal),
                Ok(SyncSignal::Started) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
    .await
    .ok()
    .flatten()
}
