//! Change Notification
//!
//! Leaf value changes are reported to listeners attached to the owning container and to
//! every ancestor above it. Each container sees the path relative to itself, so a
//! listener on the root receives fully qualified names such as `"AA.AAA.AA1"`.

use crate::value::Value;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// A single leaf value change
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    /// Leaf path relative to the container the listener is attached to
    pub path: String,
    pub old: Value,
    pub new: Value,
}

/// Handle returned by `subscribe`, used to detach the listener again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub fn next() -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        SubscriptionId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

pub type Listener = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

/// Listener registry of one container
#[derive(Default)]
pub(crate) struct Listeners {
    entries: RwLock<Vec<(SubscriptionId, Listener)>>,
}

impl Listeners {
    pub(crate) fn add(&self, listener: Listener) -> SubscriptionId {
        let id = SubscriptionId::next();
        self.entries.write().push((id, listener));
        id
    }

    pub(crate) fn remove(&self, id: SubscriptionId) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|(existing, _)| *existing != id);
        entries.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Invoke every listener. The registry lock is not held while listeners run, so a
    /// listener may subscribe or unsubscribe.
    pub(crate) fn emit(&self, event: &ChangeEvent) {
        let listeners: Vec<Listener> = self
            .entries
            .read()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(event);
        }
    }
}

/// Listener that forwards events into a tokio channel
pub(crate) fn channel_listener(sender: UnboundedSender<ChangeEvent>) -> Listener {
    Arc::new(move |event: &ChangeEvent| {
        // A closed receiver just means nobody is consuming anymore
        let _ = sender.send(event.clone());
    })
}
