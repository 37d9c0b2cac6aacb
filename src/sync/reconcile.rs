//! Reconciliation of an externally loaded tree into a live tree

use crate::tree::path;
use crate::tree::{Container, Node};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Which structural changes a reconcile pass may make. Values of leaves present on both
/// sides are always updated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcilePolicy {
    /// Append nodes that only exist externally
    #[serde(default)]
    pub can_add: bool,
    /// Delete nodes that only exist locally
    #[serde(default)]
    pub can_remove: bool,
}

impl ReconcilePolicy {
    pub fn update_only() -> Self {
        Self::default()
    }

    pub fn full() -> Self {
        Self {
            can_add: true,
            can_remove: true,
        }
    }
}

/// Bring `local` in line with `external` under `policy`.
///
/// Returns the number of nodes added, removed or updated. Value writes go through the
/// tree, so listeners see one change event per updated leaf.
pub fn reconcile(local: &Container, external: &Container, policy: ReconcilePolicy) -> usize {
    reconcile_at(local, external, policy, "")
}

fn reconcile_at(
    local: &Container,
    external: &Container,
    policy: ReconcilePolicy,
    prefix: &str,
) -> usize {
    let mut changes = 0;

    for theirs in external.children() {
        let qualified = path::join(prefix, theirs.name());
        match (local.find(theirs.name()), &theirs) {
            (None, _) => {
                if policy.can_add && local.insert(&theirs).is_ok() {
                    debug!(path = %qualified, "Added external node");
                    changes += 1;
                }
            }
            (Some(Node::Leaf(_)), Node::Leaf(leaf)) => {
                if local.overwrite_value(leaf.name(), leaf.value().clone()) == Some(true) {
                    changes += 1;
                }
            }
            (Some(Node::Container(mine)), Node::Container(sub)) => {
                changes += reconcile_at(&mine, sub, policy, &qualified);
            }
            (Some(mine), _) => {
                warn!(
                    path = %qualified,
                    local_is_container = mine.is_container(),
                    "Skipping node whose shape differs from the external copy"
                );
            }
        }
    }

    if policy.can_remove {
        for name in local.keys() {
            if !external.contains_key(&name) && local.remove_child(&name).is_some() {
                debug!(path = %path::join(prefix, &name), "Removed local-only node");
                changes += 1;
            }
        }
    }

    changes
}
