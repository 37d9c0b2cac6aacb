//! Snapshots and Diffs
//!
//! A [`Snapshot`] is a value copy of every leaf of a tree, keyed by full path, taken
//! while the tree's mutation gate is held exclusively. Later mutation of the tree never
//! shows through, including mutation of shared embedded objects (they are detached on
//! capture).

use crate::error::TreeError;
use crate::tree::path;
use crate::tree::{Container, Node};
use crate::value::Value;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Immutable leaf-path → value capture of a tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    name: String,
    taken_at: DateTime<Utc>,
    entries: IndexMap<String, Value>,
}

impl Snapshot {
    /// Capture `tree` atomically with respect to all mutation of the tree
    pub fn capture(tree: &Container) -> Snapshot {
        let _exclusive = tree.gate().write();
        let mut entries = IndexMap::new();
        collect(tree, "", &mut entries);
        Snapshot {
            name: tree.name().to_string(),
            taken_at: Utc::now(),
            entries,
        }
    }

    /// Build a snapshot from explicit entries
    pub fn from_entries(
        name: impl Into<String>,
        entries: impl IntoIterator<Item = (String, Value)>,
    ) -> Snapshot {
        Snapshot {
            name: name.into(),
            taken_at: Utc::now(),
            entries: entries.into_iter().collect(),
        }
    }

    /// Name of the captured root container
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        self.entries.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Leaf paths in capture order
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(path, value)| (path.as_str(), value))
    }

    /// True when both snapshots hold the same paths with equal values
    pub fn same_values(&self, other: &Snapshot) -> bool {
        self.entries == other.entries
    }

    pub fn diff(&self, other: &Snapshot) -> SnapshotDiff {
        SnapshotDiff::between(self, other)
    }

    /// Rebuild a tree from the captured paths. Empty containers are not part of a
    /// snapshot and do not reappear.
    pub fn to_container(&self) -> Result<Container, TreeError> {
        let root = Container::new(self.name.clone());
        for (full_path, value) in &self.entries {
            let (parent, name) = path::split_last(full_path);
            let target = match parent {
                Some(parent) => ensure_containers(&root, full_path, parent)?,
                None => root.clone(),
            };
            if target.contains_key(name) {
                return Err(TreeError::StructuralMismatch {
                    path: full_path.clone(),
                });
            }
            target.add_leaf(name, value.copied())?;
        }
        Ok(root)
    }
}

fn collect(container: &Container, prefix: &str, out: &mut IndexMap<String, Value>) {
    let children = container.read_children();
    for node in children.values() {
        let qualified = path::join(prefix, node.name());
        match node {
            Node::Leaf(leaf) => {
                out.insert(qualified, leaf.value().copied());
            }
            Node::Container(child) => collect(child, &qualified, out),
        }
    }
}

fn ensure_containers(
    root: &Container,
    full_path: &str,
    parent: &str,
) -> Result<Container, TreeError> {
    let mut current = root.clone();
    for segment in path::segments(parent) {
        current = match current.find(segment) {
            Some(Node::Container(next)) => next,
            Some(Node::Leaf(_)) => {
                return Err(TreeError::StructuralMismatch {
                    path: full_path.to_string(),
                })
            }
            None => current.add_container(segment)?,
        };
    }
    Ok(current)
}

/// Left and right value of one differing path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffEntry {
    pub left: Option<Value>,
    pub right: Option<Value>,
}

/// Every path whose value or presence differs between two snapshots
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotDiff {
    entries: IndexMap<String, DiffEntry>,
}

impl SnapshotDiff {
    /// Paths are reported in the left snapshot's order, followed by right-only paths.
    pub fn between(left: &Snapshot, right: &Snapshot) -> SnapshotDiff {
        let mut entries = IndexMap::new();
        for (path, left_value) in &left.entries {
            let right_value = right.entries.get(path);
            if right_value != Some(left_value) {
                entries.insert(
                    path.clone(),
                    DiffEntry {
                        left: Some(left_value.clone()),
                        right: right_value.cloned(),
                    },
                );
            }
        }
        for (path, right_value) in &right.entries {
            if !left.entries.contains_key(path) {
                entries.insert(
                    path.clone(),
                    DiffEntry {
                        left: None,
                        right: Some(right_value.clone()),
                    },
                );
            }
        }
        SnapshotDiff { entries }
    }

    pub fn get(&self, path: &str) -> Option<&DiffEntry> {
        self.entries.get(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DiffEntry)> {
        self.entries.iter().map(|(path, entry)| (path.as_str(), entry))
    }
}
