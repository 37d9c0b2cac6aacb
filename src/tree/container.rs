//! Container nodes
//!
//! A [`Container`] is a cheap, cloneable handle to a shared container node. Children are
//! kept behind a per-container `RwLock`: structural changes and compare-and-assign of a
//! leaf value each run under that container's write lock, and change events are emitted
//! only after the lock is released.
//!
//! All containers of one tree also share a mutation gate. Mutators hold it shared,
//! snapshot capture holds it exclusively, which makes a snapshot atomic with respect to
//! every mutation in the tree.

use crate::error::TreeError;
use crate::tree::notify::{channel_listener, ChangeEvent, Listener, Listeners, SubscriptionId};
use crate::tree::object::registry;
use crate::tree::path::{self, split_last, validate_name};
use crate::tree::{Assignment, Leaf, Node};
use crate::value::{Bounds, FromValue, Value};
use indexmap::IndexMap;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::fmt;
use std::sync::{Arc, Weak};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tracing::trace;

pub(crate) type Children = IndexMap<String, Node>;

pub(crate) struct ContainerInner {
    name: String,
    children: RwLock<Children>,
    parent: RwLock<Weak<ContainerInner>>,
    listeners: Listeners,
    gate: Arc<RwLock<()>>,
}

/// Handle to a container node
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

/// How a value reaches an existing leaf
#[derive(Clone, Copy, PartialEq, Eq)]
enum AssignMode {
    /// Kind and bounds must match; absent leaves are not created
    Checked,
    /// Like `Checked` for same-kind values, replaces the leaf on a kind change, creates
    /// absent leaves
    Upsert,
    /// Replaces the value unconditionally; absent leaves are not created
    Overwrite,
}

enum Outcome {
    Missing,
    Rejected,
    Unchanged,
    Changed { old: Value, new: Value },
    Inserted(Value),
}

impl Container {
    /// Create the root container of a new tree
    pub fn new(name: impl Into<String>) -> Self {
        Self::attached(name.into(), Arc::new(RwLock::new(())), Weak::new())
    }

    fn attached(name: String, gate: Arc<RwLock<()>>, parent: Weak<ContainerInner>) -> Self {
        Container {
            inner: Arc::new(ContainerInner {
                name,
                children: RwLock::new(IndexMap::new()),
                parent: RwLock::new(parent),
                listeners: Listeners::default(),
                gate,
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<ContainerInner>) -> Self {
        Container { inner }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// True when both handles refer to the same container node
    pub fn ptr_eq(&self, other: &Container) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn parent(&self) -> Option<Container> {
        self.inner.parent.read().upgrade().map(Container::from_inner)
    }

    pub(crate) fn gate(&self) -> &Arc<RwLock<()>> {
        &self.inner.gate
    }

    pub(crate) fn read_children(&self) -> RwLockReadGuard<'_, Children> {
        self.inner.children.read()
    }

    fn write_children(&self) -> (RwLockReadGuard<'_, ()>, RwLockWriteGuard<'_, Children>) {
        let gate = self.inner.gate.read();
        (gate, self.inner.children.write())
    }

    // ---------------------------------------------------------------------
    // Structure
    // ---------------------------------------------------------------------

    pub fn add_leaf(&self, name: &str, value: impl Into<Value>) -> Result<(), TreeError> {
        self.attach(Node::Leaf(Leaf::new(name, value)?))
    }

    pub fn add_leaf_with_bounds(
        &self,
        name: &str,
        value: impl Into<Value>,
        bounds: Bounds,
    ) -> Result<(), TreeError> {
        self.attach(Node::Leaf(Leaf::with_bounds(name, value, bounds)?))
    }

    /// Append an empty child container and return a handle to it
    pub fn add_container(&self, name: &str) -> Result<Container, TreeError> {
        validate_name(name)?;
        let child = Self::attached(
            name.to_string(),
            Arc::clone(&self.inner.gate),
            Arc::downgrade(&self.inner),
        );
        self.attach(Node::Container(child.clone()))?;
        Ok(child)
    }

    /// Append a deep copy of `node`. The copy belongs to this tree; the original is
    /// left untouched.
    pub fn insert(&self, node: &Node) -> Result<(), TreeError> {
        self.insert_as(node.name(), node)
    }

    /// Append a deep copy of `node` under a different name
    pub fn insert_as(&self, name: &str, node: &Node) -> Result<(), TreeError> {
        validate_name(name)?;
        let copy = self.copy_node(node, name);
        self.attach(copy)
    }

    /// Append a deep copy of `node` unless the name is already taken
    pub(crate) fn insert_if_absent(&self, node: &Node) -> bool {
        if self.contains_key(node.name()) {
            return false;
        }
        let copy = self.copy_node(node, node.name());
        self.attach(copy).is_ok()
    }

    fn attach(&self, node: Node) -> Result<(), TreeError> {
        let name = node.name().to_string();
        {
            let (_gate, mut children) = self.write_children();
            if children.contains_key(&name) {
                return Err(TreeError::DuplicateName(name));
            }
            children.insert(name.clone(), node.clone());
        }
        self.track(&name, &node);
        trace!(container = %self.name(), child = %name, "Attached child");
        Ok(())
    }

    /// Remove a child, keeping the order of the remaining children
    pub fn remove_child(&self, name: &str) -> Option<Node> {
        let removed = {
            let (_gate, mut children) = self.write_children();
            children.shift_remove(name)
        };
        if let Some(node) = &removed {
            self.detach(node);
        }
        removed
    }

    pub fn clear(&self) {
        let removed: Vec<Node> = {
            let (_gate, mut children) = self.write_children();
            children.drain(..).map(|(_, node)| node).collect()
        };
        for node in &removed {
            self.detach(node);
        }
    }

    fn detach(&self, node: &Node) {
        match node {
            Node::Leaf(leaf) => self.untrack(leaf.name(), leaf.value()),
            Node::Container(container) => *container.inner.parent.write() = Weak::new(),
        }
    }

    fn track(&self, name: &str, node: &Node) {
        if let Node::Leaf(leaf) = node {
            self.track_value(name, leaf.value());
        }
    }

    fn track_value(&self, name: &str, value: &Value) {
        if let Value::Object(object) = value {
            registry().register(object.object().id(), &self.inner, name, object.encoding());
        }
    }

    fn untrack(&self, name: &str, value: &Value) {
        if let Value::Object(object) = value {
            registry().unregister(object.object().id(), &self.inner, name);
        }
    }

    // ---------------------------------------------------------------------
    // Lookup
    // ---------------------------------------------------------------------

    /// Local, single-segment lookup
    pub fn find(&self, name: &str) -> Option<Node> {
        self.inner.children.read().get(name).cloned()
    }

    /// Walk a dot-separated path through nested containers.
    ///
    /// Returns `Ok(None)` when only the terminal segment is absent and
    /// `TreeError::PathResolution` when an intermediate segment is absent or a leaf.
    pub fn find_recursive(&self, path: &str) -> Result<Option<Node>, TreeError> {
        let segments = path::segments(path);
        let last = segments.len() - 1;
        let mut current = self.clone();
        for (index, segment) in segments.iter().enumerate() {
            let node = current.find(segment);
            if index == last {
                return Ok(node);
            }
            match node {
                Some(Node::Container(next)) => current = next,
                _ => {
                    return Err(TreeError::PathResolution {
                        path: path.to_string(),
                        segment: segment.to_string(),
                    })
                }
            }
        }
        Ok(None)
    }

    /// Resolve a path to a container; `Ok(None)` when the terminal node is absent or a leaf
    pub fn find_container(&self, path: &str) -> Result<Option<Container>, TreeError> {
        Ok(match self.find_recursive(path)? {
            Some(Node::Container(container)) => Some(container),
            _ => None,
        })
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.inner.children.read().contains_key(name)
    }

    /// Child names in insertion order
    pub fn keys(&self) -> Vec<String> {
        self.inner.children.read().keys().cloned().collect()
    }

    /// Number of direct children
    pub fn count(&self) -> usize {
        self.inner.children.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.children.read().is_empty()
    }

    /// Direct children in insertion order
    pub fn children(&self) -> Vec<Node> {
        self.inner.children.read().values().cloned().collect()
    }

    /// Number of nodes below this container, at any depth
    pub fn total_count(&self) -> usize {
        self.children()
            .iter()
            .map(|node| match node {
                Node::Leaf(_) => 1,
                Node::Container(container) => 1 + container.total_count(),
            })
            .sum()
    }

    /// Full paths of every leaf below this container. The container's own name is not
    /// part of the paths.
    pub fn leaf_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        self.collect_leaf_paths("", &mut paths);
        paths
    }

    fn collect_leaf_paths(&self, prefix: &str, out: &mut Vec<String>) {
        for node in self.children() {
            let qualified = path::join(prefix, node.name());
            match node {
                Node::Leaf(_) => out.push(qualified),
                Node::Container(container) => container.collect_leaf_paths(&qualified, out),
            }
        }
    }

    // ---------------------------------------------------------------------
    // Values
    // ---------------------------------------------------------------------

    /// Copy of the value at `path`, if the path names a leaf
    pub fn value_at(&self, path: &str) -> Option<Value> {
        match self.find_recursive(path) {
            Ok(Some(Node::Leaf(leaf))) => Some(leaf.value().clone()),
            _ => None,
        }
    }

    pub fn get_value<T: FromValue>(&self, path: &str) -> Option<T> {
        self.value_at(path).and_then(|value| T::from_value(&value))
    }

    /// Typed read with a fallback. The flag is false when the default was returned.
    pub fn get_value_or<T: FromValue>(&self, path: &str, default: T) -> (T, bool) {
        match self.get_value(path) {
            Some(value) => (value, true),
            None => (default, false),
        }
    }

    /// Assign an existing leaf.
    ///
    /// Returns false when the path does not name a leaf, the value kind differs from
    /// the leaf's kind, or the value is outside the leaf's bounds.
    pub fn set_value(&self, path: &str, value: impl Into<Value>) -> bool {
        match self.resolve_parent(path) {
            Some((parent, name)) => parent.assign_local(name, value.into(), AssignMode::Checked),
            None => false,
        }
    }

    /// Overwrite the leaf at `path`, or create it in its parent container.
    ///
    /// Returns false when the parent container cannot be resolved, when `path` names a
    /// container, or when a same-kind value is outside the leaf's bounds.
    pub fn put_value(&self, path: &str, value: impl Into<Value>) -> bool {
        match self.resolve_parent(path) {
            Some((parent, name)) => parent.assign_local(name, value.into(), AssignMode::Upsert),
            None => false,
        }
    }

    /// Unchecked overwrite of a direct child leaf. `None` when there is no such leaf,
    /// otherwise whether the value changed.
    pub(crate) fn overwrite_value(&self, name: &str, value: Value) -> Option<bool> {
        match self.apply(name, value, AssignMode::Overwrite) {
            Outcome::Changed { .. } => Some(true),
            Outcome::Unchanged => Some(false),
            _ => None,
        }
    }

    fn resolve_parent<'p>(&self, path: &'p str) -> Option<(Container, &'p str)> {
        match split_last(path) {
            (None, name) => Some((self.clone(), name)),
            (Some(parent), name) => match self.find_recursive(parent) {
                Ok(Some(Node::Container(container))) => Some((container, name)),
                _ => None,
            },
        }
    }

    fn assign_local(&self, name: &str, value: Value, mode: AssignMode) -> bool {
        match self.apply(name, value, mode) {
            Outcome::Changed { .. } | Outcome::Unchanged | Outcome::Inserted(_) => true,
            Outcome::Missing | Outcome::Rejected => false,
        }
    }

    fn apply(&self, name: &str, value: Value, mode: AssignMode) -> Outcome {
        let outcome = {
            let (_gate, mut children) = self.write_children();
            match children.get_mut(name) {
                Some(Node::Leaf(leaf)) => {
                    let assignment = match mode {
                        AssignMode::Checked => leaf.assign(value),
                        AssignMode::Upsert if value.kind() == leaf.kind() => leaf.assign(value),
                        AssignMode::Upsert | AssignMode::Overwrite => leaf.replace(value),
                    };
                    match assignment {
                        Assignment::Rejected => Outcome::Rejected,
                        Assignment::Unchanged => Outcome::Unchanged,
                        Assignment::Changed { old, new } => Outcome::Changed { old, new },
                    }
                }
                Some(Node::Container(_)) => Outcome::Rejected,
                None if mode == AssignMode::Upsert => match Leaf::new(name, value.clone()) {
                    Ok(leaf) => {
                        children.insert(name.to_string(), Node::Leaf(leaf));
                        Outcome::Inserted(value)
                    }
                    Err(_) => Outcome::Rejected,
                },
                None => Outcome::Missing,
            }
        };

        match &outcome {
            Outcome::Changed { old, new } => {
                self.untrack(name, old);
                self.track_value(name, new);
                self.emit_leaf_change(name, old.clone(), new.clone());
            }
            Outcome::Inserted(value) => self.track_value(name, value),
            _ => {}
        }
        outcome
    }

    // ---------------------------------------------------------------------
    // Notification
    // ---------------------------------------------------------------------

    /// Attach a listener for leaf changes at any depth below this container
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        let listener: Listener = Arc::new(listener);
        self.inner.listeners.add(listener)
    }

    /// Attach a listener that forwards every event into a channel
    pub fn subscribe_channel(&self) -> (SubscriptionId, UnboundedReceiver<ChangeEvent>) {
        let (sender, receiver) = unbounded_channel();
        let id = self.inner.listeners.add(channel_listener(sender));
        (id, receiver)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.listeners.remove(id)
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }

    /// Report a change of the direct child leaf `leaf` here and at every ancestor,
    /// qualifying the path with one more segment per level.
    pub(crate) fn emit_leaf_change(&self, leaf: &str, old: Value, new: Value) {
        let mut event = ChangeEvent {
            path: leaf.to_string(),
            old,
            new,
        };
        let mut current = Some(Arc::clone(&self.inner));
        while let Some(node) = current {
            node.listeners.emit(&event);
            let parent = node.parent.read().upgrade();
            if parent.is_some() {
                event.path = path::join(&node.name, &event.path);
            }
            current = parent;
        }
    }

    // ---------------------------------------------------------------------
    // Copies
    // ---------------------------------------------------------------------

    /// Independent copy of this subtree as the root of a new tree. Listeners are not
    /// copied; shared embedded objects stay shared.
    pub fn deep_copy(&self) -> Container {
        self.copy_named(self.name())
    }

    /// Like [`Container::deep_copy`] with a different root name
    pub fn copy_named(&self, name: &str) -> Container {
        let root = Container::new(name);
        root.fill_from(self);
        root
    }

    fn fill_from(&self, source: &Container) {
        for node in source.children() {
            let copy = self.copy_node(&node, node.name());
            // Names are unique in the source, so this cannot collide
            let _ = self.attach(copy);
        }
    }

    /// Deep copy of `node` prepared to become a child of `self` under `name`
    fn copy_node(&self, node: &Node, name: &str) -> Node {
        match node {
            Node::Leaf(leaf) => Node::Leaf(leaf.renamed(name)),
            Node::Container(source) => {
                let copy = Self::attached(
                    name.to_string(),
                    Arc::clone(&self.inner.gate),
                    Arc::downgrade(&self.inner),
                );
                copy.fill_from(source);
                Node::Container(copy)
            }
        }
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("name", &self.inner.name)
            .field("children", &*self.inner.children.read())
            .finish()
    }
}
