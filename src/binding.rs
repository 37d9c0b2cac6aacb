//! Property Binding
//!
//! Connects one leaf of a tree to an external property given as a getter/setter pair.

use crate::error::TreeError;
use crate::tree::path;
use crate::tree::{ChangeEvent, Container, Node, SubscriptionId};
use crate::value::Value;
use std::sync::Arc;
use tracing::debug;

pub type Getter = Arc<dyn Fn() -> Value + Send + Sync>;
pub type Setter = Arc<dyn Fn(Value) + Send + Sync>;

/// Direction of a binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingMode {
    /// Tree to property, on every change
    OneWay,
    /// Both directions; writes of an equal value are suppressed
    TwoWay,
    /// Property to tree, on `push`
    OneWayToSource,
    /// Tree to property once, when bound
    OneTime,
}

impl BindingMode {
    fn follows_tree(self) -> bool {
        matches!(self, BindingMode::OneWay | BindingMode::TwoWay)
    }

    fn accepts_push(self) -> bool {
        matches!(self, BindingMode::TwoWay | BindingMode::OneWayToSource)
    }
}

/// A live binding between a leaf path and an external property. Dropping it unbinds.
pub struct Binding {
    tree: Container,
    path: String,
    mode: BindingMode,
    getter: Getter,
    subscription: Option<SubscriptionId>,
}

impl Binding {
    /// Bind the leaf at `path` below `tree`.
    ///
    /// OneWay, TwoWay and OneTime copy the leaf into the property right away;
    /// OneWayToSource copies the property into the leaf.
    pub fn bind<G, S>(
        tree: &Container,
        path: &str,
        mode: BindingMode,
        getter: G,
        setter: S,
    ) -> Result<Binding, TreeError>
    where
        G: Fn() -> Value + Send + Sync + 'static,
        S: Fn(Value) + Send + Sync + 'static,
    {
        let current = match tree.find_recursive(path)? {
            Some(Node::Leaf(leaf)) => leaf.value().clone(),
            _ => {
                return Err(TreeError::PathResolution {
                    path: path.to_string(),
                    segment: path::split_last(path).1.to_string(),
                })
            }
        };

        let getter: Getter = Arc::new(getter);
        let setter: Setter = Arc::new(setter);
        let mut binding = Binding {
            tree: tree.clone(),
            path: path.to_string(),
            mode,
            getter: Arc::clone(&getter),
            subscription: None,
        };

        match mode {
            BindingMode::OneWayToSource => {
                binding.push();
            }
            _ => {
                if mode != BindingMode::TwoWay || getter() != current {
                    setter(current);
                }
            }
        }

        if mode.follows_tree() {
            let watched = binding.path.clone();
            let id = tree.subscribe(move |event: &ChangeEvent| {
                if event.path != watched {
                    return;
                }
                if mode == BindingMode::TwoWay && getter() == event.new {
                    return;
                }
                setter(event.new.clone());
            });
            binding.subscription = Some(id);
        }

        debug!(path = %binding.path, ?mode, "Bound property");
        Ok(binding)
    }

    pub fn mode(&self) -> BindingMode {
        self.mode
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// True while tree changes still reach the property
    pub fn is_active(&self) -> bool {
        self.subscription.is_some()
    }

    /// Copy the property into the leaf. Only TwoWay and OneWayToSource bindings push;
    /// returns whether the leaf accepted the value.
    pub fn push(&self) -> bool {
        if !self.mode.accepts_push() {
            return false;
        }
        self.tree.set_value(&self.path, (self.getter)())
    }

    /// Stop following the tree. Further pushes still work for push-capable modes.
    pub fn unbind(&mut self) {
        if let Some(id) = self.subscription.take() {
            self.tree.unsubscribe(id);
        }
    }
}

impl Drop for Binding {
    fn drop(&mut self) {
        self.unbind();
    }
}
