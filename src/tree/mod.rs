//! Container Tree
//!
//! A tree of named nodes. Every node is either a [`Leaf`] holding one typed [`Value`] or
//! a [`Container`] holding uniquely named children in insertion order. Nested nodes are
//! addressed by dot-separated paths.

pub mod container;
pub mod notify;
pub mod object;
pub mod path;

pub use container::Container;
pub use notify::{ChangeEvent, SubscriptionId};
pub use object::{ObjectEncoding, ObjectValue, SharedObject};

use crate::error::TreeError;
use crate::value::{Bounds, Value, ValueKind};

/// Terminal node holding a single value
#[derive(Debug, Clone, PartialEq)]
pub struct Leaf {
    name: String,
    value: Value,
    bounds: Option<Bounds>,
}

/// Result of assigning a value to a leaf
#[derive(Debug)]
pub(crate) enum Assignment {
    Rejected,
    Unchanged,
    Changed { old: Value, new: Value },
}

impl Leaf {
    pub fn new(name: &str, value: impl Into<Value>) -> Result<Self, TreeError> {
        path::validate_name(name)?;
        Ok(Leaf {
            name: name.to_string(),
            value: value.into(),
            bounds: None,
        })
    }

    /// Numeric leaf restricted to `bounds`. The initial value must already be in range.
    pub fn with_bounds(
        name: &str,
        value: impl Into<Value>,
        bounds: Bounds,
    ) -> Result<Self, TreeError> {
        let mut leaf = Leaf::new(name, value)?;
        if !bounds.contains(&leaf.value) {
            return Err(TreeError::OutOfBounds {
                name: name.to_string(),
            });
        }
        if leaf.kind().is_numeric() {
            leaf.bounds = Some(bounds);
        }
        Ok(leaf)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn kind(&self) -> ValueKind {
        self.value.kind()
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    pub(crate) fn renamed(&self, name: &str) -> Leaf {
        Leaf {
            name: name.to_string(),
            value: self.value.clone(),
            bounds: self.bounds,
        }
    }

    /// Kind- and bounds-checked assignment
    pub(crate) fn assign(&mut self, value: Value) -> Assignment {
        if value.kind() != self.kind() {
            return Assignment::Rejected;
        }
        if let Some(bounds) = self.bounds {
            if !bounds.contains(&value) {
                return Assignment::Rejected;
            }
        }
        self.store(value)
    }

    /// Unchecked assignment; a kind change drops the bounds.
    pub(crate) fn replace(&mut self, value: Value) -> Assignment {
        if value.kind() != self.kind() {
            self.bounds = None;
        }
        self.store(value)
    }

    fn store(&mut self, value: Value) -> Assignment {
        if value == self.value {
            return Assignment::Unchanged;
        }
        let old = std::mem::replace(&mut self.value, value);
        Assignment::Changed {
            old,
            new: self.value.clone(),
        }
    }
}

/// A named tree element
#[derive(Debug, Clone)]
pub enum Node {
    Leaf(Leaf),
    Container(Container),
}

impl Node {
    pub fn name(&self) -> &str {
        match self {
            Node::Leaf(leaf) => leaf.name(),
            Node::Container(container) => container.name(),
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self, Node::Container(_))
    }

    pub fn as_leaf(&self) -> Option<&Leaf> {
        match self {
            Node::Leaf(leaf) => Some(leaf),
            Node::Container(_) => None,
        }
    }

    pub fn as_container(&self) -> Option<&Container> {
        match self {
            Node::Container(container) => Some(container),
            Node::Leaf(_) => None,
        }
    }

    pub fn value(&self) -> Option<&Value> {
        self.as_leaf().map(Leaf::value)
    }
}

impl From<Leaf> for Node {
    fn from(leaf: Leaf) -> Self {
        Node::Leaf(leaf)
    }
}

impl From<Container> for Node {
    fn from(container: Container) -> Self {
        Node::Container(container)
    }
}
