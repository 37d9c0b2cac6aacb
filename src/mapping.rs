//! Object Mapping
//!
//! Plain structs are mapped to and from container trees through an explicit table of
//! [`FieldDescriptor`]s, one per field. A leaf field reads and writes a single value;
//! a nested field maps a sub-struct to a child container.
//!
//! ```ignore
//! impl TreeMapped for Window {
//!     fn fields() -> Vec<FieldDescriptor<Self>> {
//!         vec![
//!             FieldDescriptor::leaf(
//!                 "Title",
//!                 |w: &Self| Some(w.title.clone().into()),
//!                 |w: &mut Self, v: &Value| {
//!                     w.title = String::from_value(v)?;
//!                     Some(())
//!                 },
//!             ),
//!         ]
//!     }
//! }
//! ```

use crate::error::TreeError;
use crate::tree::path;
use crate::tree::{Container, Node};
use crate::value::Value;

/// Reads a field; `None` means the field is unset and produces no node
pub type ReadValue<T> = fn(&T) -> Option<Value>;
/// Writes a field; `None` when the value cannot be stored in it
pub type WriteValue<T> = fn(&mut T, &Value) -> Option<()>;
/// Builds the child container for a nested field; `None` when unset
pub type ReadNested<T> = fn(&T, &str) -> Result<Option<Container>, TreeError>;
/// Fills a nested field from its child container
pub type WriteNested<T> = fn(&mut T, &Container) -> Result<(), TreeError>;

pub enum FieldAccess<T> {
    Leaf {
        read: ReadValue<T>,
        write: WriteValue<T>,
    },
    Nested {
        read: ReadNested<T>,
        write: WriteNested<T>,
    },
}

/// One mapped field: the node name it occupies and how to reach it
pub struct FieldDescriptor<T> {
    pub name: &'static str,
    pub access: FieldAccess<T>,
}

impl<T> FieldDescriptor<T> {
    pub fn leaf(name: &'static str, read: ReadValue<T>, write: WriteValue<T>) -> Self {
        Self {
            name,
            access: FieldAccess::Leaf { read, write },
        }
    }

    pub fn nested(name: &'static str, read: ReadNested<T>, write: WriteNested<T>) -> Self {
        Self {
            name,
            access: FieldAccess::Nested { read, write },
        }
    }
}

/// Types that map to a container tree through a field table
pub trait TreeMapped: Default {
    fn fields() -> Vec<FieldDescriptor<Self>>;

    /// Build a new tree named `name` from this value
    fn to_tree(&self, name: &str) -> Result<Container, TreeError> {
        path::validate_name(name)?;
        let tree = Container::new(name);
        self.write_into(&tree)?;
        Ok(tree)
    }

    /// Append every set field to `tree` as a leaf or child container
    fn write_into(&self, tree: &Container) -> Result<(), TreeError> {
        for field in Self::fields() {
            match field.access {
                FieldAccess::Leaf { read, .. } => {
                    if let Some(value) = read(self) {
                        tree.add_leaf(field.name, value)?;
                    }
                }
                FieldAccess::Nested { read, .. } => {
                    if let Some(child) = read(self, field.name)? {
                        tree.insert_as(field.name, &Node::Container(child))?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Build a value from `tree`. Fields without a node keep their default.
    fn from_tree(tree: &Container) -> Result<Self, TreeError> {
        let mut value = Self::default();
        value.apply_tree(tree)?;
        Ok(value)
    }

    /// Overwrite the fields present in `tree`
    fn apply_tree(&mut self, tree: &Container) -> Result<(), TreeError> {
        for field in Self::fields() {
            let Some(node) = tree.find(field.name) else {
                continue;
            };
            match (field.access, node) {
                (FieldAccess::Leaf { write, .. }, Node::Leaf(leaf)) => {
                    write(self, leaf.value()).ok_or_else(|| {
                        TreeError::Mapping(format!(
                            "Field '{}' cannot hold a {} value",
                            field.name,
                            leaf.kind()
                        ))
                    })?;
                }
                (FieldAccess::Nested { write, .. }, Node::Container(child)) => {
                    write(self, &child)?;
                }
                (_, node) => {
                    return Err(TreeError::Mapping(format!(
                        "Field '{}' maps to a {} but the tree holds a {}",
                        field.name,
                        if node.is_container() { "leaf" } else { "container" },
                        if node.is_container() { "container" } else { "leaf" },
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Nested-field reader for a field that is itself `TreeMapped`
pub fn read_nested<T: TreeMapped>(value: &T, name: &str) -> Result<Option<Container>, TreeError> {
    value.to_tree(name).map(Some)
}
