//! Shared Embedded Objects
//!
//! A [`SharedObject`] is an externally owned, mutable field record that leaves can wrap
//! in either of two encodings. Several leaves (in one tree or several) may wrap the same
//! instance; the [`ObjectRegistry`] keeps, per object identity, the list of leaves
//! currently wrapping it, so that one mutation of the object produces a change event on
//! every one of them.

use crate::tree::container::{Container, ContainerInner};
use crate::value::Value;
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};
use tracing::debug;

/// How an embedded object is materialized in a leaf
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectEncoding {
    /// Presented as a nested container of fields
    Embedded,
    /// Presented as JSON text
    Text,
}

/// Process-unique identity of a shared object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    fn next() -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        ObjectId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

struct ObjectCell {
    id: ObjectId,
    fields: RwLock<IndexMap<String, Value>>,
}

impl Drop for ObjectCell {
    fn drop(&mut self) {
        registry().forget(self.id);
    }
}

/// Mutable field record shared by reference
#[derive(Clone)]
pub struct SharedObject {
    cell: Arc<ObjectCell>,
}

impl SharedObject {
    pub fn new() -> Self {
        Self::with_fields(IndexMap::new())
    }

    pub fn with_fields(fields: IndexMap<String, Value>) -> Self {
        SharedObject {
            cell: Arc::new(ObjectCell {
                id: ObjectId::next(),
                fields: RwLock::new(fields),
            }),
        }
    }

    pub fn id(&self) -> ObjectId {
        self.cell.id
    }

    pub fn ptr_eq(&self, other: &SharedObject) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }

    pub fn get(&self, field: &str) -> Option<Value> {
        self.cell.fields.read().get(field).cloned()
    }

    /// Copy of the current fields
    pub fn fields(&self) -> IndexMap<String, Value> {
        self.cell.fields.read().clone()
    }

    /// Set one field. Returns the number of leaf change events emitted.
    pub fn set(&self, field: impl Into<String>, value: impl Into<Value>) -> usize {
        let field = field.into();
        let value = value.into();
        self.update(move |fields| {
            fields.insert(field, value);
        })
    }

    /// Mutate the object and notify every leaf currently wrapping it.
    ///
    /// Returns the number of change events emitted; zero when the mutation left the
    /// fields unchanged.
    pub fn update<F>(&self, mutate: F) -> usize
    where
        F: FnOnce(&mut IndexMap<String, Value>),
    {
        let (before, after) = {
            let mut fields = self.cell.fields.write();
            let before = fields.clone();
            mutate(&mut fields);
            (before, fields.clone())
        };
        if before == after {
            return 0;
        }

        let old = SharedObject::with_fields(before);
        let new = SharedObject::with_fields(after);
        let subscribers = registry().subscribers(self.id());
        debug!(object = self.id().0, leaves = subscribers.len(), "Shared object changed");

        let mut emitted = 0;
        for (inner, leaf, encoding) in subscribers {
            let container = Container::from_inner(inner);
            container.emit_leaf_change(
                &leaf,
                Value::Object(ObjectValue::new(old.clone(), encoding)),
                Value::Object(ObjectValue::new(new.clone(), encoding)),
            );
            emitted += 1;
        }
        emitted
    }

    /// Copy of this object under a new identity, with no subscribers
    pub fn detached(&self) -> SharedObject {
        SharedObject::with_fields(self.fields())
    }

    /// Wrap this instance as a leaf value
    pub fn wrap(&self, encoding: ObjectEncoding) -> Value {
        Value::Object(ObjectValue::new(self.clone(), encoding))
    }

    /// Number of leaves currently wrapping this instance
    pub fn subscriber_count(&self) -> usize {
        registry().subscriber_count(self.id())
    }
}

impl Default for SharedObject {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SharedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedObject")
            .field("id", &self.cell.id.0)
            .field("fields", &*self.cell.fields.read())
            .finish()
    }
}

/// Leaf value wrapping a shared object in one encoding
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "ObjectRepr", into = "ObjectRepr")]
pub struct ObjectValue {
    object: SharedObject,
    encoding: ObjectEncoding,
}

impl ObjectValue {
    pub fn new(object: SharedObject, encoding: ObjectEncoding) -> Self {
        ObjectValue { object, encoding }
    }

    pub fn object(&self) -> &SharedObject {
        &self.object
    }

    pub fn encoding(&self) -> ObjectEncoding {
        self.encoding
    }

    /// Same encoding over a detached copy of the object
    pub fn detached(&self) -> ObjectValue {
        ObjectValue::new(self.object.detached(), self.encoding)
    }

    /// JSON text form of the fields
    pub fn to_text(&self) -> String {
        serde_json::to_string(&self.object.fields()).unwrap_or_default()
    }

    /// Container form of the fields; every field becomes a leaf.
    pub fn to_container(&self, name: &str) -> Container {
        let container = Container::new(name);
        for (field, value) in self.object.fields() {
            // Fields that cannot be addressed by a path are left out
            let _ = container.add_leaf(&field, value.copied());
        }
        container
    }
}

impl PartialEq for ObjectValue {
    fn eq(&self, other: &Self) -> bool {
        self.encoding == other.encoding
            && (self.object.ptr_eq(&other.object) || self.object.fields() == other.object.fields())
    }
}

#[derive(Serialize, Deserialize)]
struct ObjectRepr {
    encoding: ObjectEncoding,
    fields: IndexMap<String, Value>,
}

impl From<ObjectRepr> for ObjectValue {
    fn from(repr: ObjectRepr) -> Self {
        ObjectValue::new(SharedObject::with_fields(repr.fields), repr.encoding)
    }
}

impl From<ObjectValue> for ObjectRepr {
    fn from(value: ObjectValue) -> Self {
        ObjectRepr {
            encoding: value.encoding,
            fields: value.object.fields(),
        }
    }
}

struct Subscription {
    container: Weak<ContainerInner>,
    leaf: String,
    encoding: ObjectEncoding,
}

/// Leaves wrapping each live shared object, keyed by object identity
#[derive(Default)]
pub(crate) struct ObjectRegistry {
    subscribers: Mutex<HashMap<ObjectId, Vec<Subscription>>>,
}

pub(crate) fn registry() -> &'static ObjectRegistry {
    static REGISTRY: OnceLock<ObjectRegistry> = OnceLock::new();
    REGISTRY.get_or_init(ObjectRegistry::default)
}

impl ObjectRegistry {
    pub(crate) fn register(
        &self,
        id: ObjectId,
        container: &Arc<ContainerInner>,
        leaf: &str,
        encoding: ObjectEncoding,
    ) {
        let mut subscribers = self.subscribers.lock();
        let entries = subscribers.entry(id).or_default();
        entries.retain(|s| {
            s.container.strong_count() > 0
                && !(s.leaf == leaf && Weak::ptr_eq(&s.container, &Arc::downgrade(container)))
        });
        entries.push(Subscription {
            container: Arc::downgrade(container),
            leaf: leaf.to_string(),
            encoding,
        });
    }

    pub(crate) fn unregister(&self, id: ObjectId, container: &Arc<ContainerInner>, leaf: &str) {
        let mut subscribers = self.subscribers.lock();
        if let Some(entries) = subscribers.get_mut(&id) {
            let target = Arc::downgrade(container);
            entries.retain(|s| {
                s.container.strong_count() > 0
                    && !(s.leaf == leaf && Weak::ptr_eq(&s.container, &target))
            });
            if entries.is_empty() {
                subscribers.remove(&id);
            }
        }
    }

    fn forget(&self, id: ObjectId) {
        self.subscribers.lock().remove(&id);
    }

    fn subscriber_count(&self, id: ObjectId) -> usize {
        self.subscribers
            .lock()
            .get(&id)
            .map(|entries| entries.iter().filter(|s| s.container.strong_count() > 0).count())
            .unwrap_or(0)
    }

    /// Live subscribers of an object. Upgrading happens after the registry lock is
    /// released: dropping the last handle of a container may drop objects, which
    /// re-enter the registry.
    fn subscribers(&self, id: ObjectId) -> Vec<(Arc<ContainerInner>, String, ObjectEncoding)> {
        let weak: Vec<(Weak<ContainerInner>, String, ObjectEncoding)> = {
            let mut subscribers = self.subscribers.lock();
            match subscribers.get_mut(&id) {
                Some(entries) => {
                    entries.retain(|s| s.container.strong_count() > 0);
                    entries
                        .iter()
                        .map(|s| (s.container.clone(), s.leaf.clone(), s.encoding))
                        .collect()
                }
                None => Vec::new(),
            }
        };
        weak.into_iter()
            .filter_map(|(container, leaf, encoding)| {
                container.upgrade().map(|inner| (inner, leaf, encoding))
            })
            .collect()
    }
}
