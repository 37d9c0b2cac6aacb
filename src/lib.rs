//! keytree: Hierarchical Typed Key-Value Trees
//!
//! Named containers hold typed leaves and nested containers in insertion order. Trees
//! combine through set algebra, capture into snapshots that can be compared, and report
//! leaf changes to listeners on every ancestor. Background loops keep a tree and its
//! persisted copy in step: auto-save writes debounced local changes, auto-update polls
//! the store and reconciles external changes into the live tree.

pub mod algebra;
pub mod binding;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod mapping;
pub mod snapshot;
pub mod store;
pub mod sync;
pub mod tree;
pub mod value;
