//! Set Algebra over Container Trees
//!
//! `union`, `intersect` and `except` build new trees and never alias their inputs.
//! `merge`, `remove`, `inverted_remove` and `refresh` mutate their first operand in
//! place and never touch the second.
//!
//! Every operation works name by name at each level, and only containers recurse.
//! Where both sides hold a value for the same name the left side wins. `except` removes
//! whole top-level nodes, while `merge` and `inverted_remove` recurse into shared
//! containers; callers rely on that asymmetry.

use crate::error::TreeError;
use crate::tree::path;
use crate::tree::{Container, Node};
use std::collections::HashSet;
use tracing::debug;

/// All of `a`, plus whatever `b` has that `a` lacks. Named after `a`.
pub fn union(a: &Container, b: &Container) -> Container {
    let result = a.deep_copy();
    union_into(&result, b);
    result
}

/// Differing shared containers are extended where they stand, so `a`'s order holds
fn union_into(target: &Container, b: &Container) {
    for b_node in b.children() {
        match (target.find(b_node.name()), &b_node) {
            (None, _) => {
                // Names are unique in `b`, so nothing else can have claimed this one
                let _ = target.insert(&b_node);
            }
            (Some(Node::Container(mine)), Node::Container(theirs)) => {
                if !identical(&mine, theirs) {
                    union_into(&mine, theirs);
                }
            }
            _ => {}
        }
    }
}

/// Names present in both trees, with `a`'s values. Named after `a`.
pub fn intersect(a: &Container, b: &Container) -> Container {
    let result = Container::new(a.name());
    for a_node in a.children() {
        let Some(b_node) = b.find(a_node.name()) else {
            continue;
        };
        let _ = match (&a_node, &b_node) {
            (Node::Container(mine), Node::Container(theirs)) if !identical(mine, theirs) => {
                result.insert(&Node::Container(intersect(mine, theirs)))
            }
            _ => result.insert(&a_node),
        };
    }
    result
}

/// Copy of `a` without any top-level node whose name also appears in `b`.
///
/// Shared containers are removed whole; nothing is subtracted inside them.
pub fn except(a: &Container, b: &Container) -> Container {
    let result = a.deep_copy();
    for name in b.keys() {
        result.remove_child(&name);
    }
    result
}

/// True when both trees have the same set of full leaf paths. Values are ignored.
pub fn identical(a: &Container, b: &Container) -> bool {
    if a.ptr_eq(b) {
        return true;
    }
    let left: HashSet<String> = a.leaf_paths().into_iter().collect();
    let right: HashSet<String> = b.leaf_paths().into_iter().collect();
    left.len() == right.len() && left == right
}

/// Add to `a` everything from `b` that `a` lacks, recursing into shared containers.
/// Existing values in `a` are never overwritten.
pub fn merge(a: &Container, b: &Container) {
    for b_node in b.children() {
        match (a.find(b_node.name()), &b_node) {
            (None, _) => {
                a.insert_if_absent(&b_node);
            }
            (Some(Node::Container(mine)), Node::Container(theirs)) => merge(&mine, theirs),
            _ => {}
        }
    }
}

/// Delete from `a` every direct child whose name appears in `b`. No recursion.
pub fn remove(a: &Container, b: &Container) {
    for name in b.keys() {
        a.remove_child(&name);
    }
}

/// Delete from `a` every node whose name is absent in `b`, recursing into containers
/// present on both sides.
pub fn inverted_remove(a: &Container, b: &Container) {
    for a_node in a.children() {
        match (&a_node, b.find(a_node.name())) {
            (_, None) => {
                a.remove_child(a_node.name());
            }
            (Node::Container(mine), Some(Node::Container(theirs))) => {
                inverted_remove(mine, &theirs)
            }
            _ => {}
        }
    }
}

/// Push every leaf value of `changed` into the matching leaf of `a`.
///
/// Nodes are never added or removed: names missing from `a` are skipped. A name that is
/// a container on one side and a leaf on the other is a `StructuralMismatch`.
/// Returns the number of leaves whose value changed.
pub fn refresh(a: &Container, changed: &Container) -> Result<usize, TreeError> {
    refresh_at(a, changed, "")
}

fn refresh_at(a: &Container, changed: &Container, prefix: &str) -> Result<usize, TreeError> {
    let mut updated = 0;
    for node in changed.children() {
        let qualified = path::join(prefix, node.name());
        match (a.find(node.name()), &node) {
            (None, _) => {}
            (Some(Node::Container(mine)), Node::Container(theirs)) => {
                updated += refresh_at(&mine, theirs, &qualified)?;
            }
            (Some(Node::Leaf(_)), Node::Leaf(leaf)) => {
                if a.overwrite_value(leaf.name(), leaf.value().clone()) == Some(true) {
                    updated += 1;
                }
            }
            _ => {
                return Err(TreeError::StructuralMismatch { path: qualified });
            }
        }
    }
    if updated > 0 {
        debug!(container = %a.name(), updated, "Refreshed leaf values");
    }
    Ok(updated)
}
