//! Integration tests for the container node model

use super::test_utils::sample_tree;
use keytree::error::TreeError;
use keytree::tree::{Container, Node};
use keytree::value::{Bounds, Color, Value, ValueKind};

#[test]
fn test_children_keep_insertion_order() {
    let root = Container::new("Root");
    root.add_leaf("Zeta", 1i32).unwrap();
    root.add_container("Alpha").unwrap();
    root.add_leaf("Mid", "m").unwrap();

    assert_eq!(root.keys(), vec!["Zeta", "Alpha", "Mid"]);
    root.remove_child("Alpha");
    root.add_container("Alpha").unwrap();
    assert_eq!(root.keys(), vec!["Zeta", "Mid", "Alpha"]);
}

#[test]
fn test_duplicate_and_invalid_names() {
    let root = Container::new("Root");
    root.add_leaf("Name", 1i32).unwrap();

    assert!(matches!(
        root.add_container("Name"),
        Err(TreeError::DuplicateName(name)) if name == "Name"
    ));
    assert!(matches!(root.add_leaf("", 1i32), Err(TreeError::InvalidName(_))));
    assert!(matches!(root.add_leaf("a.b", 1i32), Err(TreeError::InvalidName(_))));
    assert_eq!(root.count(), 1);
}

#[test]
fn test_recursive_lookup() {
    let root = sample_tree();

    assert_eq!(root.value_at("AA.AAA.AA1"), Some(Value::I32(10)));
    assert_eq!(root.value_at("AA.AA1"), Some(Value::String("one".to_string())));
    // Terminal segment absent
    assert!(root.find_recursive("AA.Missing").unwrap().is_none());
    // Intermediate segment absent
    assert!(matches!(
        root.find_recursive("AA.Nope.AA1"),
        Err(TreeError::PathResolution { segment, .. }) if segment == "Nope"
    ));
    // Intermediate segment is a leaf
    assert!(matches!(
        root.find_recursive("A1.Below"),
        Err(TreeError::PathResolution { segment, .. }) if segment == "A1"
    ));
}

#[test]
fn test_counts_and_leaf_paths() {
    let root = sample_tree();
    assert_eq!(root.count(), 2);
    assert_eq!(root.total_count(), 5);
    assert_eq!(root.leaf_paths(), vec!["A1", "AA.AA1", "AA.AAA.AA1"]);
}

#[test]
fn test_typed_reads() {
    let root = sample_tree();
    assert_eq!(root.get_value::<i32>("A1"), Some(1));
    // Wrong type yields nothing
    assert_eq!(root.get_value::<String>("A1"), None);
    assert_eq!(root.get_value_or("A1", 0i32), (1, true));
    assert_eq!(root.get_value_or("Missing", 7i32), (7, false));
}

#[test]
fn test_set_value_checks_kind_and_bounds() {
    let root = Container::new("Root");
    root.add_leaf_with_bounds("Volume", 5i32, Bounds::new(0.0, 10.0))
        .unwrap();

    assert!(root.set_value("Volume", 8i32));
    assert!(!root.set_value("Volume", 11i32));
    assert!(!root.set_value("Volume", "loud"));
    assert!(!root.set_value("Missing", 1i32));
    assert_eq!(root.get_value::<i32>("Volume"), Some(8));
}

#[test]
fn test_bounded_leaf_must_start_in_range() {
    let root = Container::new("Root");
    assert!(matches!(
        root.add_leaf_with_bounds("Level", 20i32, Bounds::at_most(10.0)),
        Err(TreeError::OutOfBounds { name }) if name == "Level"
    ));
}

#[test]
fn test_put_value_creates_and_replaces() {
    let root = Container::new("Root");
    let ui = root.add_container("Ui").unwrap();

    assert!(root.put_value("Ui.Accent", Color::rgb(10, 20, 30)));
    assert_eq!(
        ui.find("Accent").and_then(|n| n.as_leaf().map(|l| l.kind())),
        Some(ValueKind::Color)
    );
    // A kind change replaces the leaf
    assert!(root.put_value("Ui.Accent", "red"));
    assert_eq!(root.get_value::<String>("Ui.Accent"), Some("red".to_string()));
    // Parent must exist and the target must not be a container
    assert!(!root.put_value("Missing.Leaf", 1i32));
    assert!(!root.put_value("Ui", 1i32));
}

#[test]
fn test_insert_copies_into_receiving_tree() {
    let source = sample_tree();
    let target = Container::new("Target");
    let aa = source.find("AA").unwrap();
    target.insert(&aa).unwrap();

    // Mutating the copy leaves the source alone
    assert!(target.set_value("AA.AA1", "changed"));
    assert_eq!(source.get_value::<String>("AA.AA1"), Some("one".to_string()));

    let copied = target.find_container("AA").unwrap().unwrap();
    assert!(copied.parent().unwrap().ptr_eq(&target));
}

#[test]
fn test_deep_copy_and_copy_named() {
    let source = sample_tree();
    let copy = source.deep_copy();
    assert_eq!(copy.name(), "Root");
    assert_eq!(copy.leaf_paths(), source.leaf_paths());
    assert!(!copy.ptr_eq(&source));

    copy.set_value("A1", 2i32);
    assert_eq!(source.get_value::<i32>("A1"), Some(1));

    let renamed = source.copy_named("Other");
    assert_eq!(renamed.name(), "Other");
    assert_eq!(renamed.total_count(), source.total_count());
}

#[test]
fn test_remove_and_clear_detach_children() {
    let root = sample_tree();
    let Some(Node::Container(aa)) = root.remove_child("AA") else {
        panic!("AA should be a container");
    };
    assert!(aa.parent().is_none());
    assert!(root.find("AA").is_none());

    root.clear();
    assert!(root.is_empty());
}
