//! Integration tests for snapshots and diffs

use super::test_utils::sample_tree;
use keytree::snapshot::Snapshot;
use keytree::tree::{Container, ObjectEncoding, SharedObject};
use keytree::value::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

#[test]
fn test_capture_uses_full_paths() {
    let tree = sample_tree();
    let snapshot = Snapshot::capture(&tree);

    assert_eq!(snapshot.name(), "Root");
    assert_eq!(
        snapshot.paths().collect::<Vec<_>>(),
        vec!["A1", "AA.AA1", "AA.AAA.AA1"]
    );
    assert_eq!(snapshot.get("AA.AAA.AA1"), Some(&Value::I32(10)));
}

#[test]
fn test_snapshot_is_isolated_from_later_mutation() {
    let tree = sample_tree();
    let snapshot = Snapshot::capture(&tree);

    tree.set_value("A1", 99i32);
    tree.find_container("AA").unwrap().unwrap().clear();

    assert_eq!(snapshot.get("A1"), Some(&Value::I32(1)));
    assert_eq!(snapshot.len(), 3);
}

#[test]
fn test_shared_objects_are_detached_on_capture() {
    let object = SharedObject::new();
    object.set("Count", 1i32);
    let tree = Container::new("Root");
    tree.add_leaf("Stats", object.wrap(ObjectEncoding::Text)).unwrap();

    let snapshot = Snapshot::capture(&tree);
    object.set("Count", 2i32);

    let Some(Value::Object(captured)) = snapshot.get("Stats") else {
        panic!("Stats should hold an object");
    };
    assert_eq!(captured.object().get("Count"), Some(Value::I32(1)));
}

#[test]
fn test_diff_reports_changed_added_and_removed() {
    let left_tree = sample_tree();
    let right_tree = sample_tree();
    right_tree.set_value("AA.AAA.AA1", 11i32);
    right_tree.remove_child("A1");
    right_tree.add_leaf("New", true).unwrap();

    let left = Snapshot::capture(&left_tree);
    let right = Snapshot::capture(&right_tree);
    let diff = left.diff(&right);

    assert_eq!(diff.paths().collect::<Vec<_>>(), vec!["A1", "AA.AAA.AA1", "New"]);
    let changed = diff.get("AA.AAA.AA1").unwrap();
    assert_eq!(changed.left, Some(Value::I32(10)));
    assert_eq!(changed.right, Some(Value::I32(11)));
    assert_eq!(diff.get("A1").unwrap().right, None);
    assert_eq!(diff.get("New").unwrap().left, None);
    assert!(diff.get("AA.AA1").is_none());
}

#[test]
fn test_same_values() {
    let a = Snapshot::capture(&sample_tree());
    let b = Snapshot::capture(&sample_tree());
    assert!(a.same_values(&b));
    assert!(a.diff(&b).is_empty());

    let changed = sample_tree();
    changed.set_value("A1", 2i32);
    assert!(!a.same_values(&Snapshot::capture(&changed)));
}

#[test]
fn test_nan_leaf_does_not_differ_from_itself() {
    let tree = Container::new("Root");
    tree.add_leaf("Ratio", f64::NAN).unwrap();
    let a = Snapshot::capture(&tree);
    let b = Snapshot::capture(&tree);
    assert!(a.diff(&b).is_empty());
    assert!(a.same_values(&b));
}

#[test]
fn test_to_container_rebuilds_structure() {
    let original = sample_tree();
    original.add_container("Empty").unwrap();
    let rebuilt = Snapshot::capture(&original).to_container().unwrap();

    assert_eq!(rebuilt.name(), "Root");
    assert_eq!(rebuilt.leaf_paths(), original.leaf_paths());
    assert_eq!(rebuilt.get_value::<i32>("AA.AAA.AA1"), Some(10));
    // Empty containers hold no leaves and are not captured
    assert!(rebuilt.find("Empty").is_none());
}

#[test]
fn test_capture_while_mutating() {
    let tree = Container::new("Root");
    for i in 0..8 {
        tree.add_container(&format!("C{}", i))
            .unwrap()
            .add_leaf("Value", 0i64)
            .unwrap();
    }

    let running = Arc::new(AtomicBool::new(true));
    let writers: Vec<_> = (0..4)
        .map(|w| {
            let tree = tree.clone();
            let running = Arc::clone(&running);
            thread::spawn(move || {
                let mut n = 0i64;
                while running.load(Ordering::Relaxed) {
                    n += 1;
                    tree.set_value(&format!("C{}.Value", (n as usize + w) % 8), n);
                }
            })
        })
        .collect();

    for _ in 0..50 {
        let snapshot = Snapshot::capture(&tree);
        assert_eq!(snapshot.len(), 8);
    }

    running.store(false, Ordering::Relaxed);
    for writer in writers {
        writer.join().unwrap();
    }
}
