//! Integration tests for tree stores

use super::test_utils::sample_tree;
use keytree::error::StorageError;
use keytree::snapshot::Snapshot;
use keytree::store::{JsonFileStore, MemoryTreeStore, SledTreeStore, TreeStore};
use keytree::tree::{Container, ObjectEncoding, SharedObject};
use keytree::value::{Color, Secret, TimeSpan, Value};
use tempfile::TempDir;

/// A tree touching most value kinds
fn rich_tree() -> Container {
    let root = Container::new("Rich");
    root.add_leaf("Title", "keytree").unwrap();
    root.add_leaf("Ratio", 0.75f64).unwrap();
    root.add_leaf("Unset", f64::NAN).unwrap();
    root.add_leaf("Ceiling", f32::INFINITY).unwrap();
    root.add_leaf("Token", Secret::new("hunter2")).unwrap();
    let ui = root.add_container("Ui").unwrap();
    ui.add_leaf("Accent", Color::rgb(12, 34, 56)).unwrap();
    ui.add_leaf("Fade", TimeSpan::from_millis(250)).unwrap();
    ui.add_leaf("Recent", vec![Value::from("a"), Value::from("b")])
        .unwrap();
    let object = SharedObject::new();
    object.set("Count", 3u32);
    ui.add_leaf("Stats", object.wrap(ObjectEncoding::Embedded))
        .unwrap();
    root
}

/// Save, load back and compare leaf values
fn assert_round_trip(store: &dyn TreeStore) {
    let tree = rich_tree();
    let saved = Snapshot::capture(&tree);
    store.save("rich", &saved).unwrap();

    let loaded = store.load("rich").unwrap();
    assert_eq!(loaded.name(), "Rich");
    assert!(Snapshot::capture(&loaded).same_values(&saved));
    assert_eq!(
        loaded.get_value::<Secret>("Token").map(|s| s.expose().to_string()),
        Some("hunter2".to_string())
    );
}

/// A save made through `writer` shows up as a change for `reader` exactly once
fn assert_change_tracking(writer: &dyn TreeStore, reader: &dyn TreeStore) {
    assert!(!reader.has_changed("shared").unwrap());

    writer.save("shared", &Snapshot::capture(&sample_tree())).unwrap();
    // The writer does not see its own save as external
    assert!(!writer.has_changed("shared").unwrap());
    assert!(reader.has_changed("shared").unwrap());

    reader.load("shared").unwrap();
    assert!(!reader.has_changed("shared").unwrap());

    let bigger = sample_tree();
    bigger.add_leaf("Extra", "more data").unwrap();
    writer.save("shared", &Snapshot::capture(&bigger)).unwrap();
    assert!(reader.has_changed("shared").unwrap());
}

#[test]
fn test_memory_store_round_trip() {
    assert_round_trip(&MemoryTreeStore::new());
}

#[test]
fn test_memory_store_views_track_changes() {
    let writer = MemoryTreeStore::new();
    let reader = writer.view();
    assert_change_tracking(&writer, &reader);
    assert_eq!(writer.save_count(), 2);
    assert_eq!(writer.version("shared"), Some(2));
}

#[test]
fn test_json_store_round_trip() {
    let dir = TempDir::new().unwrap();
    let store = JsonFileStore::new(dir.path()).unwrap();
    assert_round_trip(&store);

    assert!(store.path_for("rich").exists());
    let text = std::fs::read_to_string(store.path_for("rich")).unwrap();
    assert!(text.contains("Ui.Accent"));
    assert!(text.contains("\"NaN\""));
    assert!(!text.contains("null"));
}

#[test]
fn test_non_finite_floats_stay_loadable() {
    let dir = TempDir::new().unwrap();
    let store = JsonFileStore::new(dir.path()).unwrap();
    let root = Container::new("App");
    root.add_leaf("Ratio", f64::NAN).unwrap();
    root.add_leaf("Floor", f64::NEG_INFINITY).unwrap();
    store.save("app", &Snapshot::capture(&root)).unwrap();

    let loaded = store.load("app").unwrap();
    assert!(loaded.get_value::<f64>("Ratio").unwrap().is_nan());
    assert_eq!(loaded.get_value::<f64>("Floor"), Some(f64::NEG_INFINITY));
}

#[test]
fn test_json_stores_on_one_directory_track_changes() {
    let dir = TempDir::new().unwrap();
    let writer = JsonFileStore::new(dir.path()).unwrap();
    let reader = JsonFileStore::new(dir.path()).unwrap();
    assert_change_tracking(&writer, &reader);
}

#[test]
fn test_json_store_rejects_unsafe_handles() {
    let dir = TempDir::new().unwrap();
    let store = JsonFileStore::new(dir.path()).unwrap();
    let snapshot = Snapshot::capture(&sample_tree());
    assert!(store.save("../escape", &snapshot).is_err());
    assert!(store.save("", &snapshot).is_err());
}

#[test]
fn test_sled_store_round_trip() {
    let dir = TempDir::new().unwrap();
    let store = SledTreeStore::new(dir.path().join("db")).unwrap();
    assert_round_trip(&store);
    assert_eq!(store.version("rich").unwrap(), Some(1));
}

#[test]
fn test_sled_store_change_tracking() {
    let dir = TempDir::new().unwrap();
    let db = sled::open(dir.path().join("db")).unwrap();
    let writer = SledTreeStore::from_db(db.clone());
    let reader = SledTreeStore::from_db(db);
    assert_change_tracking(&writer, &reader);
}

#[test]
fn test_sled_store_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("db");
    {
        let store = SledTreeStore::new(&path).unwrap();
        store.save("kept", &Snapshot::capture(&sample_tree())).unwrap();
        store.flush().unwrap();
    }
    let reopened = SledTreeStore::new(&path).unwrap();
    assert_eq!(reopened.handles().unwrap(), vec!["kept".to_string()]);
    assert_eq!(reopened.load("kept").unwrap().get_value::<i32>("A1"), Some(1));
}

#[test]
fn test_missing_handle() {
    let dir = TempDir::new().unwrap();
    let stores: Vec<Box<dyn TreeStore>> = vec![
        Box::new(MemoryTreeStore::new()),
        Box::new(JsonFileStore::new(dir.path().join("json")).unwrap()),
        Box::new(SledTreeStore::new(dir.path().join("sled")).unwrap()),
    ];
    for store in &stores {
        assert!(matches!(store.load("absent"), Err(StorageError::NotFound(_))));
        assert!(!store.has_changed("absent").unwrap());
        assert!(!store.exists("absent").unwrap());
    }
}

#[test]
fn test_empty_containers_are_not_persisted() {
    let store = MemoryTreeStore::new();
    let tree = sample_tree();
    tree.add_container("Empty").unwrap();
    store.put_tree("t", &tree).unwrap();
    assert!(store.load("t").unwrap().find("Empty").is_none());
}
