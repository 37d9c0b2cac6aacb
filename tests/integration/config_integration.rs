//! Integration tests for Configuration System

use super::test_utils::with_config_home;
use keytree::config::{ConfigLoader, StoreBackend};
use keytree::snapshot::Snapshot;
use keytree::sync::ReconcilePolicy;
use keytree::tree::Container;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_config_file_drives_sync_options() {
    let temp_dir = TempDir::new().unwrap();
    let config_file = temp_dir.path().join("keytree.toml");

    std::fs::write(
        &config_file,
        r#"
[store]
backend = "sled"
path = "data/trees"
handle = "settings"

[auto_save]
delay_ms = 250
filter_enabled = true
filters = ["Ui", "Editor.Font"]

[auto_update]
interval_ms = 2000
can_add = true
"#,
    )
    .unwrap();

    let config = ConfigLoader::load_from_file(&config_file).unwrap();
    assert!(config.validate().is_ok());
    assert_eq!(config.store.backend, StoreBackend::Sled);
    assert_eq!(config.store.handle, "settings");

    let save = config.auto_save.options();
    assert_eq!(save.delay, Duration::from_millis(250));
    assert!(save.qualifies("Ui.Zoom"));
    assert!(save.qualifies("Editor.Font"));
    assert!(!save.qualifies("Editor.FontSize"));

    let update = config.auto_update.options();
    assert_eq!(update.interval, Duration::from_secs(2));
    assert_eq!(
        update.policy,
        ReconcilePolicy {
            can_add: true,
            can_remove: false
        }
    );
}

#[test]
fn test_invalid_values_fail_validation() {
    let temp_dir = TempDir::new().unwrap();
    let config_file = temp_dir.path().join("bad.toml");
    std::fs::write(
        &config_file,
        r#"
[store]
handle = "../escape"

[auto_update]
interval_ms = 0
"#,
    )
    .unwrap();

    let config = ConfigLoader::load_from_file(&config_file).unwrap();
    let errors = config.validate().unwrap_err();
    assert_eq!(errors.len(), 2);
    assert!(config.ensure_valid().is_err());
}

#[test]
fn test_opened_store_resolves_relative_path() {
    let workspace = TempDir::new().unwrap();
    let config_file = workspace.path().join("keytree.toml");
    std::fs::write(
        &config_file,
        r#"
[store]
backend = "json"
path = "state"
"#,
    )
    .unwrap();

    let config = ConfigLoader::load_from_file(&config_file).unwrap();
    let store = config.store.open(workspace.path()).unwrap();

    let tree = Container::new("App");
    tree.add_leaf("Answer", 42i32).unwrap();
    store.save("app", &Snapshot::capture(&tree)).unwrap();

    assert!(workspace.path().join("state").join("app.json").exists());
    assert_eq!(store.load("app").unwrap().get_value::<i32>("Answer"), Some(42));
}

#[test]
fn test_workspace_file_overrides_global_file() {
    let test_dir = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();

    let global_dir = test_dir.path().join("keytree");
    std::fs::create_dir_all(&global_dir).unwrap();
    std::fs::write(
        global_dir.join("config.toml"),
        r#"
[auto_save]
delay_ms = 900

[auto_update]
interval_ms = 4000
"#,
    )
    .unwrap();

    std::fs::create_dir_all(workspace.path().join("config")).unwrap();
    std::fs::write(
        workspace.path().join("config").join("config.toml"),
        r#"
[auto_save]
delay_ms = 100
"#,
    )
    .unwrap();

    let config = with_config_home(&test_dir, || ConfigLoader::load(workspace.path()).unwrap());
    assert_eq!(config.auto_save.delay_ms, 100);
    assert_eq!(config.auto_update.interval_ms, 4000);
    assert_eq!(config.store.handle, "default");
}
