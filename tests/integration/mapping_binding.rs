//! Integration tests for object mapping and property binding

use keytree::algebra::refresh;
use keytree::binding::{Binding, BindingMode};
use keytree::mapping::{read_nested, FieldDescriptor, TreeMapped};
use keytree::snapshot::Snapshot;
use keytree::store::{MemoryTreeStore, TreeStore};
use keytree::tree::Container;
use keytree::value::{FromValue, Point, Value};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Default, Clone, PartialEq)]
struct Layout {
    origin: Point,
    docked: bool,
}

impl TreeMapped for Layout {
    fn fields() -> Vec<FieldDescriptor<Self>> {
        vec![
            FieldDescriptor::leaf(
                "Origin",
                |l: &Self| Some(l.origin.into()),
                |l: &mut Self, v: &Value| {
                    l.origin = Point::from_value(v)?;
                    Some(())
                },
            ),
            FieldDescriptor::leaf(
                "Docked",
                |l: &Self| Some(l.docked.into()),
                |l: &mut Self, v: &Value| {
                    l.docked = bool::from_value(v)?;
                    Some(())
                },
            ),
        ]
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
struct Editor {
    font: String,
    size: u16,
    layout: Layout,
}

impl TreeMapped for Editor {
    fn fields() -> Vec<FieldDescriptor<Self>> {
        vec![
            FieldDescriptor::leaf(
                "Font",
                |e: &Self| Some(e.font.clone().into()),
                |e: &mut Self, v: &Value| {
                    e.font = String::from_value(v)?;
                    Some(())
                },
            ),
            FieldDescriptor::leaf(
                "Size",
                |e: &Self| Some(e.size.into()),
                |e: &mut Self, v: &Value| {
                    e.size = u16::from_value(v)?;
                    Some(())
                },
            ),
            FieldDescriptor::nested(
                "Layout",
                |e: &Self, name: &str| read_nested(&e.layout, name),
                |e: &mut Self, child: &Container| e.layout.apply_tree(child),
            ),
        ]
    }
}

fn editor() -> Editor {
    Editor {
        font: "Mono".to_string(),
        size: 12,
        layout: Layout {
            origin: Point::new(10.0, 20.0),
            docked: true,
        },
    }
}

#[test]
fn test_mapped_struct_survives_a_store() {
    let store = MemoryTreeStore::new();
    let tree = editor().to_tree("Editor").unwrap();
    assert_eq!(tree.leaf_paths(), vec!["Font", "Size", "Layout.Origin", "Layout.Docked"]);

    store.save("editor", &Snapshot::capture(&tree)).unwrap();
    let loaded = Editor::from_tree(&store.load("editor").unwrap()).unwrap();
    assert_eq!(loaded, editor());
}

#[test]
fn test_apply_tree_updates_present_fields_only() {
    let mut value = editor();
    let partial = Container::new("Partial");
    partial.add_container("Layout")
        .unwrap()
        .add_leaf("Docked", false)
        .unwrap();

    value.apply_tree(&partial).unwrap();
    assert_eq!(value.font, "Mono");
    assert!(!value.layout.docked);
    assert_eq!(value.layout.origin, Point::new(10.0, 20.0));
}

#[test]
fn test_binding_follows_refresh() {
    let tree = editor().to_tree("Editor").unwrap();
    let font = Arc::new(Mutex::new(String::new()));

    let read = Arc::clone(&font);
    let write = Arc::clone(&font);
    let binding = Binding::bind(
        &tree,
        "Font",
        BindingMode::TwoWay,
        move || Value::from(read.lock().clone()),
        move |v| {
            if let Some(text) = String::from_value(&v) {
                *write.lock() = text;
            }
        },
    )
    .unwrap();
    assert_eq!(*font.lock(), "Mono");

    let external = Container::new("Editor");
    external.add_leaf("Font", "Serif").unwrap();
    assert_eq!(refresh(&tree, &external).unwrap(), 1);
    assert_eq!(*font.lock(), "Serif");

    *font.lock() = "Sans".to_string();
    assert!(binding.push());
    assert_eq!(tree.get_value::<String>("Font"), Some("Sans".to_string()));
}

#[test]
fn test_nested_binding_path() {
    let tree = editor().to_tree("Editor").unwrap();
    let docked = Arc::new(Mutex::new(Value::Bool(false)));
    let sink = Arc::clone(&docked);
    let _binding = Binding::bind(
        &tree,
        "Layout.Docked",
        BindingMode::OneWay,
        || Value::Bool(false),
        move |v| *sink.lock() = v,
    )
    .unwrap();

    assert_eq!(*docked.lock(), Value::Bool(true));
    tree.set_value("Layout.Docked", false);
    assert_eq!(*docked.lock(), Value::Bool(false));
}
