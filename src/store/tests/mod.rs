//! Unit tests for the store and its node handles.
//!
//! Every test works in its own temporary directory with synchronous saves
//! unless it is about debouncing.

#![allow(clippy::panic)]

use std::{fs, thread, time::Duration};

use serde_json::{Value, json};
use tempfile::TempDir;

use super::*;

fn snapshot(value: Value) -> Snapshot {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

fn open_json(dir: &TempDir, options: StoreOptions) -> ConfigStore {
    let options = StoreOptions {
        file_path: dir.path().join("settings.json"),
        ..options
    };
    ConfigStore::open(options).unwrap()
}

fn on_disk(store: &ConfigStore) -> Value {
    serde_json::from_slice(&fs::read(store.path()).unwrap()).unwrap()
}

mod lifecycle {
    use super::*;

    #[test]
    fn open_creates_file_with_initial_data() {
        let dir = TempDir::new().unwrap();
        let store = open_json(
            &dir,
            StoreOptions::default().initial_data(snapshot(json!({"name": "demo"}))),
        );

        assert_eq!(store.format(), Format::Json);
        assert_eq!(on_disk(&store), json!({"name": "demo"}));
        assert_eq!(store.persist_state(), PersistState::Clean);
        assert_eq!(store.stats().unwrap().saves, 1);
    }

    #[test]
    fn existing_file_wins_over_initial_data() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("settings.json"), r#"{"kept": true}"#).unwrap();

        let store = open_json(
            &dir,
            StoreOptions::default().initial_data(snapshot(json!({"ignored": 1}))),
        );

        assert_eq!(store.to_dict().unwrap(), snapshot(json!({"kept": true})));
        assert_eq!(store.stats().unwrap(), StoreStats { saves: 0, loads: 1 });
    }

    #[test]
    fn replace_discards_existing_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("settings.json"), r#"{"old": 1}"#).unwrap();

        let store = open_json(
            &dir,
            StoreOptions::default()
                .initial_data(snapshot(json!({"new": 2})))
                .replace(true),
        );

        assert_eq!(on_disk(&store), json!({"new": 2}));
    }

    #[test]
    fn extension_is_appended_for_format() {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::open(
            StoreOptions::new(dir.path().join("app")).format(Format::Yaml),
        )
        .unwrap();

        assert_eq!(store.path(), dir.path().join("app.yaml"));
        assert!(store.path().exists());
    }

    #[test]
    fn reserved_initial_data_is_rejected_before_touching_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");

        let result = ConfigStore::open(
            StoreOptions::new(&path).initial_data(snapshot(json!({"save": 1}))),
        );

        assert!(matches!(result, Err(ConfigError::ReservedKeyword(key)) if key == "save"));
        assert!(!path.exists());
    }

    #[test]
    fn drop_flushes_when_auto_save_is_on() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        {
            let store = ConfigStore::open(
                StoreOptions::new(&path).debounce_milliseconds(10_000),
            )
            .unwrap();
            store.write("a", 1, false).unwrap();
            assert!(store.is_dirty());
        }

        let written: Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(written, json!({"a": 1}));
    }

    #[test]
    fn close_saves_even_without_auto_save() {
        let dir = TempDir::new().unwrap();
        let store = open_json(&dir, StoreOptions::default().auto_save(false));
        let path = store.path().to_path_buf();

        store.write("a", 1, false).unwrap();
        store.close().unwrap();

        let written: Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(written, json!({"a": 1}));
    }
}

mod reads_and_writes {
    use super::*;

    #[test]
    fn read_returns_default_for_missing_paths() {
        let dir = TempDir::new().unwrap();
        let store = open_json(&dir, StoreOptions::default());
        store.write("db.port", 5432, false).unwrap();

        assert_eq!(store.read("db.port", Value::Null).unwrap(), json!(5432));
        assert_eq!(store.read("db.user", "admin").unwrap(), json!("admin"));
        assert_eq!(store.read("db", Value::Null).unwrap(), json!({"port": 5432}));
    }

    #[test]
    fn read_as_reports_missing_and_mismatched_values() {
        let dir = TempDir::new().unwrap();
        let store = open_json(&dir, StoreOptions::default());
        store.write("db.host", "localhost", false).unwrap();

        assert_eq!(store.read_as::<String>("db.host").unwrap(), "localhost");
        assert!(matches!(
            store.read_as::<u16>("db.host"),
            Err(ConfigError::TypeMismatch { .. })
        ));
        assert!(matches!(
            store.read_as::<u16>("db.port"),
            Err(ConfigError::NotFound(_))
        ));
    }

    #[test]
    fn get_returns_handles_for_mappings() {
        let dir = TempDir::new().unwrap();
        let store = open_json(&dir, StoreOptions::default());
        store.write("db.port", 1, false).unwrap();

        let item = store.get("db").unwrap().unwrap();
        assert!(item.is_node());
        assert_eq!(item.into_node().unwrap().keys().unwrap(), ["port"]);
        assert_eq!(
            store.get("db.port").unwrap().unwrap().as_value(),
            Some(&json!(1))
        );
        assert!(store.get("missing").unwrap().is_none());
    }

    #[test]
    fn write_refuses_reserved_first_segment_only() {
        let dir = TempDir::new().unwrap();
        let store = open_json(&dir, StoreOptions::default());

        assert!(matches!(
            store.write("update.x", 1, false),
            Err(ConfigError::ReservedKeyword(_))
        ));
        store.write("section.update", 1, false).unwrap();
        assert!(store.contains("section.update").unwrap());
    }

    #[test]
    fn equal_write_does_not_save_again() {
        let dir = TempDir::new().unwrap();
        let store = open_json(&dir, StoreOptions::default());

        store.write("a", 1, false).unwrap();
        let saves = store.stats().unwrap().saves;
        store.write("a", 1, false).unwrap();

        assert_eq!(store.stats().unwrap().saves, saves);
        assert!(!store.is_dirty());
    }

    #[test]
    fn failed_write_leaves_state_clean() {
        let dir = TempDir::new().unwrap();
        let store = open_json(&dir, StoreOptions::default());
        store.write("a", 1, false).unwrap();

        assert!(matches!(
            store.write("a.b", 2, false),
            Err(ConfigError::PathConflict { .. })
        ));
        assert!(!store.is_dirty());
        assert_eq!(on_disk(&store), json!({"a": 1}));
    }

    #[test]
    fn failed_update_changes_nothing() {
        let dir = TempDir::new().unwrap();
        let store = open_json(&dir, StoreOptions::default());

        let result = store.update(snapshot(json!({"ok": 1, "x..y": 2})));

        assert!(matches!(result, Err(ConfigError::InvalidPath(_))));
        assert!(!store.contains("ok").unwrap());
        assert!(!store.is_dirty());
        assert_eq!(on_disk(&store), json!({}));
    }

    #[test]
    fn partially_applied_mutation_is_still_saved() {
        let dir = TempDir::new().unwrap();
        let store = open_json(&dir, StoreOptions::default().auto_save(false));

        let result = store.shared.mutate(|tree| {
            tree.write_path("ok", json!(1), false)?;
            Err::<(), _>(ConfigError::NotFound("later".to_string()))
        });

        assert!(matches!(result, Err(ConfigError::NotFound(_))));
        assert!(store.is_dirty());
        store.save().unwrap();
        assert_eq!(on_disk(&store), json!({"ok": 1}));
    }

    #[test]
    fn nested_dotted_keys_are_rejected_everywhere() {
        let dir = TempDir::new().unwrap();
        let store = open_json(&dir, StoreOptions::default());
        store.write("a.z", 0, false).unwrap();

        for result in [
            store.write("a.new", json!({"b.c": 1}), false),
            store.root().set("other", json!({"b.c": 1}), false),
            store.update(snapshot(json!({"a": {"b.c": 1}}))),
            store.update(snapshot(json!({"fresh": {"b.c": 1}}))),
        ] {
            assert!(matches!(result, Err(ConfigError::InvalidPath(_))));
        }

        assert_eq!(store.to_dict().unwrap(), snapshot(json!({"a": {"z": 0}})));
        assert!(!store.is_dirty());
    }

    #[test]
    fn set_data_replaces_everything() {
        let dir = TempDir::new().unwrap();
        let store = open_json(&dir, StoreOptions::default());
        store.write("a", 1, false).unwrap();

        store.set_data(snapshot(json!({"b": {"c": 2}}))).unwrap();

        assert_eq!(on_disk(&store), json!({"b": {"c": 2}}));
        assert!(matches!(
            store.set_data(snapshot(json!({"x": {"bad.key": 1}}))),
            Err(ConfigError::InvalidPath(_))
        ));
    }

    #[test]
    fn delete_all_empties_tree_and_removes_file() {
        let dir = TempDir::new().unwrap();
        let store = open_json(
            &dir,
            StoreOptions::default()
                .initial_data(snapshot(json!({"a": 1})))
                .process_safe(true),
        );

        assert!(store.delete_all().unwrap());
        assert!(!store.path().exists());
        assert!(store.to_dict().unwrap().is_empty());
        assert!(!store.delete_all().unwrap());
    }
}

mod save_policy {
    use super::*;

    #[test]
    fn auto_save_off_keeps_changes_in_memory() {
        let dir = TempDir::new().unwrap();
        let store = open_json(&dir, StoreOptions::default().auto_save(false));

        store.write("a", 1, false).unwrap();
        assert_eq!(store.persist_state(), PersistState::Dirty);
        assert_eq!(on_disk(&store), json!({}));

        store.save().unwrap();
        assert_eq!(store.persist_state(), PersistState::Clean);
        assert_eq!(on_disk(&store), json!({"a": 1}));
    }

    #[test]
    fn enabling_auto_save_flushes_pending_changes() {
        let dir = TempDir::new().unwrap();
        let store = open_json(&dir, StoreOptions::default().auto_save(false));
        store.write("a", 1, false).unwrap();

        store.set_auto_save(true).unwrap();

        assert!(store.is_auto_save());
        assert_eq!(on_disk(&store), json!({"a": 1}));
    }

    #[test]
    fn batch_saves_once() {
        let dir = TempDir::new().unwrap();
        let store = open_json(&dir, StoreOptions::default());
        let before = store.stats().unwrap().saves;

        store
            .batch(|store| {
                store.write("a", 1, false)?;
                store.write("b", 2, false)?;
                store.delete("a")
            })
            .unwrap();

        assert_eq!(store.stats().unwrap().saves, before + 1);
        assert_eq!(on_disk(&store), json!({"b": 2}));
    }

    #[test]
    fn batch_saves_even_when_closure_fails() {
        let dir = TempDir::new().unwrap();
        let store = open_json(&dir, StoreOptions::default());

        let result = store.batch(|store| {
            store.write("a", 1, false)?;
            store.delete("missing")
        });

        assert!(matches!(result, Err(ConfigError::NotFound(_))));
        assert_eq!(on_disk(&store), json!({"a": 1}));
    }

    #[test]
    fn debounced_writes_coalesce() {
        let dir = TempDir::new().unwrap();
        let store = open_json(&dir, StoreOptions::default().debounce_milliseconds(50));
        let before = store.stats().unwrap().saves;

        for i in 0..3 {
            store.write("counter", i, false).unwrap();
        }
        assert_eq!(store.stats().unwrap().saves, before);

        thread::sleep(Duration::from_millis(400));

        assert_eq!(store.stats().unwrap().saves, before + 1);
        assert_eq!(on_disk(&store), json!({"counter": 2}));
        assert_eq!(store.debounce(), Duration::from_millis(50));
    }

    #[test]
    fn export_does_not_clean_dirty_state() {
        let dir = TempDir::new().unwrap();
        let store = open_json(&dir, StoreOptions::default().auto_save(false));
        store.write("a", 1, false).unwrap();

        let target = store.export_to(dir.path().join("copy"), Some(Format::Toml)).unwrap();

        assert_eq!(target, dir.path().join("copy.toml"));
        assert_eq!(fs::read_to_string(&target).unwrap(), "a = 1\n");
        assert!(store.is_dirty());
    }
}

mod node_handles {
    use super::*;

    #[test]
    fn handles_read_and_write_through_the_store() {
        let dir = TempDir::new().unwrap();
        let store = open_json(&dir, StoreOptions::default());

        let db = store.root().get_or_create("db").unwrap();
        db.set("host", "localhost", false).unwrap();
        db.get_or_create("pool").unwrap().set("size", 4, false).unwrap();

        assert_eq!(db.path().unwrap(), "db");
        assert_eq!(db.keys().unwrap(), ["host", "pool"]);
        assert_eq!(
            db.resolve_path("pool.size").unwrap().as_value(),
            Some(&json!(4))
        );
        assert_eq!(on_disk(&store), json!({"db": {"host": "localhost", "pool": {"size": 4}}}));
    }

    #[test]
    fn parent_walks_back_to_root() {
        let dir = TempDir::new().unwrap();
        let store = open_json(&dir, StoreOptions::default());
        store.write("a.b.c", 1, false).unwrap();

        let b = store.node("a.b").unwrap();
        let a = b.parent().unwrap().unwrap();
        let root = a.parent().unwrap().unwrap();

        assert_eq!(a, store.node("a").unwrap());
        assert!(root.is_root());
        assert!(root.parent().unwrap().is_none());
    }

    #[test]
    fn reserved_keys_are_checked_on_root_only() {
        let dir = TempDir::new().unwrap();
        let store = open_json(&dir, StoreOptions::default());

        assert!(matches!(
            store.root().set("reload", 1, false),
            Err(ConfigError::ReservedKeyword(_))
        ));
        let nested = store.root().get_or_create("nested").unwrap();
        nested.set("reload", 1, false).unwrap();
        assert!(nested.contains_key("reload").unwrap());
    }

    #[test]
    fn dotted_keys_are_rejected_on_handles() {
        let dir = TempDir::new().unwrap();
        let store = open_json(&dir, StoreOptions::default());

        assert!(matches!(
            store.root().set("a.b", 1, false),
            Err(ConfigError::InvalidPath(_))
        ));
    }

    #[test]
    fn node_on_leaf_is_a_type_mismatch() {
        let dir = TempDir::new().unwrap();
        let store = open_json(&dir, StoreOptions::default());
        store.write("leaf", 1, false).unwrap();

        assert!(matches!(
            store.node("leaf"),
            Err(ConfigError::TypeMismatch { expected_type: "mapping", .. })
        ));
    }

    #[test]
    fn stale_handle_reports_not_found() {
        let dir = TempDir::new().unwrap();
        let store = open_json(&dir, StoreOptions::default());
        store.write("db.port", 1, false).unwrap();

        let db = store.node("db").unwrap();
        store.delete("db").unwrap();

        assert!(matches!(db.keys(), Err(ConfigError::NotFound(_))));
        assert!(matches!(db.set("x", 1, false), Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn handle_outliving_store_reports_dropped() {
        let dir = TempDir::new().unwrap();
        let root = {
            let store = open_json(&dir, StoreOptions::default());
            store.root()
        };

        assert!(matches!(root.keys(), Err(ConfigError::StoreDropped)));
    }

    #[test]
    fn handle_flatten_and_len() {
        let dir = TempDir::new().unwrap();
        let store = open_json(&dir, StoreOptions::default());
        store.write("a.x", 1, false).unwrap();
        store.write("a.y", 2, false).unwrap();

        let a = store.node("a").unwrap();
        assert_eq!(a.len().unwrap(), 2);
        assert!(!a.is_empty().unwrap());
        assert_eq!(a.flatten().unwrap(), snapshot(json!({"x": 1, "y": 2})));

        a.delete("x").unwrap();
        assert_eq!(store.read("a", Value::Null).unwrap(), json!({"y": 2}));
    }
}
