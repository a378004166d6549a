//! Unit tests for the tree arena.
//! No filesystem or store involved.

#![allow(clippy::panic)]

use serde_json::{Value, json};

use crate::{
    ConfigError, Snapshot,
    tree::{Entry, Tree},
};

fn snapshot(value: Value) -> Snapshot {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

fn tree(value: Value) -> Tree {
    Tree::from_snapshot(snapshot(value))
}

fn as_json(tree: &Tree) -> Value {
    Value::Object(tree.flatten(tree.root()).unwrap())
}

mod node_access {
    use super::*;

    #[test]
    fn get_returns_leaf_or_node_without_creating() {
        let tree = tree(json!({"name": "demo", "db": {"port": 1}}));
        let root = tree.root();

        assert_eq!(
            tree.get(root, "name").unwrap(),
            Some(Entry::Leaf(json!("demo")))
        );
        assert!(matches!(tree.get(root, "db").unwrap(), Some(Entry::Node(_))));
        assert_eq!(tree.get(root, "missing").unwrap(), None);
        assert_eq!(tree.keys(root).unwrap(), vec!["name", "db"]);
        assert!(!tree.is_dirty());
    }

    #[test]
    fn get_or_create_autovivifies_once() {
        let mut tree = Tree::new();
        let root = tree.root();

        let first = tree.get_or_create(root, "server").unwrap();
        let second = tree.get_or_create(root, "server").unwrap();

        assert_eq!(first, second);
        assert!(tree.is_dirty());
        assert_eq!(as_json(&tree), json!({"server": {}}));
        assert_eq!(tree.path_of(first).unwrap(), "server");
    }

    #[test]
    fn get_or_create_refuses_leaf() {
        let mut tree = tree(json!({"port": 80}));
        let root = tree.root();

        let err = tree.get_or_create(root, "port").unwrap_err();
        assert!(matches!(err, ConfigError::PathConflict { ref path, .. } if path == "port"));
    }

    #[test]
    fn set_checks_class_unless_overwriting() {
        let mut tree = tree(json!({"db": {"port": 1}, "name": "x"}));
        let root = tree.root();

        assert!(matches!(
            tree.set(root, "db", json!(5), false),
            Err(ConfigError::PathConflict { .. })
        ));
        assert!(matches!(
            tree.set(root, "name", json!({"first": "a"}), false),
            Err(ConfigError::PathConflict { .. })
        ));
        assert!(!tree.is_dirty());

        assert!(tree.set(root, "db", json!(5), true).unwrap());
        assert_eq!(as_json(&tree), json!({"db": 5, "name": "x"}));
    }

    #[test]
    fn equal_values_do_not_mark_dirty() {
        let mut tree = tree(json!({"a": 1, "m": {"k": [1, 2]}}));
        let root = tree.root();

        assert!(!tree.set(root, "a", json!(1), false).unwrap());
        assert!(!tree.set(root, "m", json!({"k": [1, 2]}), false).unwrap());
        assert!(!tree.is_dirty());

        assert!(tree.set(root, "a", json!(2), false).unwrap());
        assert!(tree.is_dirty());
    }

    #[test]
    fn dotted_keys_are_rejected_at_node_level() {
        let mut tree = Tree::new();
        let root = tree.root();

        assert!(matches!(
            tree.set(root, "a.b", json!(1), false),
            Err(ConfigError::InvalidPath(_))
        ));
        assert!(matches!(
            tree.get_or_create(root, ""),
            Err(ConfigError::InvalidPath(_))
        ));
    }

    #[test]
    fn delete_removes_key_or_reports_missing() {
        let mut tree = tree(json!({"a": 1, "b": 2}));
        let root = tree.root();

        tree.delete(root, "a").unwrap();
        assert_eq!(as_json(&tree), json!({"b": 2}));
        assert!(matches!(
            tree.delete(root, "a"),
            Err(ConfigError::NotFound(path)) if path == "a"
        ));
    }

    #[test]
    fn mutation_bumps_revisions_up_the_parent_chain() {
        let mut tree = tree(json!({"a": {"b": {"c": 1}}, "other": {}}));
        let root = tree.root();
        let a = tree.get_or_create(root, "a").unwrap();
        let b = tree.get_or_create(a, "b").unwrap();
        let other = tree.get_or_create(root, "other").unwrap();

        let before = (
            tree.revision(root).unwrap(),
            tree.revision(a).unwrap(),
            tree.revision(other).unwrap(),
        );
        tree.set(b, "c", json!(2), false).unwrap();

        assert!(tree.revision(root).unwrap() > before.0);
        assert!(tree.revision(a).unwrap() > before.1);
        assert_eq!(tree.revision(other).unwrap(), before.2);
        assert_eq!(tree.parent(b).unwrap(), Some(a));
        assert_eq!(tree.path_of(b).unwrap(), "a.b");
    }

    #[test]
    fn stale_ids_do_not_alias_reused_slots() {
        let mut tree = tree(json!({"old": {"x": 1}}));
        let root = tree.root();
        let old = tree.get_or_create(root, "old").unwrap();

        tree.delete(root, "old").unwrap();
        let fresh = tree.get_or_create(root, "fresh").unwrap();

        assert_ne!(old, fresh);
        assert!(!tree.is_live(old));
        assert!(matches!(tree.keys(old), Err(ConfigError::NotFound(_))));
        assert!(tree.keys(fresh).unwrap().is_empty());
    }

    #[test]
    fn reset_keeps_root_and_frees_children() {
        let mut tree = tree(json!({"a": {"b": {"c": 1}}}));
        let root = tree.root();
        let a = tree.get_or_create(root, "a").unwrap();

        tree.reset(snapshot(json!({"z": true})));

        assert_eq!(tree.root(), root);
        assert!(!tree.is_live(a));
        assert_eq!(tree.node_count(), 1);
        assert_eq!(as_json(&tree), json!({"z": true}));
    }
}

mod paths {
    use super::*;

    #[test]
    fn lookup_never_creates() {
        let tree = tree(json!({"a": {"b": 1}, "leaf": 2}));

        assert_eq!(tree.lookup("a.b").unwrap(), Some(Entry::Leaf(json!(1))));
        assert_eq!(tree.lookup("a.missing").unwrap(), None);
        assert_eq!(tree.lookup("leaf.below").unwrap(), None);
        assert!(matches!(tree.resolve("x.y"), Err(ConfigError::NotFound(p)) if p == "x.y"));
        assert_eq!(tree.node_count(), 2);
    }

    #[test]
    fn malformed_paths_are_rejected() {
        let mut tree = Tree::new();

        for path in ["", ".a", "a..b", "a."] {
            assert!(
                matches!(tree.lookup(path), Err(ConfigError::InvalidPath(_))),
                "{path:?}"
            );
            assert!(matches!(
                tree.write_path(path, json!(1), false),
                Err(ConfigError::InvalidPath(_))
            ));
        }
    }

    #[test]
    fn write_path_creates_intermediates() {
        let mut tree = Tree::new();

        assert!(tree.write_path("db.primary.host", json!("localhost"), false).unwrap());
        assert_eq!(as_json(&tree), json!({"db": {"primary": {"host": "localhost"}}}));
    }

    #[test]
    fn write_through_leaf_conflicts_then_overwrites() {
        let mut tree = Tree::new();
        tree.write_path("a.b", json!(1), false).unwrap();

        let err = tree.write_path("a.b.c", json!(2), false).unwrap_err();
        assert!(matches!(err, ConfigError::PathConflict { ref path, .. } if path == "a.b"));
        assert_eq!(as_json(&tree), json!({"a": {"b": 1}}));

        tree.write_path("a.b.c", json!(2), true).unwrap();
        assert_eq!(as_json(&tree), json!({"a": {"b": {"c": 2}}}));
    }

    #[test]
    fn failed_write_creates_nothing() {
        let mut tree = tree(json!({"x": {"y": {"z": {}}}}));
        tree.clear_dirty();
        let nodes = tree.node_count();

        assert!(tree.write_path("x.y.z", json!(1), false).is_err());
        assert_eq!(tree.node_count(), nodes);
        assert!(!tree.is_dirty());
    }

    #[test]
    fn delete_path_prunes_only_empty_ancestors() {
        let mut tree = tree(json!({
            "a": {"b": {"c": {"d": 1}}, "sibling": true},
            "keep": 1
        }));

        tree.delete_path("a.b.c.d").unwrap();

        assert_eq!(as_json(&tree), json!({"a": {"sibling": true}, "keep": 1}));
        assert!(tree.is_dirty());
    }

    #[test]
    fn delete_path_prunes_up_to_root() {
        let mut tree = tree(json!({"a": {"b": {"c": 1}}}));

        tree.delete_path("a.b.c").unwrap();

        assert_eq!(as_json(&tree), json!({}));
        assert_eq!(tree.node_count(), 1);
    }

    #[test]
    fn delete_path_missing_is_not_found() {
        let mut tree = tree(json!({"a": {"b": 1}}));

        assert!(matches!(tree.delete_path("a.c"), Err(ConfigError::NotFound(_))));
        assert!(matches!(tree.delete_path("a.b.c"), Err(ConfigError::NotFound(_))));
        assert_eq!(as_json(&tree), json!({"a": {"b": 1}}));
    }
}

mod merge {
    use super::*;

    #[test]
    fn merges_nested_mappings() {
        let mut tree = tree(json!({"db": {"host": "localhost", "port": 5432}}));
        let root = tree.root();

        let changed = tree
            .merge(root, snapshot(json!({"db": {"port": 3306}, "debug": true})))
            .unwrap();

        assert!(changed);
        assert_eq!(
            as_json(&tree),
            json!({"db": {"host": "localhost", "port": 3306}, "debug": true})
        );
    }

    #[test]
    fn malformed_key_rejects_whole_merge() {
        let mut tree = tree(json!({"kept": 1}));
        let root = tree.root();
        let before = tree.revision(root).unwrap();

        let result = tree.merge(root, snapshot(json!({"ok": 1, "x..y": 2})));

        assert!(matches!(result, Err(ConfigError::InvalidPath(_))));
        assert_eq!(as_json(&tree), json!({"kept": 1}));
        assert_eq!(tree.revision(root).unwrap(), before);
    }

    #[test]
    fn nested_dotted_keys_are_rejected_whether_or_not_parent_exists() {
        let mut empty = Tree::new();
        let root = empty.root();
        assert!(matches!(
            empty.merge(root, snapshot(json!({"a": {"b.c": 1}}))),
            Err(ConfigError::InvalidPath(_))
        ));
        assert_eq!(as_json(&empty), json!({}));

        let mut existing = tree(json!({"a": {"z": 0}}));
        let root = existing.root();
        assert!(matches!(
            existing.merge(root, snapshot(json!({"a": {"b.c": 1}}))),
            Err(ConfigError::InvalidPath(_))
        ));
        assert_eq!(as_json(&existing), json!({"a": {"z": 0}}));
    }

    #[test]
    fn dotted_keys_become_paths() {
        let mut tree = Tree::new();
        let root = tree.root();

        tree.merge(root, snapshot(json!({"server.tls.enabled": true})))
            .unwrap();

        assert_eq!(as_json(&tree), json!({"server": {"tls": {"enabled": true}}}));
    }

    #[test]
    fn non_mappings_replace_without_class_check() {
        let mut tree = tree(json!({"a": {"b": 1}, "c": 2}));
        let root = tree.root();

        tree.merge(root, snapshot(json!({"a": "flat", "c": {"d": 3}})))
            .unwrap();

        assert_eq!(as_json(&tree), json!({"a": "flat", "c": {"d": 3}}));
    }

    #[test]
    fn unchanged_merge_stays_clean() {
        let mut tree = tree(json!({"a": {"b": 1}}));
        let root = tree.root();

        assert!(!tree.merge(root, snapshot(json!({"a": {"b": 1}, "a.b": 1}))).unwrap());
        assert!(!tree.is_dirty());
    }
}
