//! Integration tests for the Store lifecycle and snapshot persistence

use std::sync::Arc;
use std::time::Duration;

use localdb_core::{
    command, FileHost, Filter, LocalDbError, MemoryHost, Patch, Store, StoreConfig,
};
use serde_json::json;
use tempfile::TempDir;

#[test]
fn test_snapshot_layout() {
    let host = Arc::new(MemoryHost::new());
    let store = Store::open(host.clone(), StoreConfig::immediate()).unwrap();
    let users = store.create_collection("users").unwrap();
    users.add(&json!({"_id": "u1", "name": "Alice"})).unwrap();

    assert_eq!(
        host.latest(),
        Some(json!({"users": {"u1": {"name": "Alice"}}}))
    );
}

#[test]
fn test_reload_from_host() {
    let host = Arc::new(MemoryHost::new());
    {
        let store = Store::open(host.clone(), StoreConfig::immediate()).unwrap();
        let users = store.create_collection("users").unwrap();
        users.add(&json!({"_id": "u1", "age": 30})).unwrap();
        users.add(&json!({"_id": "u2", "age": 17})).unwrap();
    }

    let store = Store::open(host.clone(), StoreConfig::manual()).unwrap();
    let users = store.collection("users").unwrap().unwrap();
    let adults = users.filter(&Filter::new().field("age", command::gte(18))).get();
    assert_eq!(adults, vec![json!({"age": 30, "_id": "u1"})]);
}

#[test]
fn test_remove_collection_is_persisted() {
    let host = Arc::new(MemoryHost::new());
    let store = Store::open(host.clone(), StoreConfig::immediate()).unwrap();
    store.create_collection("a").unwrap();
    store.create_collection("b").unwrap();
    store.remove_collection("a").unwrap();

    assert_eq!(host.latest(), Some(json!({"b": {}})));
}

#[test]
fn test_detached_collection_is_not_persisted() {
    let host = Arc::new(MemoryHost::new());
    let store = Store::open(host.clone(), StoreConfig::immediate()).unwrap();
    let old = store.create_collection("t").unwrap();
    store.remove_collection("t").unwrap();

    old.add(&json!({"x": 1})).unwrap();
    assert_eq!(old.count(), 1);
    assert_eq!(host.latest(), Some(json!({})));
}

#[test]
fn test_operations_before_init() {
    let store = Store::new(MemoryHost::new(), StoreConfig::manual()).unwrap();
    assert!(matches!(store.collection_names(), Err(LocalDbError::NotInitialized)));
    store.init().unwrap();
    assert!(store.collection_names().unwrap().is_empty());
}

#[test]
fn test_clones_share_state() {
    let store = Store::open(MemoryHost::new(), StoreConfig::manual()).unwrap();
    let other = store.clone();
    store.create_collection("shared").unwrap();

    let view = other.collection("shared").unwrap().unwrap();
    view.add(&json!({"v": 1})).unwrap();
    assert_eq!(store.collection("shared").unwrap().unwrap().count(), 1);
}

#[test]
fn test_manual_flush() {
    let host = Arc::new(MemoryHost::new());
    let store = Store::open(host.clone(), StoreConfig::manual()).unwrap();
    let t = store.create_collection("t").unwrap();
    t.add(&json!({"_id": "k"})).unwrap();
    t.doc("k").update(&Patch::new().field("n", 1)).unwrap();

    assert_eq!(host.persist_count(), 0);
    assert!(store.flush());
    assert_eq!(host.latest(), store.snapshot());
    assert!(!store.flush());
    assert_eq!(host.persist_count(), 1);
}

#[test]
fn test_file_host_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.json");

    {
        let store = Store::open(FileHost::new(&path), StoreConfig::debounced(Duration::from_millis(10))).unwrap();
        let notes = store.create_collection("notes").unwrap();
        notes.add(&json!({"_id": "n1", "text": "hello"})).unwrap();
        notes.add(&json!({"_id": "n2", "text": "world"})).unwrap();
        notes.doc("n1").remove();
    }

    let store = Store::open(FileHost::new(&path), StoreConfig::manual()).unwrap();
    let notes = store.collection("notes").unwrap().unwrap();
    assert_eq!(notes.get(), vec![json!({"text": "world", "_id": "n2"})]);
}

#[test]
fn test_corrupt_file_fails_init() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.json");
    std::fs::write(&path, "[1, 2").unwrap();

    let store = Store::new(FileHost::new(&path), StoreConfig::manual()).unwrap();
    assert!(matches!(store.init(), Err(LocalDbError::Serialization(_))));
    assert!(!store.is_initialized());
}

#[test]
fn test_load_skips_non_object_documents() {
    let host = MemoryHost::with_snapshot(json!({
        "t": {"good": {"a": 1}, "bad": [1, 2], "gone": null}
    }));
    let store = Store::open(host, StoreConfig::manual()).unwrap();
    let t = store.collection("t").unwrap().unwrap();
    assert_eq!(t.get(), vec![json!({"a": 1, "_id": "good"})]);
}
