//! Integration tests for Collection views
//!
//! Query building, pagination and mutations through filtered views

use localdb_core::{command, Collection, Filter, LocalDbError, MemoryHost, Order, Patch, Store, StoreConfig};
use serde_json::{json, Value};

fn create_test_collection(name: &str) -> (Store, Collection) {
    let store = Store::open(MemoryHost::new(), StoreConfig::manual()).unwrap();
    let collection = store.create_collection(name).unwrap();
    (store, collection)
}

fn field<'a>(docs: &'a [Value], name: &str) -> Vec<&'a Value> {
    docs.iter().map(|d| &d[name]).collect()
}

// ========== ADD / GET ==========

#[test]
fn test_add_then_get_returns_copy_with_id() {
    let (_store, todos) = create_test_collection("todos");
    let mut doc = json!({"title": "milk", "tags": ["shop"]});
    let id = todos.add(&doc).unwrap();

    doc["title"] = json!("changed");
    doc["tags"].as_array_mut().unwrap().push(json!("x"));

    let stored = todos.doc(&id).get().unwrap();
    assert_eq!(stored, json!({"title": "milk", "tags": ["shop"], "_id": id}));
}

#[test]
fn test_get_result_is_detached() {
    let (_store, todos) = create_test_collection("todos");
    let id = todos.add(&json!({"n": 1})).unwrap();

    let mut docs = todos.get();
    docs[0]["n"] = json!(99);
    assert_eq!(todos.doc(&id).get().unwrap()["n"], json!(1));
}

#[test]
fn test_add_where_gte_scenario() {
    let (_store, t) = create_test_collection("t");
    t.add(&json!({"a": 1})).unwrap();
    let id = t.add(&json!({"a": 2})).unwrap();

    let docs = t.filter(&Filter::new().field("a", command::gte(2))).get();
    assert_eq!(docs, vec![json!({"a": 2, "_id": id})]);
}

#[test]
fn test_where_by_id() {
    let (_store, t) = create_test_collection("t");
    let id = t.add(&json!({"a": 1})).unwrap();
    t.add(&json!({"a": 2})).unwrap();

    let by_id = Filter::new().field("_id", command::eq(id.as_str()));
    assert_eq!(t.filter(&by_id).get().len(), 1);
    assert_eq!(t.filter(&by_id).get()[0]["a"], json!(1));

    t.doc(&id).remove();
    assert!(t.filter(&by_id).get().is_empty());
}

#[test]
fn test_numeric_explicit_id() {
    let (_store, t) = create_test_collection("t");
    assert_eq!(t.add(&json!({"_id": 42, "v": true})).unwrap(), "42");
    assert!(matches!(t.add(&json!({"_id": "42"})), Err(LocalDbError::DuplicateId(_))));
}

// ========== FILTERS ==========

#[test]
fn test_literal_uses_loose_equality() {
    let (_store, t) = create_test_collection("t");
    t.add(&json!({"n": 1})).unwrap();
    t.add(&json!({"n": "1"})).unwrap();
    t.add(&json!({"n": 2})).unwrap();

    assert_eq!(t.filter(&Filter::new().field("n", 1)).count(), 2);
    assert_eq!(t.filter_json(&json!({"n": "1"})).unwrap().count(), 2);
}

#[test]
fn test_filter_json_or() {
    let (_store, t) = create_test_collection("t");
    t.add(&json!({"city": "NYC"})).unwrap();
    t.add(&json!({"city": "LA"})).unwrap();
    t.add(&json!({"city": "SF"})).unwrap();

    let view = t
        .filter_json(&json!({"type": "or", "arr": [{"city": "NYC"}, {"city": "LA"}]}))
        .unwrap();
    assert_eq!(view.count(), 2);
    assert!(matches!(t.filter_json(&json!(5)), Err(LocalDbError::InvalidQuery(_))));
}

#[test]
fn test_pattern_and_exists() {
    let (_store, t) = create_test_collection("users");
    t.add(&json!({"name": "Alice", "email": "a@x"})).unwrap();
    t.add(&json!({"name": "Albert"})).unwrap();
    t.add(&json!({"name": "Bob", "email": null})).unwrap();

    let al = t.filter(&Filter::new().field("name", command::regex("^Al").unwrap()));
    assert_eq!(al.count(), 2);

    let with_email = al.filter(&Filter::new().field("email", command::exists(true)));
    assert_eq!(field(&with_email.get(), "name"), vec![&json!("Alice")]);

    let without = t.filter(&Filter::new().field("email", command::exists(false)));
    assert_eq!(without.count(), 2);
}

#[test]
fn test_in_nin() {
    let (_store, t) = create_test_collection("t");
    for s in ["open", "closed", "draft"] {
        t.add(&json!({ "status": s })).unwrap();
    }
    assert_eq!(t.filter(&Filter::new().field("status", command::in_(["open", "draft"]))).count(), 2);
    assert_eq!(t.filter(&Filter::new().field("status", command::nin(["open"]))).count(), 2);
}

#[test]
fn test_command_composition_in_filter() {
    let (_store, t) = create_test_collection("t");
    for i in 0..6 {
        t.add(&json!({ "i": i })).unwrap();
    }
    let range = command::gt(1).and(&command::lte(4));
    let edges = command::eq(0).or(&command::eq(5));

    assert_eq!(t.filter(&Filter::new().field("i", range.clone())).count(), 3);
    assert_eq!(t.filter(&Filter::new().field("i", edges)).count(), 2);
    // Reusable after composition
    assert_eq!(t.filter(&Filter::new().field("i", range)).count(), 3);
}

// ========== ORDERING / PAGINATION ==========

#[test]
fn test_order_desc_limit_two() {
    let (_store, t) = create_test_collection("scores");
    t.add(&json!({"who": "a", "score": 10})).unwrap();
    t.add(&json!({"who": "b", "score": 30})).unwrap();
    t.add(&json!({"who": "c", "score": 20})).unwrap();
    t.add(&json!({"who": "d", "score": 30})).unwrap();

    let top = t.order_by("score", Order::Desc).limit(2).get();
    assert_eq!(field(&top, "who"), vec![&json!("b"), &json!("d")]);
}

#[test]
fn test_multi_key_order() {
    let (_store, t) = create_test_collection("t");
    t.add(&json!({"g": 2, "n": "b"})).unwrap();
    t.add(&json!({"g": 1, "n": "z"})).unwrap();
    t.add(&json!({"g": 2, "n": "a"})).unwrap();

    let docs = t.order_by("g", Order::Asc).order_by("n", Order::Asc).get();
    assert_eq!(field(&docs, "n"), vec![&json!("z"), &json!("a"), &json!("b")]);
}

#[test]
fn test_missing_sort_field_sorts_first() {
    let (_store, t) = create_test_collection("t");
    t.add(&json!({"n": "x", "k": 3})).unwrap();
    t.add(&json!({"n": "y"})).unwrap();
    t.add(&json!({"n": "z", "k": 1})).unwrap();

    let docs = t.order_by("k", Order::Asc).get();
    assert_eq!(field(&docs, "n"), vec![&json!("y"), &json!("z"), &json!("x")]);
}

#[test]
fn test_branching_views_do_not_interfere() {
    let (_store, t) = create_test_collection("t");
    for i in 0..10 {
        t.add(&json!({ "i": i })).unwrap();
    }
    let base = t.filter(&Filter::new().field("i", command::gte(2)));
    let first_three = base.limit(3);
    let last_two = base.order_by("i", Order::Desc).limit(2);

    assert_eq!(field(&first_three.get(), "i"), vec![&json!(2), &json!(3), &json!(4)]);
    assert_eq!(field(&last_two.get(), "i"), vec![&json!(9), &json!(8)]);
    assert_eq!(base.get().len(), 8);
    assert!(base.options().limit.is_none());
}

#[test]
fn test_limit_zero_is_unlimited() {
    let (_store, t) = create_test_collection("t");
    for i in 0..4 {
        t.add(&json!({ "i": i })).unwrap();
    }
    assert_eq!(t.limit(0).get().len(), 4);
    assert_eq!(t.order_by("i", Order::Asc).limit(0).skip(1).get().len(), 3);
}

// ========== MUTATIONS ==========

#[test]
fn test_update_inc_only_matched() {
    let (_store, t) = create_test_collection("t");
    let a = t.add(&json!({"team": "red", "pts": 1})).unwrap();
    let b = t.add(&json!({"team": "blue", "pts": 1})).unwrap();

    let red = t.filter(&Filter::new().field("team", "red"));
    assert_eq!(red.update(&Patch::new().field("pts", command::inc(5))), 1);

    assert_eq!(t.doc(&a).get().unwrap()["pts"], json!(6));
    assert_eq!(t.doc(&b).get().unwrap()["pts"], json!(1));
}

#[test]
fn test_update_remove_field_and_arrays() {
    let (_store, t) = create_test_collection("t");
    let id = t.add(&json!({"tmp": 1, "list": [1, 2, 3]})).unwrap();

    t.doc(&id)
        .update(
            &Patch::new()
                .field("tmp", command::remove())
                .field("list", command::shift())
                .field("fresh", command::push("x")),
        )
        .unwrap();

    assert_eq!(
        t.doc(&id).get().unwrap(),
        json!({"list": [2, 3], "fresh": ["x"], "_id": id})
    );
}

#[test]
fn test_remove_filtered_reaches_root() {
    let (_store, t) = create_test_collection("t");
    t.add(&json!({"done": true})).unwrap();
    t.add(&json!({"done": false})).unwrap();
    t.add(&json!({"done": true})).unwrap();

    assert_eq!(t.filter(&Filter::new().field("done", true)).remove(), 2);
    let rest = t.get();
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0]["done"], json!(false));
}

#[test]
fn test_count_after_single_remove() {
    let (_store, t) = create_test_collection("t");
    let mut ids = Vec::new();
    for i in 0..7 {
        ids.push(t.add(&json!({ "i": i })).unwrap());
    }
    assert!(t.doc(&ids[3]).remove());
    assert_eq!(t.count(), 6);
}

#[test]
fn test_removed_ids_can_be_reused() {
    let (_store, t) = create_test_collection("t");
    t.add(&json!({"_id": "k", "v": 1})).unwrap();
    t.doc("k").remove();
    t.add(&json!({"_id": "k", "v": 2})).unwrap();
    assert_eq!(t.doc("k").get().unwrap()["v"], json!(2));
}

#[test]
fn test_view_does_not_adopt_replacement_document() {
    let (_store, t) = create_test_collection("t");
    t.add(&json!({"_id": "a", "g": 1})).unwrap();
    let ones = t.filter(&Filter::new().field("g", 1));

    t.doc("a").remove();
    t.add(&json!({"_id": "a", "g": 2})).unwrap();

    assert!(ones.get().is_empty());
    assert_eq!(ones.count(), 0);
    assert_eq!(ones.remove(), 0);
    assert_eq!(t.count(), 1);
}
