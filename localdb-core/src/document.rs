// src/document.rs
//! Documents, collection data and id handling.
//!
//! A document never stores its own id: ids live at the map-key level and
//! are injected under [`ID_FIELD`] only when a document is read out.

use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::{Map, Value};

use crate::log_trace;

/// Reserved field carrying the document id in query results and filters.
pub const ID_FIELD: &str = "_id";

/// Length of generated document ids.
pub const GENERATED_ID_LEN: usize = 4;

/// Field name → JSON value, in insertion order.
pub type Document = Map<String, Value>;

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// A stored document and the insert generation it was stored under.
///
/// Generations are unique per process. Updates keep the generation; a
/// document removed and re-added under the same id gets a new one, so views
/// that selected the old document do not pick up the new one.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub generation: u64,
    pub doc: Document,
}

impl Entry {
    pub fn new(doc: Document) -> Self {
        Entry {
            generation: NEXT_GENERATION.fetch_add(1, Ordering::Relaxed),
            doc,
        }
    }
}

/// Document id → entry, in insertion order.
///
/// Iteration order is the tie-break for unordered and equal-key results.
pub type CollectionData = IndexMap<String, Entry>;

/// Draw a fresh id of [`GENERATED_ID_LEN`] symbols from `[A-Za-z0-9]`.
///
/// Redraws until `taken` rejects the candidate. There is no retry bound:
/// with 62^4 possible ids a collection approaching that size will spin.
pub fn generate_id<R: Rng>(rng: &mut R, taken: impl Fn(&str) -> bool) -> String {
    let mut attempts = 0u32;
    loop {
        let candidate: String = (0..GENERATED_ID_LEN)
            .map(|_| rng.sample(Alphanumeric) as char)
            .collect();
        if !taken(&candidate) {
            if attempts > 0 {
                log_trace!("generated id {} after {} collisions", candidate, attempts);
            }
            return candidate;
        }
        attempts += 1;
    }
}

/// Id supplied by the caller under [`ID_FIELD`], if it is usable.
///
/// Non-empty strings are used verbatim and numbers by their decimal form.
/// Empty strings, null, booleans and containers count as "no id".
pub fn explicit_id(fields: &Document) -> Option<String> {
    match fields.get(ID_FIELD)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Deep copy of `doc` with `id` injected under [`ID_FIELD`].
pub fn with_id(id: &str, doc: &Document) -> Value {
    let mut out = doc.clone();
    out.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
    Value::Object(out)
}

/// Parse a persisted collection mapping, dropping entries that are not
/// documents (tombstones from older snapshots, stray scalars).
pub fn collection_from_value(name: &str, value: Value) -> Option<CollectionData> {
    let Value::Object(entries) = value else {
        return None;
    };
    let mut data = CollectionData::with_capacity(entries.len());
    for (id, entry) in entries {
        match entry {
            Value::Object(mut doc) if !id.is_empty() => {
                doc.shift_remove(ID_FIELD);
                data.insert(id, Entry::new(doc));
            }
            Value::Null => {}
            _ => {
                crate::log_warn!("collection '{}': skipping non-document entry '{}'", name, id);
            }
        }
    }
    Some(data)
}

/// Persisted form of a collection.
pub fn collection_to_value(data: &CollectionData) -> Value {
    let mut out = Map::with_capacity(data.len());
    for (id, entry) in data {
        out.insert(id.clone(), Value::Object(entry.doc.clone()));
    }
    Value::Object(out)
}
