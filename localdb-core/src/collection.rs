// localdb-core/src/collection.rs
// Collection views: chainable query/mutation builder over one collection
//
// A view is (root data, scope, options):
// ├── root     shared handle to the collection's full data; every mutation
// │            lands here, however the view was derived
// ├── scope    (id, generation) pairs selected by filter(), or the whole
// │            root when unfiltered
// └── options  order_by / skip / limit, copied on every derivation
//
// Views are immutable. filter(), limit(), skip() and order_by() return new
// views, so an intermediate view can be reused as a branching point.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::Value;

use crate::document::{
    explicit_id, generate_id, with_id, CollectionData, Document, Entry, ID_FIELD,
};
use crate::error::{LocalDbError, Result};
use crate::find_options::{apply_skip_limit, apply_sort, FindOptions, Order};
use crate::query::Filter;
use crate::update::Patch;
use crate::write_back::WriteBack;
use crate::log_trace;

/// Shared handle to a collection's data.
pub(crate) type CollectionRef = Arc<RwLock<CollectionData>>;

/// Documents selected by a filter: id → generation at selection time.
type Scope = IndexMap<String, u64>;

/// View over a collection.
///
/// Obtained from `Store::create_collection` / `Store::collection`, then
/// narrowed with [`filter`](Collection::filter) and shaped with
/// [`order_by`](Collection::order_by), [`skip`](Collection::skip) and
/// [`limit`](Collection::limit).
#[derive(Clone)]
pub struct Collection {
    name: Arc<str>,
    root: CollectionRef,
    write_back: Arc<WriteBack>,

    /// `None`: every live document of the root, including ones added later
    scope: Option<Arc<Scope>>,
    options: FindOptions,
}

impl Collection {
    pub(crate) fn new(name: &str, root: CollectionRef, write_back: Arc<WriteBack>) -> Self {
        Collection {
            name: Arc::from(name),
            root,
            write_back,
            scope: None,
            options: FindOptions::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Pending query options of this view
    pub fn options(&self) -> &FindOptions {
        &self.options
    }

    pub fn is_filtered(&self) -> bool {
        self.scope.is_some()
    }

    /// Live entries of this view in iteration order.
    ///
    /// A scoped id only counts while it still holds the entry the filter
    /// selected.
    fn live_entries<'a>(
        &'a self,
        data: &'a CollectionData,
    ) -> Box<dyn Iterator<Item = (&'a String, &'a Entry)> + 'a> {
        match &self.scope {
            None => Box::new(data.iter()),
            Some(scope) => Box::new(scope.iter().filter_map(move |(id, generation)| {
                data.get_key_value(id)
                    .filter(|(_, entry)| entry.generation == *generation)
            })),
        }
    }

    fn live<'a>(
        &'a self,
        data: &'a CollectionData,
    ) -> impl Iterator<Item = (&'a String, &'a Document)> + 'a {
        self.live_entries(data).map(|(id, entry)| (id, &entry.doc))
    }

    fn derive(&self, options: FindOptions) -> Collection {
        Collection {
            options,
            ..self.clone()
        }
    }

    // ========================================================================
    // MUTATIONS
    // ========================================================================

    /// Insert a copy of `document`, returning its id.
    ///
    /// A usable [`ID_FIELD`] (non-empty string or number) becomes the id and
    /// must not exist yet; otherwise a fresh 4-symbol id is generated. The
    /// id field itself is never stored.
    pub fn add(&self, document: &Value) -> Result<String> {
        let Value::Object(fields) = document else {
            return Err(LocalDbError::InvalidDocument);
        };
        let mut fields = fields.clone();
        let requested = explicit_id(&fields);
        fields.shift_remove(ID_FIELD);

        let id = {
            let mut data = self.root.write();
            let id = match requested {
                Some(id) => {
                    if data.contains_key(&id) {
                        return Err(LocalDbError::DuplicateId(id));
                    }
                    id
                }
                None => generate_id(&mut rand::thread_rng(), |candidate| {
                    data.contains_key(candidate)
                }),
            };
            data.insert(id.clone(), Entry::new(fields));
            id
        };

        log_trace!("{}: added {}", self.name, id);
        self.write_back.touch();
        Ok(id)
    }

    /// Apply `patch` to every live document of this view.
    ///
    /// Returns the number of documents updated.
    pub fn update(&self, patch: &Patch) -> usize {
        let updated = {
            let mut data = self.root.write();
            match &self.scope {
                None => {
                    for entry in data.values_mut() {
                        patch.apply(&mut entry.doc);
                    }
                    data.len()
                }
                Some(scope) => {
                    let mut updated = 0;
                    for (id, generation) in scope.iter() {
                        match data.get_mut(id) {
                            Some(entry) if entry.generation == *generation => {
                                patch.apply(&mut entry.doc);
                                updated += 1;
                            }
                            _ => {}
                        }
                    }
                    updated
                }
            }
        };

        self.write_back.touch();
        updated
    }

    /// [`update`](Collection::update) with a plain JSON patch.
    pub fn update_json(&self, patch: &Value) -> Result<usize> {
        let patch = Patch::from_value(patch)?;
        Ok(self.update(&patch))
    }

    /// Delete every document of this view from the collection.
    ///
    /// Skip/limit/order options do not narrow what is removed. Returns the
    /// number of documents removed.
    pub fn remove(&self) -> usize {
        let removed = {
            let mut data = self.root.write();
            let before = data.len();
            match &self.scope {
                None => data.clear(),
                Some(scope) => {
                    data.retain(|id, entry| scope.get(id) != Some(&entry.generation));
                }
            }
            before - data.len()
        };

        self.write_back.touch();
        removed
    }

    /// Handle on a single document of this view.
    pub fn doc(&self, id: &str) -> DocRef {
        let pin = match &self.scope {
            None => Pin::Any,
            Some(scope) => scope.get(id).map_or(Pin::Hidden, |g| Pin::Generation(*g)),
        };
        DocRef {
            id: id.to_string(),
            pin,
            root: self.root.clone(),
            write_back: self.write_back.clone(),
        }
    }

    // ========================================================================
    // QUERY BUILDING
    // ========================================================================

    /// New view over the live documents of this view that match `filter`.
    ///
    /// Options are reset to defaults.
    pub fn filter(&self, filter: &Filter) -> Collection {
        let scope: Scope = {
            let data = self.root.read();
            self.live_entries(&data)
                .filter(|(id, entry)| filter.matches(id, &entry.doc))
                .map(|(id, entry)| (id.clone(), entry.generation))
                .collect()
        };

        Collection {
            scope: Some(Arc::new(scope)),
            options: FindOptions::default(),
            ..self.clone()
        }
    }

    /// [`filter`](Collection::filter) with a plain JSON filter.
    pub fn filter_json(&self, filter: &Value) -> Result<Collection> {
        let filter = Filter::from_value(filter)?;
        Ok(self.filter(&filter))
    }

    /// Same view, returning at most `n` documents (`0` = unlimited).
    pub fn limit(&self, n: usize) -> Collection {
        self.derive(self.options.clone().with_limit(n))
    }

    /// Same view, skipping the first `n` documents.
    pub fn skip(&self, n: usize) -> Collection {
        self.derive(self.options.clone().with_skip(n))
    }

    /// Same view with one more sort key appended.
    pub fn order_by(&self, field: impl Into<String>, order: Order) -> Collection {
        self.derive(self.options.clone().with_order(field, order))
    }

    // ========================================================================
    // READS
    // ========================================================================

    /// Number of live documents in this view (ignores skip/limit).
    pub fn count(&self) -> usize {
        let data = self.root.read();
        self.live(&data).count()
    }

    /// Materialize the view: copies of the documents with [`ID_FIELD`]
    /// injected, sorted, then skipped, then limited.
    ///
    /// Without sort keys documents are streamed in iteration order and only
    /// the returned page is copied.
    pub fn get(&self) -> Vec<Value> {
        let data = self.root.read();

        if self.options.is_ordered() {
            let mut docs: Vec<Value> = self.live(&data).map(|(id, doc)| with_id(id, doc)).collect();
            drop(data);
            apply_sort(&mut docs, &self.options.order_by);
            return apply_skip_limit(docs, &self.options);
        }

        let page = self.live(&data).skip(self.options.skip_count());
        let docs: Vec<Value> = match self.options.limit_count() {
            Some(limit) => page.take(limit).map(|(id, doc)| with_id(id, doc)).collect(),
            None => page.map(|(id, doc)| with_id(id, doc)).collect(),
        };
        docs
    }
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .field("scope", &self.scope.as_ref().map(|scope| scope.len()))
            .field("options", &self.options)
            .finish()
    }
}

/// Which stored entry a [`DocRef`] may resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pin {
    /// Whatever lives under the id (unfiltered view)
    Any,
    /// Only the entry a filter selected
    Generation(u64),
    /// Id outside the view
    Hidden,
}

impl Pin {
    fn admits(self, entry: &Entry) -> bool {
        match self {
            Pin::Any => true,
            Pin::Generation(generation) => entry.generation == generation,
            Pin::Hidden => false,
        }
    }
}

/// Handle on one document id.
///
/// Reads go to the live data on every call; nothing is cached. A handle
/// obtained from a filtered view only sees the document that view selected.
#[derive(Clone)]
pub struct DocRef {
    id: String,
    pin: Pin,
    root: CollectionRef,
    write_back: Arc<WriteBack>,
}

impl DocRef {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Copy of the document with [`ID_FIELD`] injected, `None` if absent.
    pub fn get(&self) -> Option<Value> {
        let data = self.root.read();
        let entry = data.get(&self.id).filter(|entry| self.pin.admits(entry))?;
        Some(with_id(&self.id, &entry.doc))
    }

    pub fn exists(&self) -> bool {
        let data = self.root.read();
        data.get(&self.id).is_some_and(|entry| self.pin.admits(entry))
    }

    /// Apply `patch` to the document.
    pub fn update(&self, patch: &Patch) -> Result<()> {
        {
            let mut data = self.root.write();
            let entry = data
                .get_mut(&self.id)
                .filter(|entry| self.pin.admits(entry))
                .ok_or_else(|| LocalDbError::DocumentNotFound(self.id.clone()))?;
            patch.apply(&mut entry.doc);
        }

        self.write_back.touch();
        Ok(())
    }

    /// [`update`](DocRef::update) with a plain JSON patch.
    pub fn update_json(&self, patch: &Value) -> Result<()> {
        let patch = Patch::from_value(patch)?;
        self.update(&patch)
    }

    /// Delete the document. Returns whether it existed.
    pub fn remove(&self) -> bool {
        let removed = {
            let mut data = self.root.write();
            let admitted = data.get(&self.id).is_some_and(|entry| self.pin.admits(entry));
            admitted && data.shift_remove(&self.id).is_some()
        };
        if removed {
            self.write_back.touch();
        }
        removed
    }
}

impl fmt::Debug for DocRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocRef")
            .field("id", &self.id)
            .field("pin", &self.pin)
            .finish()
    }
}
