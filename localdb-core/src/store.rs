// localdb-core/src/store.rs
// Store: registry of named collections backed by a snapshot host

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::collection::{Collection, CollectionRef};
use crate::document::{collection_from_value, collection_to_value, CollectionData};
use crate::error::{LocalDbError, Result};
use crate::storage::SnapshotHost;
use crate::write_back::{WriteBack, WriteBackMode};
use crate::{log_info, log_warn};

/// Store configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    pub write_back: WriteBackMode,
}

impl StoreConfig {
    pub fn debounced(delay: Duration) -> Self {
        StoreConfig {
            write_back: WriteBackMode::debounced(delay),
        }
    }

    pub fn immediate() -> Self {
        StoreConfig {
            write_back: WriteBackMode::Immediate,
        }
    }

    pub fn manual() -> Self {
        StoreConfig {
            write_back: WriteBackMode::Manual,
        }
    }
}

/// Collection registry. `None` until `init()` has run.
#[derive(Default)]
struct StoreState {
    collections: RwLock<Option<IndexMap<String, CollectionRef>>>,
}

impl StoreState {
    fn snapshot(&self) -> Option<Value> {
        let guard = self.collections.read();
        let collections = guard.as_ref()?;
        let mut out = Map::with_capacity(collections.len());
        for (name, data) in collections {
            out.insert(name.clone(), collection_to_value(&data.read()));
        }
        Some(Value::Object(out))
    }
}

/// Embedded document store
///
/// A cheap-to-clone handle; clones share the same collections and
/// write-back scheduler. Nothing is usable until [`Store::init`] has loaded
/// the host snapshot.
///
/// # Examples
///
/// ```rust
/// use localdb_core::{Filter, MemoryHost, Store, StoreConfig};
/// use serde_json::json;
///
/// let store = Store::open(MemoryHost::new(), StoreConfig::manual()).unwrap();
/// let todos = store.create_collection("todos").unwrap();
/// todos.add(&json!({"title": "write docs", "done": false})).unwrap();
///
/// let open = todos.filter(&Filter::new().field("done", false));
/// assert_eq!(open.count(), 1);
/// ```
#[derive(Clone)]
pub struct Store {
    state: Arc<StoreState>,
    host: Arc<dyn SnapshotHost>,
    write_back: Arc<WriteBack>,
    config: StoreConfig,
}

impl Store {
    /// Create an uninitialized store.
    ///
    /// Fails only if the write-back worker thread cannot be spawned.
    pub fn new<H: SnapshotHost + 'static>(host: H, config: StoreConfig) -> Result<Self> {
        let host: Arc<dyn SnapshotHost> = Arc::new(host);
        let state = Arc::new(StoreState::default());

        let source_state = state.clone();
        let write_back = WriteBack::new(
            config.write_back,
            host.clone(),
            Arc::new(move || source_state.snapshot()),
        )?;

        Ok(Store {
            state,
            host,
            write_back: Arc::new(write_back),
            config,
        })
    }

    /// Create and initialize a store.
    pub fn open<H: SnapshotHost + 'static>(host: H, config: StoreConfig) -> Result<Self> {
        let store = Self::new(host, config)?;
        store.init()?;
        Ok(store)
    }

    /// Load the host snapshot. No-op once initialized.
    ///
    /// An absent (or `null`) snapshot starts an empty store. Collections
    /// that are not mappings are skipped with a warning.
    pub fn init(&self) -> Result<()> {
        let mut guard = self.state.collections.write();
        if guard.is_some() {
            return Ok(());
        }

        let collections = match self.host.load_snapshot()? {
            None | Some(Value::Null) => IndexMap::new(),
            Some(Value::Object(entries)) => {
                let mut collections = IndexMap::with_capacity(entries.len());
                for (name, raw) in entries {
                    if raw.is_null() {
                        continue;
                    }
                    match collection_from_value(&name, raw) {
                        Some(data) => {
                            collections.insert(name, Arc::new(RwLock::new(data)));
                        }
                        None => log_warn!("snapshot: collection '{}' is not a mapping, skipped", name),
                    }
                }
                collections
            }
            Some(other) => {
                return Err(LocalDbError::InvalidSnapshot(format!(
                    "expected an object of collections, got {}",
                    type_name(&other)
                )))
            }
        };

        log_info!("store initialized with {} collection(s)", collections.len());
        *guard = Some(collections);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.state.collections.read().is_some()
    }

    /// Create an empty collection and return a view over it.
    pub fn create_collection(&self, name: &str) -> Result<Collection> {
        let root = {
            let mut guard = self.state.collections.write();
            let Some(collections) = guard.as_mut() else {
                log_warn!("create_collection('{}') called before init()", name);
                return Err(LocalDbError::NotInitialized);
            };
            if collections.contains_key(name) {
                return Err(LocalDbError::CollectionExists(name.to_string()));
            }
            let root: CollectionRef = Arc::new(RwLock::new(CollectionData::new()));
            collections.insert(name.to_string(), root.clone());
            root
        };

        log_info!("collection '{}' created", name);
        self.write_back.touch();
        Ok(Collection::new(name, root, self.write_back.clone()))
    }

    /// Drop a collection and all its documents.
    ///
    /// Returns whether the collection existed. Views obtained earlier keep
    /// working on the detached data, which is no longer persisted.
    pub fn remove_collection(&self, name: &str) -> Result<bool> {
        let existed = {
            let mut guard = self.state.collections.write();
            let Some(collections) = guard.as_mut() else {
                log_warn!("remove_collection('{}') called before init()", name);
                return Err(LocalDbError::NotInitialized);
            };
            collections.shift_remove(name).is_some()
        };

        if existed {
            log_info!("collection '{}' removed", name);
        }
        self.write_back.touch();
        Ok(existed)
    }

    /// View over an existing collection, `None` if there is no such name.
    pub fn collection(&self, name: &str) -> Result<Option<Collection>> {
        let guard = self.state.collections.read();
        let Some(collections) = guard.as_ref() else {
            log_warn!("collection('{}') called before init()", name);
            return Err(LocalDbError::NotInitialized);
        };
        Ok(collections
            .get(name)
            .map(|root| Collection::new(name, root.clone(), self.write_back.clone())))
    }

    /// Collection names in creation order
    pub fn collection_names(&self) -> Result<Vec<String>> {
        let guard = self.state.collections.read();
        let collections = guard.as_ref().ok_or(LocalDbError::NotInitialized)?;
        Ok(collections.keys().cloned().collect())
    }

    /// Current persisted form, `None` while uninitialized.
    pub fn snapshot(&self) -> Option<Value> {
        self.state.snapshot()
    }

    /// Persist now if there are unpersisted mutations.
    ///
    /// Returns whether a persist was attempted.
    pub fn flush(&self) -> bool {
        self.write_back.flush()
    }

    pub fn is_dirty(&self) -> bool {
        self.write_back.is_dirty()
    }

    /// Number of snapshots the host accepted so far
    pub fn flush_count(&self) -> u64 {
        self.write_back.flush_count()
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("initialized", &self.is_initialized())
            .field("write_back", &self.write_back.mode())
            .field("dirty", &self.is_dirty())
            .finish()
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
