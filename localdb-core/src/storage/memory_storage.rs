// storage/memory_storage.rs
//! In-process snapshot host
//!
//! Keeps the latest snapshot in memory plus the history of every persist,
//! which is what tests use to observe write-back coalescing.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde_json::Value;

use crate::error::{LocalDbError, Result};
use crate::storage::SnapshotHost;

/// In-memory host (tests, ephemeral stores)
///
/// # Examples
///
/// ```ignore
/// use std::sync::Arc;
/// use localdb_core::{MemoryHost, Store, StoreConfig};
///
/// let host = Arc::new(MemoryHost::new());
/// let store = Store::open(host.clone(), StoreConfig::immediate())?;
/// ```
#[derive(Debug, Default)]
pub struct MemoryHost {
    /// Snapshot returned by `load_snapshot`
    current: Mutex<Option<Value>>,

    /// Every persisted snapshot, oldest first
    history: Mutex<Vec<Value>>,

    /// When set, persists fail with an I/O error
    failing: AtomicBool,
}

impl MemoryHost {
    /// Create an empty host (loads as absent)
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a host that loads `snapshot`
    pub fn with_snapshot(snapshot: Value) -> Self {
        MemoryHost {
            current: Mutex::new(Some(snapshot)),
            ..Self::default()
        }
    }

    /// Latest snapshot (seeded or persisted)
    pub fn latest(&self) -> Option<Value> {
        self.current.lock().clone()
    }

    /// Number of successful persists
    pub fn persist_count(&self) -> usize {
        self.history.lock().len()
    }

    /// All successfully persisted snapshots, oldest first
    pub fn history(&self) -> Vec<Value> {
        self.history.lock().clone()
    }

    /// Make subsequent persists fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl SnapshotHost for MemoryHost {
    fn load_snapshot(&self) -> Result<Option<Value>> {
        Ok(self.current.lock().clone())
    }

    fn persist_snapshot(&self, snapshot: Value) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(LocalDbError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "memory host set to fail",
            )));
        }
        self.history.lock().push(snapshot.clone());
        *self.current.lock() = Some(snapshot);
        Ok(())
    }
}
