// src/storage/traits.rs
//! Host storage abstraction
//!
//! ```text
//! SnapshotHost trait
//!   ├── MemoryHost (tests, ephemeral stores)
//!   └── FileHost (single JSON file)
//! ```

use serde_json::Value;

use crate::error::Result;

/// Key-value facility the store persists into.
///
/// A snapshot is one JSON object: collection name → (document id →
/// document). Implementations are called from the write-back worker
/// thread, hence `Send + Sync`.
pub trait SnapshotHost: Send + Sync {
    /// Read the previously persisted snapshot, `None` if there is none.
    fn load_snapshot(&self) -> Result<Option<Value>>;

    /// Replace the persisted snapshot.
    ///
    /// Errors are logged by the caller and otherwise dropped: there is no
    /// acknowledgement channel back to store users.
    fn persist_snapshot(&self, snapshot: Value) -> Result<()>;
}

impl<H: SnapshotHost + ?Sized> SnapshotHost for std::sync::Arc<H> {
    fn load_snapshot(&self) -> Result<Option<Value>> {
        (**self).load_snapshot()
    }

    fn persist_snapshot(&self, snapshot: Value) -> Result<()> {
        (**self).persist_snapshot(snapshot)
    }
}
