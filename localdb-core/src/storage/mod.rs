// src/storage/mod.rs
//! Host storage adapters
//!
//! The store never touches durable storage itself: it hands whole snapshots
//! to a [`SnapshotHost`] and reads one back on `init()`.

mod file_storage;
mod memory_storage;
mod traits;

pub use file_storage::FileHost;
pub use memory_storage::MemoryHost;
pub use traits::SnapshotHost;
