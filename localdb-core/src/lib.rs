// localdb-core/src/lib.rs
// Embedded document store: collections of JSON documents, a chainable
// query/mutation builder and debounced write-back to a snapshot host

pub mod collection;
pub mod command;
pub mod document;
pub mod error;
pub mod find_options;
pub mod logging;
pub mod query;
pub mod storage;
pub mod store;
pub mod update;
pub mod value_utils;
pub mod write_back;

// Public exports
pub use collection::{Collection, DocRef};
pub use document::{Document, ID_FIELD};
pub use error::{LocalDbError, Result};
pub use find_options::{FindOptions, Order};
pub use logging::{get_log_level, init_log_level_from_env, set_log_level, LogLevel};
pub use query::{Command, Criterion, Filter, Predicate};
pub use storage::{FileHost, MemoryHost, SnapshotHost};
pub use store::{Store, StoreConfig};
pub use update::{FieldUpdate, Patch, UpdateOperator};
pub use write_back::{WriteBackMode, DEFAULT_WRITE_BACK_DELAY};
