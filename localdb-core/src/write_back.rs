//! Write-back of store snapshots
//!
//! Every mutation marks the store dirty and notifies the scheduler. How the
//! dirty state reaches the host depends on the [`WriteBackMode`]:
//!
//! - **Debounced** (default): the first mutation after a flush arms a timer;
//!   mutations arriving before it fires ride along. When it fires while the
//!   store is still dirty, the flag is cleared and one snapshot of the live
//!   data is persisted. A burst shorter than the delay therefore produces
//!   exactly one persist, taken after the burst.
//! - **Immediate**: persist synchronously inside every mutating call.
//! - **Manual**: only `Store::flush()` persists.
//!
//! Persisting is fire-and-forget: host errors are logged, never returned.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::storage::SnapshotHost;
use crate::{log_debug, log_error, log_trace};

/// Delay between the first mutation of a burst and its persist.
pub const DEFAULT_WRITE_BACK_DELAY: Duration = Duration::from_millis(200);

/// When mutations reach the host
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use localdb_core::WriteBackMode;
///
/// let mode = WriteBackMode::default();
/// assert_eq!(mode.delay(), Some(Duration::from_millis(200)));
/// assert_eq!(WriteBackMode::Immediate.delay(), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteBackMode {
    /// Coalesce bursts, persist `delay` after the first mutation
    Debounced { delay: Duration },

    /// Persist inside every mutating call
    Immediate,

    /// Persist only on explicit flush
    Manual,
}

impl Default for WriteBackMode {
    fn default() -> Self {
        WriteBackMode::Debounced {
            delay: DEFAULT_WRITE_BACK_DELAY,
        }
    }
}

impl WriteBackMode {
    pub fn debounced(delay: Duration) -> Self {
        WriteBackMode::Debounced { delay }
    }

    /// Debounce delay, if this mode has one
    pub fn delay(&self) -> Option<Duration> {
        match self {
            WriteBackMode::Debounced { delay } => Some(*delay),
            _ => None,
        }
    }

    pub fn is_debounced(&self) -> bool {
        matches!(self, WriteBackMode::Debounced { .. })
    }
}

/// Produces the current persisted form, `None` while uninitialized.
pub(crate) type SnapshotSource = Arc<dyn Fn() -> Option<Value> + Send + Sync>;

struct Shared {
    dirty: AtomicBool,
    flushes: AtomicU64,

    /// Held from clearing the flag until the host returns, so persists
    /// reach the host in snapshot order
    flush_lock: Mutex<()>,
    source: SnapshotSource,
    host: Arc<dyn SnapshotHost>,
}

impl Shared {
    /// Clear the dirty flag and persist, if it was set.
    ///
    /// The flag is cleared before the snapshot is taken: a mutation racing
    /// with the flush re-marks the store and gets its own flush. Concurrent
    /// callers (worker and `Store::flush`) queue on `flush_lock`, so an older
    /// snapshot never lands after a newer one.
    fn flush_if_dirty(&self) -> bool {
        let _guard = self.flush_lock.lock();
        if !self.dirty.swap(false, Ordering::SeqCst) {
            return false;
        }
        let Some(snapshot) = (self.source)() else {
            return false;
        };
        match self.host.persist_snapshot(snapshot) {
            Ok(()) => {
                let n = self.flushes.fetch_add(1, Ordering::SeqCst) + 1;
                log_debug!("snapshot persisted (flush #{})", n);
            }
            Err(e) => log_error!("snapshot persist failed: {}", e),
        }
        true
    }
}

/// Dirty flag plus the scheduler that turns it into persists.
pub(crate) struct WriteBack {
    shared: Arc<Shared>,
    mode: WriteBackMode,

    /// Arm signals carrying the mutation time (debounced mode only)
    tx: Option<Sender<Instant>>,
    worker: Option<JoinHandle<()>>,
}

impl WriteBack {
    pub(crate) fn new(
        mode: WriteBackMode,
        host: Arc<dyn SnapshotHost>,
        source: SnapshotSource,
    ) -> Result<Self> {
        let shared = Arc::new(Shared {
            dirty: AtomicBool::new(false),
            flushes: AtomicU64::new(0),
            flush_lock: Mutex::new(()),
            source,
            host,
        });

        let (tx, worker) = match mode {
            WriteBackMode::Debounced { delay } => {
                let (tx, rx) = channel::unbounded();
                let worker_shared = shared.clone();
                let handle = std::thread::Builder::new()
                    .name("localdb-write-back".to_string())
                    .spawn(move || run_debounced(worker_shared, rx, delay))?;
                (Some(tx), Some(handle))
            }
            WriteBackMode::Immediate | WriteBackMode::Manual => (None, None),
        };

        Ok(WriteBack {
            shared,
            mode,
            tx,
            worker,
        })
    }

    /// Record a mutation.
    pub(crate) fn touch(&self) {
        self.shared.dirty.store(true, Ordering::SeqCst);
        match self.mode {
            WriteBackMode::Debounced { .. } => {
                if let Some(tx) = &self.tx {
                    // Only fails once the worker is gone, i.e. during drop
                    let _ = tx.send(Instant::now());
                }
            }
            WriteBackMode::Immediate => {
                self.shared.flush_if_dirty();
            }
            WriteBackMode::Manual => {}
        }
    }

    pub(crate) fn flush(&self) -> bool {
        self.shared.flush_if_dirty()
    }

    pub(crate) fn is_dirty(&self) -> bool {
        self.shared.dirty.load(Ordering::SeqCst)
    }

    /// Successful persists so far
    pub(crate) fn flush_count(&self) -> u64 {
        self.shared.flushes.load(Ordering::SeqCst)
    }

    pub(crate) fn mode(&self) -> WriteBackMode {
        self.mode
    }
}

impl Drop for WriteBack {
    fn drop(&mut self) {
        // Closing the channel makes the worker flush what is pending and exit
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log_error!("write-back worker panicked");
            }
        }
    }
}

/// Debounce loop.
///
/// Holds at most one deadline: the first arm after a flush sets it to
/// `armed_at + delay`, later arms leave it alone.
fn run_debounced(shared: Arc<Shared>, rx: Receiver<Instant>, delay: Duration) {
    let mut deadline: Option<Instant> = None;
    loop {
        let signal = match deadline {
            Some(at) => rx.recv_deadline(at),
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match signal {
            Ok(armed_at) => {
                if deadline.is_none() {
                    deadline = Some(armed_at + delay);
                    log_trace!("write-back armed, firing in {:?}", delay);
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                deadline = None;
                shared.flush_if_dirty();
            }
            Err(RecvTimeoutError::Disconnected) => {
                shared.flush_if_dirty();
                break;
            }
        }
    }
}
