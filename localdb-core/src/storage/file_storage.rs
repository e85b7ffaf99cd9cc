// storage/file_storage.rs
//! Single-file JSON snapshot host
//!
//! The snapshot is rewritten whole on every persist: serialize into a
//! sibling temp file, fsync, then rename over the target.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde_json::Value;

use crate::error::Result;
use crate::log_debug;
use crate::storage::SnapshotHost;

/// File-backed host
#[derive(Debug)]
pub struct FileHost {
    path: PathBuf,

    /// Serializes writers sharing the temp path
    write_lock: Mutex<()>,
}

impl FileHost {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        FileHost {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SnapshotHost for FileHost {
    fn load_snapshot(&self) -> Result<Option<Value>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let snapshot = serde_json::from_reader(BufReader::new(file))?;
        Ok(Some(snapshot))
    }

    fn persist_snapshot(&self, snapshot: Value) -> Result<()> {
        let _guard = self.write_lock.lock();
        let temp_path = self.temp_path();

        {
            let file = File::create(&temp_path)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer(&mut writer, &snapshot)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }

        fs::rename(&temp_path, &self.path)?;
        log_debug!("snapshot written to {}", self.path.display());
        Ok(())
    }
}
