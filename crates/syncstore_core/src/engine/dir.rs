//! Store directory layout and locking.
//!
//! ```text
//! <root>/<uid>/
//! ├─ LOCK          # advisory lock: shared for readers, exclusive for writers
//! └─ objects.log   # append-only record log
//! ```

use super::OpenMode;
use crate::error::StoreResult;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const LOG_FILE: &str = "objects.log";
const COMPACT_FILE: &str = "objects.log.compact";

/// An opened store directory holding its advisory lock.
///
/// The lock is taken blocking, so a second read-write open of the same
/// directory waits until the first handle is dropped. The lock is released
/// when the `StoreDir` is dropped.
#[derive(Debug)]
pub(crate) struct StoreDir {
    path: PathBuf,
    lock_file: File,
}

impl StoreDir {
    /// Opens (creating if needed) the directory and acquires its lock.
    pub(crate) fn open(path: &Path, mode: OpenMode) -> StoreResult<Self> {
        fs::create_dir_all(path)?;

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        match mode {
            OpenMode::ReadOnly => lock_file.lock_shared()?,
            OpenMode::ReadWrite => lock_file.lock_exclusive()?,
        }

        Ok(Self {
            path: path.to_path_buf(),
            lock_file,
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn log_path(&self) -> PathBuf {
        self.path.join(LOG_FILE)
    }

    pub(crate) fn compact_path(&self) -> PathBuf {
        self.path.join(COMPACT_FILE)
    }
}

impl Drop for StoreDir {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.lock_file);
    }
}
