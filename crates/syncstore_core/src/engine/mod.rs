//! Log-structured transactional key/value engine.
//!
//! An [`Engine`] keeps every namespace in memory and persists each committed
//! write transaction as one framed record appended to a log. Opening replays
//! the log; a torn or corrupt tail (a record that never finished committing)
//! is truncated away. Compaction rewrites the log as a single snapshot record.
//!
//! Concurrency follows a single-writer model: [`Engine::begin_write`] blocks
//! until no other write transaction is open, while any number of
//! [`ReadTransaction`]s may observe committed state at the same time.
//!
//! ```rust
//! use syncstore_core::{Engine, StoreConfig};
//!
//! let engine = Engine::in_memory(StoreConfig::default())?;
//! let mut txn = engine.begin_write()?;
//! txn.create_namespace("tabs");
//! txn.put("tabs", "a", b"payload".to_vec())?;
//! txn.commit()?;
//!
//! let read = engine.begin_read();
//! assert_eq!(read.get("tabs", "a"), Some(&b"payload"[..]));
//! # Ok::<(), syncstore_core::StoreError>(())
//! ```

mod dir;
mod namespaces;
mod record;
mod transaction;

pub use namespaces::Namespace;
pub use record::{compute_crc32, LogOp, LOG_MAGIC, LOG_VERSION};
pub use transaction::{ReadTransaction, WriteTransaction};

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use dir::StoreDir;
use namespaces::Namespaces;
use parking_lot::{Mutex, RwLock};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use syncstore_storage::{FileBackend, InMemoryBackend, StorageBackend};

/// How a store is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Shared access; write transactions are refused.
    ReadOnly,
    /// Exclusive access.
    ReadWrite,
}

/// Engine statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Size of the log in bytes.
    pub log_bytes: u64,
    /// Operations currently recorded in the log.
    pub log_ops: u64,
    /// Number of namespaces.
    pub namespaces: usize,
    /// Number of entries across all namespaces.
    pub entries: u64,
}

/// The storage engine.
pub struct Engine {
    backend: Mutex<Box<dyn StorageBackend>>,
    pub(crate) state: RwLock<Namespaces>,
    writer: Mutex<()>,
    mode: OpenMode,
    config: StoreConfig,
    log_ops: AtomicU64,
    poisoned: AtomicBool,
    // Declared last so the lock outlives the log handle.
    dir: Option<StoreDir>,
}

impl Engine {
    /// Opens the engine stored in directory `path`, creating it if needed.
    ///
    /// Blocks until the directory lock is available: shared for
    /// [`OpenMode::ReadOnly`], exclusive for [`OpenMode::ReadWrite`].
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or log cannot be opened, or if a
    /// checksummed record does not apply cleanly.
    pub fn open(path: &Path, mode: OpenMode, config: StoreConfig) -> StoreResult<Self> {
        let dir = StoreDir::open(path, mode)?;
        if mode == OpenMode::ReadWrite {
            let leftover = dir.compact_path();
            if leftover.exists() {
                tracing::warn!(path = %leftover.display(), "removing interrupted compaction");
                fs::remove_file(&leftover)?;
            }
        }

        let backend: Box<dyn StorageBackend> = Box::new(FileBackend::open(&dir.log_path())?);
        let engine = Self::recover(backend, mode, config, Some(dir))?;

        if mode == OpenMode::ReadWrite && engine.should_compact() {
            engine.compact()?;
        }
        Ok(engine)
    }

    /// Creates an empty engine that lives only in memory.
    ///
    /// # Errors
    ///
    /// Never fails in practice; the signature matches [`Engine::open`].
    pub fn in_memory(config: StoreConfig) -> StoreResult<Self> {
        Self::with_backend(Box::new(InMemoryBackend::new()), config)
    }

    /// Opens a read-write engine over an arbitrary backend, replaying its contents.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read or repaired.
    pub fn with_backend(backend: Box<dyn StorageBackend>, config: StoreConfig) -> StoreResult<Self> {
        Self::recover(backend, OpenMode::ReadWrite, config, None)
    }

    fn recover(
        mut backend: Box<dyn StorageBackend>,
        mode: OpenMode,
        config: StoreConfig,
        dir: Option<StoreDir>,
    ) -> StoreResult<Self> {
        let bytes = backend.read_all()?;
        let log = record::decode_log(&bytes);

        let mut state = Namespaces::default();
        let mut log_ops = 0u64;
        for ops in &log.records {
            log_ops += ops.len() as u64;
            for op in ops.iter().cloned() {
                state.apply(op).map_err(|e| {
                    StoreError::corrupted(format!("log record does not apply: {e}"))
                })?;
            }
        }

        if let Some(reason) = &log.tail_error {
            let discarded = bytes.len() as u64 - log.valid_len;
            match mode {
                OpenMode::ReadWrite => {
                    tracing::warn!(%reason, discarded, "truncating torn log tail");
                    backend.truncate(log.valid_len)?;
                    backend.sync()?;
                }
                OpenMode::ReadOnly => {
                    tracing::warn!(%reason, discarded, "ignoring torn log tail");
                }
            }
        }

        tracing::debug!(
            records = log.records.len(),
            namespaces = state.len(),
            entries = state.entry_count(),
            "engine recovered"
        );

        Ok(Self {
            backend: Mutex::new(backend),
            state: RwLock::new(state),
            writer: Mutex::new(()),
            mode,
            config,
            log_ops: AtomicU64::new(log_ops),
            poisoned: AtomicBool::new(false),
            dir,
        })
    }

    /// Returns the mode this engine was opened with.
    #[must_use]
    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// Returns the directory backing this engine, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.dir.as_ref().map(StoreDir::path)
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Begins a read transaction over committed state.
    pub fn begin_read(&self) -> ReadTransaction<'_> {
        ReadTransaction::new(self.state.read())
    }

    /// Begins a write transaction, waiting for any other writer to finish.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ReadOnly`] if the engine was opened read-only,
    /// or [`StoreError::Poisoned`] after a commit could not be rolled back.
    pub fn begin_write(&self) -> StoreResult<WriteTransaction<'_>> {
        self.check_writable()?;
        let guard = self.writer.lock();
        Ok(WriteTransaction::new(self, guard))
    }

    /// Returns `true` once a failed commit left bytes in the log that could
    /// not be removed.
    #[must_use]
    pub fn is_poisoned(&self) -> bool {
        self.poisoned.load(Ordering::SeqCst)
    }

    fn check_writable(&self) -> StoreResult<()> {
        if self.mode == OpenMode::ReadOnly {
            return Err(StoreError::ReadOnly);
        }
        if self.is_poisoned() {
            return Err(StoreError::Poisoned);
        }
        Ok(())
    }

    /// Appends one record and applies it. On failure the log is cut back to
    /// its previous length so the record cannot resurface on reopen.
    pub(crate) fn commit_ops(&self, ops: Vec<LogOp>) -> StoreResult<()> {
        self.check_writable()?;
        let data = record::encode_record(&ops)?;
        {
            let mut backend = self.backend.lock();
            let start = backend.size()?;
            if let Err(err) = append_record(&mut **backend, &data, self.config.sync_on_commit) {
                self.roll_back(&mut **backend, start);
                return Err(err);
            }
        }

        let count = ops.len() as u64;
        let mut state = self.state.write();
        for op in ops {
            state.apply(op)?;
        }
        self.log_ops.fetch_add(count, Ordering::SeqCst);
        Ok(())
    }

    fn roll_back(&self, backend: &mut dyn StorageBackend, len: u64) {
        match backend.truncate(len).and_then(|()| backend.sync()) {
            Ok(()) => tracing::warn!(len, "failed commit rolled back"),
            Err(err) => {
                tracing::error!(error = %err, len, "failed commit could not be rolled back");
                self.poisoned.store(true, Ordering::SeqCst);
            }
        }
    }

    /// Rewrites the log as a single snapshot of the current state.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ReadOnly`] for read-only engines,
    /// [`StoreError::Poisoned`] after a failed rollback, or an I/O error.
    pub fn compact(&self) -> StoreResult<()> {
        self.check_writable()?;
        let _writer = self.writer.lock();
        let state = self.state.read();
        let ops = state.snapshot_ops();
        let data = if ops.is_empty() {
            Vec::new()
        } else {
            record::encode_record(&ops)?
        };

        let mut backend = self.backend.lock();
        let before = backend.size()?;
        match &self.dir {
            Some(dir) => {
                let tmp_path = dir.compact_path();
                let mut tmp = FileBackend::create(&tmp_path)?;
                tmp.append(&data)?;
                tmp.sync()?;
                drop(tmp);
                fs::rename(&tmp_path, dir.log_path())?;
                *backend = Box::new(FileBackend::open(&dir.log_path())?);
            }
            None => {
                backend.truncate(0)?;
                backend.append(&data)?;
                backend.sync()?;
            }
        }

        self.log_ops.store(ops.len() as u64, Ordering::SeqCst);
        tracing::info!(before, after = data.len(), "log compacted");
        Ok(())
    }

    fn should_compact(&self) -> bool {
        if !self.config.auto_compact {
            return false;
        }
        let log_ops = self.log_ops.load(Ordering::SeqCst);
        let live = {
            let state = self.state.read();
            state.entry_count() + state.len() as u64
        };
        log_ops >= self.config.compact_min_ops
            && log_ops > live.saturating_mul(self.config.compact_ratio)
    }

    /// Returns engine statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the log size cannot be read.
    pub fn stats(&self) -> StoreResult<EngineStats> {
        let log_bytes = self.backend.lock().size()?;
        let state = self.state.read();
        Ok(EngineStats {
            log_bytes,
            log_ops: self.log_ops.load(Ordering::SeqCst),
            namespaces: state.len(),
            entries: state.entry_count(),
        })
    }

    /// Flushes the log and releases the directory lock.
    ///
    /// # Errors
    ///
    /// Returns an error if the final sync fails.
    pub fn close(self) -> StoreResult<()> {
        if self.mode == OpenMode::ReadWrite {
            self.backend.lock().sync()?;
        }
        Ok(())
    }
}

fn append_record(backend: &mut dyn StorageBackend, data: &[u8], sync: bool) -> StoreResult<()> {
    backend.append(data)?;
    if sync {
        backend.sync()?;
    }
    Ok(())
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("mode", &self.mode)
            .field("path", &self.path())
            .field("log_ops", &self.log_ops.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
