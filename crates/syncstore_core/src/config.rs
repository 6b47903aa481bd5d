//! Store configuration.

use serde::Deserialize;

/// Configuration for opening a per-user store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Whether to sync the log after every commit (safer but slower).
    pub sync_on_commit: bool,

    /// Whether read-write opens may compact the log automatically.
    pub auto_compact: bool,

    /// Minimum number of logged operations before auto-compaction is considered.
    pub compact_min_ops: u64,

    /// Compact when logged operations exceed live entries by this factor.
    pub compact_ratio: u64,

    /// TTL in seconds assigned to new objects that do not carry one.
    pub default_ttl: u64,

    /// Upper bound (and default) for the number of objects in one listing.
    pub max_list_limit: usize,

    /// Largest accepted payload, in bytes.
    pub max_payload_bytes: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            sync_on_commit: true,
            auto_compact: true,
            compact_min_ops: 1024,
            compact_ratio: 4,
            default_ttl: crate::types::DEFAULT_TTL,
            max_list_limit: 5000,
            max_payload_bytes: 256 * 1024,
        }
    }
}

impl StoreConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to sync the log on every commit.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }

    /// Enables or disables automatic compaction.
    #[must_use]
    pub const fn auto_compact(mut self, value: bool) -> Self {
        self.auto_compact = value;
        self
    }

    /// Sets the auto-compaction thresholds.
    #[must_use]
    pub const fn compact_thresholds(mut self, min_ops: u64, ratio: u64) -> Self {
        self.compact_min_ops = min_ops;
        self.compact_ratio = ratio;
        self
    }

    /// Sets the listing limit cap.
    #[must_use]
    pub const fn max_list_limit(mut self, limit: usize) -> Self {
        self.max_list_limit = limit;
        self
    }

    /// Sets the largest accepted payload size.
    #[must_use]
    pub const fn max_payload_bytes(mut self, bytes: usize) -> Self {
        self.max_payload_bytes = bytes;
        self
    }
}
