//! Nonce replay protection.
//!
//! The in-memory cache protects a single process only. Several server
//! instances sharing credentials do not see each other's nonces.

use crate::clock::Clock;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Remembers recently admitted (id, nonce) pairs.
pub trait ReplayCache: Send + Sync {
    /// Returns `true` if the pair was recorded with a timestamp within the
    /// window around `timestamp`.
    fn seen(&self, id: &str, nonce: &str, timestamp: i64) -> bool;

    /// Records the pair.
    fn record(&self, id: &str, nonce: &str, timestamp: i64);

    /// Records the pair unless it was already seen. Returns `true` if the
    /// pair is fresh. Atomic with respect to concurrent callers.
    fn check_and_record(&self, id: &str, nonce: &str, timestamp: i64) -> bool;
}

#[derive(Debug)]
struct Entries {
    seen: HashMap<(String, String), i64>,
    last_sweep: i64,
}

/// Process-local replay cache with inline eviction.
///
/// Entries whose timestamp fell out of the window are evicted at most once
/// per sweep interval, during a write.
pub struct InMemoryReplayCache {
    entries: Mutex<Entries>,
    window: i64,
    sweep_interval: i64,
    clock: Arc<dyn Clock>,
}

impl InMemoryReplayCache {
    /// Creates a cache with a skew window of `window` seconds.
    pub fn new(window: i64, sweep_interval: i64, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        Self {
            entries: Mutex::new(Entries {
                seen: HashMap::new(),
                last_sweep: now,
            }),
            window,
            sweep_interval,
            clock,
        }
    }

    /// Number of remembered pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().seen.len()
    }

    /// Returns `true` if nothing is remembered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evicts every entry older than the window.
    pub fn sweep(&self) {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        self.evict(&mut entries, now);
    }

    fn evict(&self, entries: &mut Entries, now: i64) {
        let cutoff = now.saturating_sub(self.window);
        let before = entries.seen.len();
        entries.seen.retain(|_, ts| *ts >= cutoff);
        entries.last_sweep = now;
        let evicted = before - entries.seen.len();
        if evicted > 0 {
            tracing::trace!(evicted, remaining = entries.seen.len(), "replay cache swept");
        }
    }

    fn maybe_sweep(&self, entries: &mut Entries) {
        let now = self.clock.now();
        if now.saturating_sub(entries.last_sweep) >= self.sweep_interval {
            self.evict(entries, now);
        }
    }

    fn is_seen(&self, entries: &Entries, id: &str, nonce: &str, timestamp: i64) -> bool {
        entries
            .seen
            .get(&(id.to_owned(), nonce.to_owned()))
            .is_some_and(|recorded| recorded.abs_diff(timestamp) <= self.window.unsigned_abs())
    }
}

impl ReplayCache for InMemoryReplayCache {
    fn seen(&self, id: &str, nonce: &str, timestamp: i64) -> bool {
        let entries = self.entries.lock();
        self.is_seen(&entries, id, nonce, timestamp)
    }

    fn record(&self, id: &str, nonce: &str, timestamp: i64) {
        let mut entries = self.entries.lock();
        self.maybe_sweep(&mut entries);
        entries
            .seen
            .insert((id.to_owned(), nonce.to_owned()), timestamp);
    }

    fn check_and_record(&self, id: &str, nonce: &str, timestamp: i64) -> bool {
        let mut entries = self.entries.lock();
        self.maybe_sweep(&mut entries);
        if self.is_seen(&entries, id, nonce, timestamp) {
            return false;
        }
        entries
            .seen
            .insert((id.to_owned(), nonce.to_owned()), timestamp);
        true
    }
}

impl std::fmt::Debug for InMemoryReplayCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryReplayCache")
            .field("window", &self.window)
            .field("entries", &self.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::thread;

    fn cache(clock: &Arc<ManualClock>) -> InMemoryReplayCache {
        InMemoryReplayCache::new(60, 10, Arc::clone(clock) as Arc<dyn Clock>)
    }

    #[test]
    fn second_use_is_rejected() {
        let clock = Arc::new(ManualClock::new(1000));
        let cache = cache(&clock);
        assert!(cache.check_and_record("a", "n1", 1000));
        assert!(!cache.check_and_record("a", "n1", 1000));
        assert!(cache.check_and_record("a", "n2", 1000));
        assert!(cache.check_and_record("b", "n1", 1000));
    }

    #[test]
    fn seen_and_record() {
        let clock = Arc::new(ManualClock::new(1000));
        let cache = cache(&clock);
        assert!(!cache.seen("a", "n", 1000));
        cache.record("a", "n", 1000);
        assert!(cache.seen("a", "n", 1030));
        assert!(!cache.seen("a", "n", 1100));
    }

    #[test]
    fn old_entries_are_swept() {
        let clock = Arc::new(ManualClock::new(1000));
        let cache = cache(&clock);
        cache.record("a", "n", 1000);
        clock.advance(61);
        cache.record("a", "m", 1061);
        assert_eq!(cache.len(), 1);

        clock.advance(100);
        cache.sweep();
        assert!(cache.is_empty());
    }

    #[test]
    fn extreme_timestamps_do_not_overflow() {
        let clock = Arc::new(ManualClock::new(i64::MIN));
        let cache = cache(&clock);
        assert!(cache.check_and_record("a", "n", i64::MIN));
        assert!(!cache.seen("a", "n", i64::MAX));
        assert!(cache.seen("a", "n", i64::MIN));

        clock.set(i64::MAX);
        cache.sweep();
        assert!(cache.is_empty());
    }

    #[test]
    fn concurrent_check_admits_once() {
        let clock = Arc::new(ManualClock::new(1000));
        let cache = Arc::new(cache(&clock));
        let admitted: usize = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || cache.check_and_record("a", "same", 1000))
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|h| usize::from(h.join().unwrap()))
            .sum();
        assert_eq!(admitted, 1);
    }
}
