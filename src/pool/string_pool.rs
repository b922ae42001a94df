// src/pool/string_pool.rs
//! String constant pool
//!
//! Pool ids are only meaningful inside the chunk they were registered in.
//! The in-memory pool tags every entry with its epoch and re-registers a
//! string into the open chunk the first time it is used after a rotation.

use crate::recording::recorder::Recording;
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Kind of thread a string is being written from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreadKind {
    /// OS thread
    Platform,

    /// Lightweight task multiplexed over platform threads
    Virtual,
}

/// Interns strings into the recording's constant pool
pub trait StringPool: Send + Sync {
    /// Intern `text`, returning its pool id. Ids `<= 0` mean the string was
    /// not pooled and must be written inline.
    fn add_string(&self, text: &str, kind: ThreadKind) -> i64;
}

/// Epoch-scoped in-memory pool backed by the shared [`Recording`]
///
/// Every entry remembers the epoch its constant was registered in and is
/// only handed out while that epoch is current, so an id never appears in a
/// chunk that lacks its constant.
pub struct InMemoryStringPool {
    recording: Arc<Recording>,
    entries: DashMap<(ThreadKind, String), PoolEntry>,
    next_id: AtomicI64,
    generation: AtomicU64,
    max_entries: usize,
}

#[derive(Debug, Clone, Copy)]
struct PoolEntry {
    id: i64,
    epoch: u64,
}

impl InMemoryStringPool {
    /// Create a pool that accepts up to `max_entries` strings per epoch
    pub fn new(recording: Arc<Recording>, max_entries: usize) -> Self {
        let generation = recording.epoch();
        Self {
            recording,
            entries: DashMap::new(),
            next_id: AtomicI64::new(1),
            generation: AtomicU64::new(generation),
            max_entries,
        }
    }

    /// Number of strings held, stale generations included until purged
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop entries from earlier epochs once per epoch change
    fn purge_stale(&self, epoch: u64) {
        let seen = self.generation.load(Ordering::Acquire);
        if seen >= epoch {
            return;
        }
        if self
            .generation
            .compare_exchange(seen, epoch, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            let before = self.entries.len();
            self.entries.retain(|_, entry| entry.epoch >= epoch);
            debug!(
                "String pool generation {} -> {}, purged {} entries",
                seen,
                epoch,
                before - self.entries.len()
            );
        }
    }
}

impl StringPool for InMemoryStringPool {
    fn add_string(&self, text: &str, kind: ThreadKind) -> i64 {
        let epoch = self.recording.epoch();
        self.purge_stale(epoch);

        let key = (kind, text.to_owned());
        if let Some(entry) = self.entries.get(&key) {
            if entry.epoch == epoch {
                return entry.id;
            }
        }

        if self.entries.len() >= self.max_entries {
            return 0;
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        // Constant first, entry second: a visible entry implies its constant
        // is in that epoch's chunk
        if !self.recording.add_constant(epoch, id as u64, text) {
            return 0;
        }
        self.entries.insert(key, PoolEntry { id, epoch });
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_string_same_id() {
        let recording = Arc::new(Recording::new());
        let pool = InMemoryStringPool::new(Arc::clone(&recording), 16);

        let a = pool.add_string("org.example.Service", ThreadKind::Platform);
        let b = pool.add_string("org.example.Service", ThreadKind::Platform);
        assert!(a > 0);
        assert_eq!(a, b);
        assert_eq!(pool.len(), 1);
        assert_eq!(recording.current_chunk_constants(), 1);
    }

    #[test]
    fn test_thread_kinds_are_separate() {
        let recording = Arc::new(Recording::new());
        let pool = InMemoryStringPool::new(recording, 16);

        let platform = pool.add_string("shared-string-value", ThreadKind::Platform);
        let virt = pool.add_string("shared-string-value", ThreadKind::Virtual);
        assert!(platform > 0 && virt > 0);
        assert_ne!(platform, virt);
    }

    #[test]
    fn test_full_pool_falls_back() {
        let recording = Arc::new(Recording::new());
        let pool = InMemoryStringPool::new(recording, 1);

        assert!(pool.add_string("first-pooled-string", ThreadKind::Platform) > 0);
        assert_eq!(pool.add_string("second-pooled-string", ThreadKind::Platform), 0);
        // Already pooled strings still resolve
        assert!(pool.add_string("first-pooled-string", ThreadKind::Platform) > 0);
    }

    #[test]
    fn test_epoch_shift_resets_pool() {
        let recording = Arc::new(Recording::new());
        let pool = InMemoryStringPool::new(Arc::clone(&recording), 16);

        pool.add_string("before-the-rotation", ThreadKind::Platform);
        assert_eq!(pool.len(), 1);

        let before = pool.add_string("before-the-rotation", ThreadKind::Platform);
        recording.rotate();
        let after = pool.add_string("before-the-rotation", ThreadKind::Platform);
        assert!(after > 0);
        assert_ne!(before, after);
        assert_eq!(pool.len(), 1);
        // Re-registered into the new chunk
        assert_eq!(recording.current_chunk_constants(), 1);
    }
}
