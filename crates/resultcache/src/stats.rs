//! Cache statistics tracking.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for cache performance monitoring. All counters are relaxed
/// atomics; they are never part of the cache's correctness.
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Completed reads served from the cache
    hits: AtomicU64,
    /// Reads that found nothing (or an entry still being written)
    misses: AtomicU64,
    /// Entries evicted by weight pressure
    evictions: AtomicU64,
    /// Entries removed because their residency expired
    expirations: AtomicU64,
    /// Write sessions whose batches were dropped: writer collisions,
    /// per-entry size overflows, and cancellations
    discarded_writes: AtomicU64,
    /// Current number of entries
    entry_count: AtomicU64,
    /// Approximate bytes charged against the budget
    memory_bytes: AtomicU64,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_expiration(&self) {
        self.expirations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_discarded_write(&self) {
        self.discarded_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_entry_count(&self, count: u64) {
        self.entry_count.store(count, Ordering::Relaxed);
    }

    pub fn set_memory_bytes(&self, bytes: u64) {
        self.memory_bytes.store(bytes, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    pub fn expirations(&self) -> u64 {
        self.expirations.load(Ordering::Relaxed)
    }

    pub fn discarded_writes(&self) -> u64 {
        self.discarded_writes.load(Ordering::Relaxed)
    }

    pub fn entry_count(&self) -> u64 {
        self.entry_count.load(Ordering::Relaxed)
    }

    pub fn memory_bytes(&self) -> u64 {
        self.memory_bytes.load(Ordering::Relaxed)
    }

    /// Hit rate over all reads, 0.0 to 1.0.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits() as f64;
        let total = hits + self.misses() as f64;
        if total == 0.0 {
            0.0
        } else {
            hits / total
        }
    }

    pub fn total_reads(&self) -> u64 {
        self.hits() + self.misses()
    }
}
