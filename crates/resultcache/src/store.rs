//! Byte-bounded LRU store mapping fingerprints to shared entries.

use crate::entry::CacheEntry;
use crate::fingerprint::QueryFingerprint;
use crate::stats::CacheStats;
use lru::LruCache;
use parking_lot::Mutex;
use std::sync::Arc;

struct Slot {
    entry: Arc<CacheEntry>,
    /// Bytes charged against the store budget for this entry. Zero while
    /// the entry is still being written; set by [`ResultStore::commit`].
    charged: usize,
}

struct StoreInner {
    entries: LruCache<QueryFingerprint, Slot>,
    memory_used: usize,
}

/// Associative container ordered by recency of access, bounded by total
/// entry weight in bytes.
///
/// A single lock guards the map, its recency order, and the byte
/// accounting. Weight-driven eviction pops from the least-recent end; the
/// entry touched by the current operation is most recent and is always
/// spared, so a lone over-budget entry survives until the next operation.
pub(crate) struct ResultStore {
    inner: Mutex<StoreInner>,
    max_bytes: usize,
    stats: Arc<CacheStats>,
}

impl ResultStore {
    pub fn new(max_bytes: usize, stats: Arc<CacheStats>) -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                entries: LruCache::unbounded(),
                memory_used: 0,
            }),
            max_bytes,
            stats,
        }
    }

    /// Looks up `key`, inserting a fresh entry from `factory` when absent.
    /// Returns the shared entry and whether this call inserted it. The
    /// factory runs at most once, under the store lock.
    pub fn get_or_insert(
        &self,
        key: &QueryFingerprint,
        factory: impl FnOnce() -> CacheEntry,
    ) -> (Arc<CacheEntry>, bool) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        Self::shrink(inner, self.max_bytes, 0, &self.stats);

        if let Some(slot) = inner.entries.get(key) {
            return (slot.entry.clone(), false);
        }

        let entry = Arc::new(factory());
        inner.entries.put(
            key.clone(),
            Slot {
                entry: entry.clone(),
                charged: 0,
            },
        );
        self.publish_occupancy(inner);
        (entry, true)
    }

    /// Returns the entry for `key`, refreshing its recency.
    pub fn get(&self, key: &QueryFingerprint) -> Option<Arc<CacheEntry>> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        Self::shrink(inner, self.max_bytes, 0, &self.stats);
        inner.entries.get(key).map(|slot| slot.entry.clone())
    }

    /// Existence probe. Does not refresh recency and, unlike [`get`](Self::get),
    /// sees entries that are still being written.
    pub fn contains(&self, key: &QueryFingerprint) -> bool {
        self.inner.lock().entries.contains(key)
    }

    /// Charges `entry`'s final weight against the budget and evicts from the
    /// least-recent end until the store fits again. The committed entry
    /// becomes most recent and is spared. Returns false when the entry was
    /// evicted or replaced while it was being written.
    pub fn commit(&self, key: &QueryFingerprint, entry: &Arc<CacheEntry>) -> bool {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let size = entry.size_bytes();
        match inner.entries.get_mut(key) {
            Some(slot) if Arc::ptr_eq(&slot.entry, entry) => {
                inner.memory_used = inner.memory_used - slot.charged + size;
                slot.charged = size;
            }
            _ => return false,
        }
        Self::shrink(inner, self.max_bytes, 1, &self.stats);
        self.publish_occupancy(inner);
        true
    }

    /// Idempotent removal.
    pub fn remove(&self, key: &QueryFingerprint) -> bool {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        match inner.entries.pop(key) {
            Some(slot) => {
                inner.memory_used = inner.memory_used.saturating_sub(slot.charged);
                self.publish_occupancy(inner);
                true
            }
            None => false,
        }
    }

    /// Drops every entry.
    pub fn reset(&self) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        inner.entries.clear();
        inner.memory_used = 0;
        self.publish_occupancy(inner);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn memory_used(&self) -> usize {
        self.inner.lock().memory_used
    }

    /// Pops least-recent entries while the budget is exceeded, keeping at
    /// least `min_len` entries. `min_len = 1` spares the entry the current
    /// operation just touched (it is most recent); `min_len = 0` also
    /// reclaims a lone over-budget entry left behind by an earlier
    /// operation.
    fn shrink(inner: &mut StoreInner, max_bytes: usize, min_len: usize, stats: &CacheStats) {
        while inner.memory_used > max_bytes && inner.entries.len() > min_len {
            match inner.entries.pop_lru() {
                Some((_, slot)) => {
                    inner.memory_used = inner.memory_used.saturating_sub(slot.charged);
                    stats.record_eviction();
                }
                None => break,
            }
        }
    }

    fn publish_occupancy(&self, inner: &StoreInner) {
        self.stats.set_entry_count(inner.entries.len() as u64);
        self.stats.set_memory_bytes(inner.memory_used as u64);
    }
}
