//! Scoped writer for one cache entry.

use crate::entry::CacheEntry;
use crate::fingerprint::QueryFingerprint;
use crate::scheduler::RemovalScheduler;
use crate::stats::CacheStats;
use crate::store::ResultStore;
use arrow::record_batch::RecordBatch;
use resultcache_core::Schema;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Put handle produced by `QueryResultCache::try_put`.
///
/// The first concurrent writer for a fingerprint owns the entry; any other
/// handle for the same key is inert and silently drops its batches, which
/// keeps writers per key at most one. Dropping an owning handle is the
/// scoped release: the entry becomes readable and its timed removal is
/// scheduled. All exit paths of the caller run it, so an abandoned write
/// still publishes whatever was pushed; use [`cancel`](Self::cancel) to
/// discard a partial result instead.
pub struct CacheWriter {
    store: Arc<ResultStore>,
    scheduler: Arc<RemovalScheduler>,
    stats: Arc<CacheStats>,
    key: QueryFingerprint,
    entry: Arc<CacheEntry>,
    can_insert: bool,
    max_entry_size: usize,
    residency: Duration,
}

impl CacheWriter {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        store: Arc<ResultStore>,
        scheduler: Arc<RemovalScheduler>,
        stats: Arc<CacheStats>,
        key: QueryFingerprint,
        entry: Arc<CacheEntry>,
        can_insert: bool,
        max_entry_size: usize,
        residency: Duration,
    ) -> Self {
        Self {
            store,
            scheduler,
            stats,
            key,
            entry,
            can_insert,
            max_entry_size,
            residency,
        }
    }

    /// Whether this handle owns its entry. Exactly one concurrent writer per
    /// fingerprint does.
    pub fn is_owner(&self) -> bool {
        self.can_insert
    }

    /// Appends a batch to the entry. A no-op for non-owning handles.
    ///
    /// A batch whose header does not match the fingerprint's schema
    /// discards the write: the entry was keyed for a different result
    /// shape and caching it would serve wrong rows to readers. Crossing
    /// the per-entry size limit likewise removes the entry, discards every
    /// batch appended so far, and makes this handle inert.
    pub fn push(&mut self, batch: RecordBatch) {
        if !self.can_insert {
            return;
        }
        if Schema::from_arrow(&batch.schema()) != *self.key.schema() {
            debug!(
                expected = %self.key.schema().describe(),
                "batch header does not match the result fingerprint, dropping the write"
            );
            self.discard();
            return;
        }
        let size = self.entry.push(batch);
        if size > self.max_entry_size {
            debug!(
                size,
                limit = self.max_entry_size,
                "query result exceeded the per-entry cache limit, dropping it"
            );
            self.discard();
        }
    }

    /// Discards the partial result and removes the entry, so the scoped
    /// release publishes nothing.
    pub fn cancel(&mut self) {
        if self.can_insert {
            self.discard();
        }
    }

    fn discard(&mut self) {
        self.can_insert = false;
        self.entry.discard_batches();
        self.store.remove(&self.key);
        self.stats.record_discarded_write();
    }
}

impl Drop for CacheWriter {
    fn drop(&mut self) {
        if !self.can_insert {
            return;
        }
        self.entry.finish_writing();
        if self.store.commit(&self.key, &self.entry) {
            self.scheduler
                .schedule(self.residency, self.key.clone());
        }
    }
}
