//! The query result cache facade.

use crate::config::CacheConfig;
use crate::entry::CacheEntry;
use crate::fingerprint::QueryFingerprint;
use crate::reader::CacheReader;
use crate::scheduler::RemovalScheduler;
use crate::stats::CacheStats;
use crate::store::ResultStore;
use crate::writer::CacheWriter;
use ahash::RandomState;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Memoizes materialized query results keyed by fingerprint.
///
/// Shared across query worker threads; all interaction goes through scoped
/// handles. Lock order is store lock, then counter lock; the scheduler's
/// lock is never held together with either.
pub struct QueryResultCache {
    scheduler: Arc<RemovalScheduler>,
    store: Arc<ResultStore>,
    times_executed: Mutex<HashMap<QueryFingerprint, u64, RandomState>>,
    config: CacheConfig,
    stats: Arc<CacheStats>,
}

impl QueryResultCache {
    pub fn new(config: CacheConfig) -> Self {
        let stats = Arc::new(CacheStats::new());
        let store = Arc::new(ResultStore::new(config.max_bytes, stats.clone()));
        let scheduler = Arc::new(RemovalScheduler::new(store.clone(), stats.clone()));
        Self {
            scheduler,
            store,
            times_executed: Mutex::new(HashMap::default()),
            config,
            stats,
        }
    }

    /// Cache bounded by `max_bytes`, every other knob at its default.
    pub fn with_max_bytes(max_bytes: usize) -> Self {
        Self::new(CacheConfig::default().with_max_bytes(max_bytes))
    }

    /// Opens a write session for `key`.
    ///
    /// The returned handle owns the entry only if no entry for `key` existed
    /// yet; otherwise (another writer in progress, or a completed result
    /// already stored) the handle is inert and its pushes are dropped.
    pub fn try_put(&self, key: QueryFingerprint) -> CacheWriter {
        let (entry, inserted) = if self.config.enabled {
            let (entry, inserted) = self.store.get_or_insert(&key, CacheEntry::new_writing);
            if !inserted {
                self.stats.record_discarded_write();
            }
            (entry, inserted)
        } else {
            (Arc::new(CacheEntry::new_writing()), false)
        };
        CacheWriter::new(
            self.store.clone(),
            self.scheduler.clone(),
            self.stats.clone(),
            key,
            entry,
            inserted,
            self.config.max_entry_size,
            self.config.entry_put_timeout,
        )
    }

    /// Attempts to read the result for `key`.
    ///
    /// An absent entry, or one whose writer has not finished, is a miss; the
    /// caller proceeds with normal execution, without waiting.
    pub fn try_read(&self, key: &QueryFingerprint) -> CacheReader {
        if !self.config.enabled {
            return CacheReader::miss();
        }
        match self.store.get(key) {
            Some(entry) if !entry.is_writing() => {
                self.stats.record_hit();
                CacheReader::hit(Arc::new(key.schema().to_arrow()), entry.snapshot())
            }
            _ => {
                self.stats.record_miss();
                CacheReader::miss()
            }
        }
    }

    /// Existence probe for diagnostics. Unlike [`try_read`](Self::try_read)
    /// it reports entries that are still being written.
    pub fn contains(&self, key: &QueryFingerprint) -> bool {
        self.config.enabled && self.store.contains(key)
    }

    /// Increments and returns the execution count for `key`.
    pub fn record_run(&self, key: &QueryFingerprint) -> u64 {
        let mut counts = self.times_executed.lock();
        let count = counts.entry(key.clone()).or_insert(0);
        *count += 1;
        *count
    }

    /// Whether a query that has run `times_executed` times has met the
    /// configured caching gate.
    pub fn worth_caching(&self, times_executed: u64) -> bool {
        times_executed >= self.config.min_executions_before_caching
    }

    /// Drops every cached entry. Execution counts survive: they describe
    /// the workload, not the cache contents.
    pub fn reset(&self) {
        self.store.reset();
        debug!("query result cache reset");
    }

    pub fn stats(&self) -> Arc<CacheStats> {
        Arc::clone(&self.stats)
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Approximate bytes currently charged against the budget.
    pub fn memory_used(&self) -> usize {
        self.store.memory_used()
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
}

impl Drop for QueryResultCache {
    fn drop(&mut self) {
        // Outstanding writer handles may still hold the scheduler; stopping
        // here guarantees the worker winds down with the facade even then.
        self.scheduler.stop();
    }
}

impl std::fmt::Debug for QueryResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryResultCache")
            .field("enabled", &self.config.enabled)
            .field("max_bytes", &self.config.max_bytes)
            .field("max_entry_size", &self.config.max_entry_size)
            .field("entry_put_timeout", &self.config.entry_put_timeout)
            .field("current_entries", &self.len())
            .field("memory_used", &self.memory_used())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::batch_allocated_bytes;
    use crate::source::BatchSource;
    use arrow::array::Int64Array;
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;
    use resultcache_core::ExecutionSettings;
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    fn create_test_batch(values: Vec<i64>) -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![Field::new("id", DataType::Int64, false)]));
        let array = Arc::new(Int64Array::from(values));
        RecordBatch::try_new(schema, vec![array]).unwrap()
    }

    fn column_values(batch: &RecordBatch) -> Vec<i64> {
        let array = batch
            .column(0)
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        (0..array.len()).map(|i| array.value(i)).collect()
    }

    fn test_key(n: u64) -> QueryFingerprint {
        let schema = resultcache_core::Schema::new(vec![resultcache_core::Field::new(
            "id",
            resultcache_core::DataType::Int64,
            false,
        )]);
        QueryFingerprint::from_ast_hash(n, &schema, &ExecutionSettings::new(), None)
    }

    fn drain(source: &mut crate::CachedSource) -> Vec<i64> {
        block_on(async {
            match source.next_batch().await {
                Some(result) => column_values(&result.unwrap()),
                None => vec![],
            }
        })
    }

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(future)
    }

    #[test]
    fn test_put_then_read_round_trip() {
        let cache = QueryResultCache::new(CacheConfig::default());
        let key = test_key(1);

        {
            let mut writer = cache.try_put(key.clone());
            assert!(writer.is_owner());
            writer.push(create_test_batch(vec![1, 2]));
            writer.push(create_test_batch(vec![3]));
        }

        let mut reader = cache.try_read(&key);
        assert!(reader.has_result());
        let mut source = reader.take_source().unwrap();
        assert_eq!(drain(&mut source), vec![1, 2, 3]);
        assert_eq!(cache.stats().hits(), 1);
    }

    #[test]
    fn test_read_miss() {
        let cache = QueryResultCache::new(CacheConfig::default());
        let reader = cache.try_read(&test_key(1));
        assert!(!reader.has_result());
        assert_eq!(cache.stats().misses(), 1);
    }

    #[test]
    fn test_entry_invisible_while_writing() {
        let cache = QueryResultCache::new(CacheConfig::default());
        let key = test_key(1);

        let mut writer = cache.try_put(key.clone());
        writer.push(create_test_batch(vec![1]));

        // Visible to the existence probe, invisible to readers.
        assert!(cache.contains(&key));
        assert!(!cache.try_read(&key).has_result());

        drop(writer);
        assert!(cache.try_read(&key).has_result());
    }

    #[test]
    fn test_second_writer_is_inert() {
        let cache = QueryResultCache::new(CacheConfig::default());
        let key = test_key(1);

        let mut first = cache.try_put(key.clone());
        let mut second = cache.try_put(key.clone());
        assert!(first.is_owner());
        assert!(!second.is_owner());

        first.push(create_test_batch(vec![1, 2]));
        second.push(create_test_batch(vec![99]));
        drop(second);
        drop(first);

        let mut reader = cache.try_read(&key);
        let mut source = reader.take_source().unwrap();
        assert_eq!(drain(&mut source), vec![1, 2]);
    }

    #[test]
    fn test_concurrent_writers_exactly_one_owner() {
        let cache = Arc::new(QueryResultCache::new(CacheConfig::default()));
        let key = test_key(1);
        let barrier = Arc::new(Barrier::new(2));

        let mut handles = vec![];
        for values in [vec![1i64, 2], vec![10, 20]] {
            let cache = Arc::clone(&cache);
            let key = key.clone();
            let barrier = Arc::clone(&barrier);
            handles.push(thread::spawn(move || {
                barrier.wait();
                let mut writer = cache.try_put(key);
                let owner = writer.is_owner();
                writer.push(create_test_batch(values.clone()));
                (owner, values)
            }));
        }

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let owners: Vec<_> = results.iter().filter(|(owner, _)| *owner).collect();
        assert_eq!(owners.len(), 1);

        let mut reader = cache.try_read(&key);
        let mut source = reader.take_source().unwrap();
        assert_eq!(drain(&mut source), owners[0].1);
    }

    #[test]
    fn test_entry_at_size_ceiling_is_kept() {
        let batch = create_test_batch(vec![1, 2, 3]);
        let limit = batch_allocated_bytes(&batch);
        let cache =
            QueryResultCache::new(CacheConfig::default().with_max_entry_size(limit));
        let key = test_key(1);

        let mut writer = cache.try_put(key.clone());
        writer.push(batch);
        drop(writer);

        assert!(cache.try_read(&key).has_result());
    }

    #[test]
    fn test_entry_over_size_ceiling_is_dropped() {
        let batch = create_test_batch(vec![1, 2, 3]);
        let limit = batch_allocated_bytes(&batch) - 1;
        let cache =
            QueryResultCache::new(CacheConfig::default().with_max_entry_size(limit));
        let key = test_key(1);

        let mut writer = cache.try_put(key.clone());
        writer.push(batch);
        // Later pushes are silently dropped too.
        writer.push(create_test_batch(vec![4]));
        drop(writer);

        assert!(!cache.try_read(&key).has_result());
        assert!(!cache.contains(&key));
        assert_eq!(cache.stats().discarded_writes(), 1);
    }

    #[test]
    fn test_mismatched_batch_header_discards_write() {
        let cache = QueryResultCache::new(CacheConfig::default());
        let key = test_key(1);

        let mut writer = cache.try_put(key.clone());
        let schema = Arc::new(Schema::new(vec![Field::new("other", DataType::Utf8, false)]));
        let array = Arc::new(arrow::array::StringArray::from(vec!["x"]));
        writer.push(RecordBatch::try_new(schema, vec![array]).unwrap());
        drop(writer);

        assert!(!cache.try_read(&key).has_result());
        assert!(!cache.contains(&key));
        assert_eq!(cache.stats().discarded_writes(), 1);
    }

    #[test]
    fn test_cancel_discards_partial_result() {
        let cache = QueryResultCache::new(CacheConfig::default());
        let key = test_key(1);

        let mut writer = cache.try_put(key.clone());
        writer.push(create_test_batch(vec![1]));
        writer.cancel();
        drop(writer);

        assert!(!cache.try_read(&key).has_result());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_empty_result_is_cacheable() {
        let cache = QueryResultCache::new(CacheConfig::default());
        let key = test_key(1);

        drop(cache.try_put(key.clone()));

        let mut reader = cache.try_read(&key);
        assert!(reader.has_result());
        let mut source = reader.take_source().unwrap();
        assert_eq!(source.row_count(), 0);
        assert_eq!(drain(&mut source), Vec::<i64>::new());
    }

    #[test]
    fn test_lru_eviction_under_weight_pressure() {
        let batch_size = batch_allocated_bytes(&create_test_batch(vec![0]));
        let cache = QueryResultCache::new(
            CacheConfig::default()
                .with_max_bytes(batch_size * 10)
                .with_max_entry_size(batch_size),
        );

        for n in 0..10 {
            let mut writer = cache.try_put(test_key(n));
            writer.push(create_test_batch(vec![n as i64]));
        }
        assert_eq!(cache.len(), 10);

        // Touch everything but key 0 so it is least recent.
        for n in 1..10 {
            assert!(cache.try_read(&test_key(n)).has_result());
        }

        let mut writer = cache.try_put(test_key(10));
        writer.push(create_test_batch(vec![10]));
        drop(writer);

        assert_eq!(cache.len(), 10);
        assert!(!cache.contains(&test_key(0)));
        for n in 1..=10 {
            assert!(cache.contains(&test_key(n)));
        }
        assert_eq!(cache.stats().evictions(), 1);
    }

    #[test]
    fn test_timed_eviction() {
        let cache = QueryResultCache::new(
            CacheConfig::default().with_entry_put_timeout(Duration::from_millis(50)),
        );
        let key = test_key(1);

        let mut writer = cache.try_put(key.clone());
        writer.push(create_test_batch(vec![1]));
        drop(writer);
        assert!(cache.try_read(&key).has_result());

        thread::sleep(Duration::from_millis(200));
        assert!(!cache.try_read(&key).has_result());
        assert_eq!(cache.stats().expirations(), 1);
    }

    #[test]
    fn test_taken_source_survives_reset() {
        let cache = QueryResultCache::new(CacheConfig::default());
        let key = test_key(1);

        let mut writer = cache.try_put(key.clone());
        writer.push(create_test_batch(vec![1, 2, 3]));
        drop(writer);

        let mut reader = cache.try_read(&key);
        let mut source = reader.take_source().unwrap();

        cache.reset();
        assert_eq!(cache.len(), 0);
        assert_eq!(drain(&mut source), vec![1, 2, 3]);
    }

    #[test]
    fn test_reset_misses_every_key() {
        let cache = QueryResultCache::new(CacheConfig::default());
        for n in 0..3 {
            let mut writer = cache.try_put(test_key(n));
            writer.push(create_test_batch(vec![n as i64]));
        }
        cache.reset();
        for n in 0..3 {
            assert!(!cache.try_read(&test_key(n)).has_result());
        }
    }

    #[test]
    fn test_record_run_is_monotonic_and_survives_reset() {
        let cache = QueryResultCache::new(CacheConfig::default());
        let key = test_key(1);

        assert_eq!(cache.record_run(&key), 1);
        assert_eq!(cache.record_run(&key), 2);
        cache.reset();
        assert_eq!(cache.record_run(&key), 3);

        // Counters are per key.
        assert_eq!(cache.record_run(&test_key(2)), 1);
    }

    #[test]
    fn test_hit_after_gated_executions() {
        let cache =
            QueryResultCache::new(CacheConfig::default().with_min_executions(2));
        let key = test_key(1);

        // First run: below the gate, execute and discard.
        let runs = cache.record_run(&key);
        assert!(!cache.worth_caching(runs));

        // Second run: gate met, cache the result.
        let runs = cache.record_run(&key);
        assert!(cache.worth_caching(runs));
        let mut writer = cache.try_put(key.clone());
        writer.push(create_test_batch(vec![1, 2]));
        writer.push(create_test_batch(vec![3]));
        drop(writer);

        // Third run short-circuits execution.
        let mut reader = cache.try_read(&key);
        assert!(reader.has_result());
        let mut source = reader.take_source().unwrap();
        assert_eq!(drain(&mut source), vec![1, 2, 3]);
    }

    #[test]
    fn test_disabled_cache() {
        let cache = QueryResultCache::new(CacheConfig::disabled());
        let key = test_key(1);

        let mut writer = cache.try_put(key.clone());
        assert!(!writer.is_owner());
        writer.push(create_test_batch(vec![1]));
        drop(writer);

        assert!(!cache.try_read(&key).has_result());
        assert!(!cache.contains(&key));
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_memory_accounting() {
        let cache = QueryResultCache::with_max_bytes(1024 * 1024);
        let key = test_key(1);
        assert_eq!(cache.memory_used(), 0);

        let batch = create_test_batch(vec![1, 2, 3]);
        let expected = batch_allocated_bytes(&batch);
        let mut writer = cache.try_put(key.clone());
        writer.push(batch);
        drop(writer);

        assert_eq!(cache.memory_used(), expected);
        cache.reset();
        assert_eq!(cache.memory_used(), 0);
    }
}
