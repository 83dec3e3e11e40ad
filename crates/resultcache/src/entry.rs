//! A cached query result while and after it is written.

use arrow::record_batch::RecordBatch;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Approximate allocated size of a batch: the sum of its columns' buffer
/// allocations.
pub fn batch_allocated_bytes(batch: &RecordBatch) -> usize {
    batch
        .columns()
        .iter()
        .map(|col| col.get_array_memory_size())
        .sum()
}

/// One cached result: an ordered batch list plus a flag marking whether a
/// writer is still populating it.
///
/// An entry starts empty with `writing = true`. Exactly one writer appends
/// batches and flips the flag once at completion; the batches are never
/// mutated afterwards. Readers that observe `writing = true` must treat the
/// entry as absent.
#[derive(Debug)]
pub struct CacheEntry {
    batches: Mutex<Vec<RecordBatch>>,
    size_bytes: AtomicUsize,
    writing: AtomicBool,
}

impl CacheEntry {
    pub(crate) fn new_writing() -> Self {
        Self {
            batches: Mutex::new(Vec::new()),
            size_bytes: AtomicUsize::new(0),
            writing: AtomicBool::new(true),
        }
    }

    /// Whether a writer is still populating this entry. Pairs with the
    /// release store in [`finish_writing`](Self::finish_writing): observing
    /// `false` here also makes every batch appended before the writer's
    /// release visible.
    pub fn is_writing(&self) -> bool {
        self.writing.load(Ordering::Acquire)
    }

    pub fn size_bytes(&self) -> usize {
        self.size_bytes.load(Ordering::Relaxed)
    }

    pub fn batch_count(&self) -> usize {
        self.batches.lock().len()
    }

    /// Appends a batch and returns the entry's new total size in bytes.
    pub(crate) fn push(&self, batch: RecordBatch) -> usize {
        let added = batch_allocated_bytes(&batch);
        self.batches.lock().push(batch);
        self.size_bytes.fetch_add(added, Ordering::Relaxed) + added
    }

    /// Drops all appended batches. Used when a write is cancelled or crosses
    /// the per-entry size limit.
    pub(crate) fn discard_batches(&self) {
        self.batches.lock().clear();
        self.size_bytes.store(0, Ordering::Relaxed);
    }

    /// Marks the write complete and the entry readable.
    pub(crate) fn finish_writing(&self) {
        self.writing.store(false, Ordering::Release);
    }

    /// Clones the batch list. Batch clones share their column buffers, so a
    /// snapshot keeps the rows alive independently of this entry.
    pub(crate) fn snapshot(&self) -> Vec<RecordBatch> {
        self.batches.lock().clone()
    }
}
