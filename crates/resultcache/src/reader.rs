//! Scoped reader for one cached result.

use crate::source::CachedSource;
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;

/// Read handle produced by `QueryResultCache::try_read`.
///
/// A hit requires the entry to exist with its write completed; an entry
/// still being written reads as a miss, without retrying or waiting. The
/// handle is one-shot: [`take_source`](Self::take_source) moves the source
/// out, and the source remains valid after both the handle and the cache
/// entry are gone.
pub struct CacheReader {
    source: Option<CachedSource>,
}

impl CacheReader {
    pub(crate) fn hit(schema: SchemaRef, batches: Vec<RecordBatch>) -> Self {
        Self {
            source: Some(CachedSource::new(schema, batches)),
        }
    }

    pub(crate) fn miss() -> Self {
        Self { source: None }
    }

    pub fn has_result(&self) -> bool {
        self.source.is_some()
    }

    /// Moves the streamable source out of the handle.
    pub fn take_source(&mut self) -> Option<CachedSource> {
        self.source.take()
    }
}
