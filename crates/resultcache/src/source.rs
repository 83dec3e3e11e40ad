//! Streamable sources backed by cached results.

use arrow::compute::concat_batches;
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use resultcache_core::{QueryError, Result, Schema};

/// A pipeline-compatible producer of batches. On a cache hit one of these is
/// substituted for the execution subtree that originally produced the
/// result.
#[async_trait]
pub trait BatchSource: Send {
    /// Get the next batch, `None` once the source is exhausted.
    async fn next_batch(&mut self) -> Option<Result<RecordBatch>>;

    fn is_exhausted(&self) -> bool;

    /// Header of the batches this source emits.
    fn schema(&self) -> SchemaRef;
}

/// Streams a cached result as a single consolidated batch.
///
/// The source owns a snapshot of the entry's batches, so evicting or
/// resetting the cache after the source was taken does not invalidate it.
/// Its schema is the one the result was keyed under.
pub struct CachedSource {
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
    exhausted: bool,
}

impl CachedSource {
    pub(crate) fn new(schema: SchemaRef, batches: Vec<RecordBatch>) -> Self {
        let exhausted = batches.is_empty();
        Self {
            schema,
            batches,
            exhausted,
        }
    }

    /// Total number of rows this source will emit.
    pub fn row_count(&self) -> usize {
        self.batches.iter().map(|b| b.num_rows()).sum()
    }

    fn consolidate(&self) -> Result<RecordBatch> {
        for batch in &self.batches {
            if batch.schema() != self.schema {
                return Err(QueryError::SchemaMismatch {
                    expected: Schema::from_arrow(&self.schema).describe(),
                    found: Schema::from_arrow(&batch.schema()).describe(),
                });
            }
        }
        Ok(concat_batches(&self.schema, &self.batches)?)
    }
}

#[async_trait]
impl BatchSource for CachedSource {
    async fn next_batch(&mut self) -> Option<Result<RecordBatch>> {
        if self.exhausted {
            return None;
        }
        self.exhausted = true;
        Some(self.consolidate())
    }

    fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }
}
