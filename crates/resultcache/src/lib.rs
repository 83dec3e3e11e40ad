//! In-memory query result cache
//!
//! This crate memoizes the materialized output of a query so repeated
//! executions can skip the execution subtree and stream the stored result
//! instead.
//!
//! # Features
//!
//! - **Fingerprint keys**: results are addressed by AST hash, output schema,
//!   execution settings, and optional user identity
//! - **Byte-bounded LRU**: total weight is capped; least recently used
//!   entries are evicted first
//! - **At-most-one writer**: concurrent writes to the same key collapse to a
//!   single owning writer, the rest become no-ops
//! - **Complete results only**: readers never observe an entry that is still
//!   being written
//! - **Timed eviction**: a background worker removes entries once their
//!   residency expires
//! - **Statistics**: hits, misses, evictions, expirations, discarded writes
//!
//! # Example
//!
//! ```ignore
//! use resultcache::{CacheConfig, QueryResultCache};
//!
//! let cache = QueryResultCache::new(CacheConfig::default());
//!
//! if cache.record_run(&key) >= cache.config().min_executions_before_caching {
//!     let mut writer = cache.try_put(key.clone());
//!     for batch in execute(&plan)? {
//!         writer.push(batch);
//!     }
//! } // dropping the writer publishes the entry
//!
//! let mut reader = cache.try_read(&key);
//! if let Some(source) = reader.take_source() {
//!     return pipeline.substitute(source);
//! }
//! ```

pub mod cache;
pub mod config;
pub mod entry;
pub mod fingerprint;
pub mod reader;
pub mod source;
pub mod stats;
pub mod writer;

mod scheduler;
mod store;

pub use cache::QueryResultCache;
pub use config::CacheConfig;
pub use entry::{batch_allocated_bytes, CacheEntry};
pub use fingerprint::QueryFingerprint;
pub use reader::CacheReader;
pub use source::{BatchSource, CachedSource};
pub use stats::CacheStats;
pub use writer::CacheWriter;
