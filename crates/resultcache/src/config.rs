//! Cache configuration options.

use resultcache_core::ExecutionSettings;
use std::time::Duration;

/// Settings name for the residency duration, in milliseconds.
pub const SETTING_ENTRY_PUT_TIMEOUT: &str = "query_cache_entry_put_timeout";
/// Settings name for the per-entry byte ceiling.
pub const SETTING_MAX_ENTRY_SIZE: &str = "max_query_cache_entry_size";
/// Settings name for the caller-side caching gate.
pub const SETTING_MIN_EXECUTIONS: &str = "min_executions_before_caching";

/// Configuration for the query result cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum total weight of all entries, in bytes (approximate).
    pub max_bytes: usize,
    /// Per-entry byte ceiling; a write that crosses it is discarded.
    pub max_entry_size: usize,
    /// Residency: how long a completed entry stays before timed removal.
    pub entry_put_timeout: Duration,
    /// How many executions a query needs before callers cache it. Not
    /// enforced by the cache itself; see `QueryResultCache::record_run`.
    pub min_executions_before_caching: u64,
    /// Whether caching is enabled.
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_bytes: 100 * 1024 * 1024, // 100 MB
            max_entry_size: 1024 * 1024,  // 1 MB
            entry_put_timeout: Duration::from_secs(60),
            min_executions_before_caching: 0,
            enabled: true,
        }
    }
}

impl CacheConfig {
    /// Reads the cache-relevant knobs from execution settings, keeping the
    /// default for anything absent or unparsable.
    pub fn from_settings(settings: &ExecutionSettings) -> Self {
        let defaults = Self::default();
        Self {
            entry_put_timeout: settings
                .get_parsed(SETTING_ENTRY_PUT_TIMEOUT)
                .map(Duration::from_millis)
                .unwrap_or(defaults.entry_put_timeout),
            max_entry_size: settings
                .get_parsed(SETTING_MAX_ENTRY_SIZE)
                .unwrap_or(defaults.max_entry_size),
            min_executions_before_caching: settings
                .get_parsed(SETTING_MIN_EXECUTIONS)
                .unwrap_or(defaults.min_executions_before_caching),
            ..defaults
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn with_max_entry_size(mut self, max_entry_size: usize) -> Self {
        self.max_entry_size = max_entry_size;
        self
    }

    pub fn with_entry_put_timeout(mut self, entry_put_timeout: Duration) -> Self {
        self.entry_put_timeout = entry_put_timeout;
        self
    }

    pub fn with_min_executions(mut self, min_executions: u64) -> Self {
        self.min_executions_before_caching = min_executions;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}
