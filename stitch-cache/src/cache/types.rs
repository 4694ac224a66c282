//! Core type definitions for the cache system

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Cache key type - the canonical single-bundle URL of an entry
pub type CacheKey = String;

/// Milliseconds since the Unix epoch
pub type EpochMillis = i64;

/// Header carrying the last-hit timestamp of a stored response
pub const HIT_HEADER: &str = "stitch-hit";

/// Source of the current time for staleness decisions
pub type Clock = Arc<dyn Fn() -> EpochMillis + Send + Sync>;

/// Wall clock backed by `chrono::Utc`
pub fn system_clock() -> Clock {
    Arc::new(|| chrono::Utc::now().timestamp_millis())
}

/// A bundle chunk that can be offered to [`BundleCache::fill`].
///
/// Only chunks reporting `cacheable() == true` are persisted.
///
/// [`BundleCache::fill`]: crate::cache::BundleCache::fill
pub trait CacheableChunk {
    /// Canonical bundle id (`name@version`)
    fn id(&self) -> &str;

    /// Body text without framing
    fn body(&self) -> &str;

    /// Whether production succeeded with real content
    fn cacheable(&self) -> bool;
}

/// Statistics for cache activity within one process
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CacheStats {
    /// Ids found during `read`
    pub hits: u64,

    /// Ids absent during `read`
    pub misses: u64,

    /// Entries written by `fill`
    pub fills: u64,

    /// Chunks offered to `fill` but skipped as non-cacheable
    pub skipped: u64,

    /// Entries whose hit timestamp was refreshed by `hit`
    pub refreshed: u64,

    /// Entries removed by `invalidate`
    pub evictions_ttl: u64,

    /// Superseded generations removed by `clean`
    pub generations_removed: u64,

    /// Per-entry storage failures that were treated as misses
    pub errors: u64,
}

impl CacheStats {
    /// Calculate cache hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Cache stats: hits {}, misses {} ({:.1}% hit rate), fills {}, refreshed {}, evicted {}, errors {}",
            self.hits,
            self.misses,
            self.hit_rate(),
            self.fills,
            self.refreshed,
            self.evictions_ttl,
            self.errors
        )
    }
}
