//! # Stitch Cache (stitch-cache)
//!
//! Client-side cache for the stitch bundle protocol. Bundles fetched through
//! a concatenated response are stored one entry per bundle id, so later
//! requests only fetch what is not already cached.
//!
//! ```no_run
//! use stitch_cache::{BundleCache, CacheConfig, FsStorage};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let storage = FsStorage::new("/var/cache/stitch").await?;
//!     let cache = BundleCache::new(CacheConfig::default(), Arc::new(storage))?;
//!
//!     // Drop older generations and idle entries
//!     let events = cache.maintain().await?;
//!     println!("{} invalidation events", events.len());
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod error;

// Re-export main types for convenience
pub use cache::{
    BundleCache, CacheConfig, CacheConfigBuilder, CacheEntry, CacheGeneration, CacheKey,
    CacheStats, CacheStorage, CacheableChunk, Clock, EpochMillis, FsStorage, InvalidationEvent,
    InvalidationPolicy, InvalidationReason, MemoryStorage, NamedCache, StoredResponse,
};
pub use error::{CacheError, Result};
