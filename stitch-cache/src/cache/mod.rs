//! # Bundle Cache
//!
//! Persistent, versioned store of individual bundle bodies keyed by their
//! canonical single-bundle URL.
//!
//! ## Features
//!
//! - **Generations**: one cache per `namespace@content-kind@version`; `clean`
//!   deletes every other version of the same logical cache
//! - **Idle expiry**: each entry carries a last-hit timestamp; `invalidate`
//!   drops entries not reused within the TTL
//! - **Pluggable storage**: in-memory or filesystem backends behind
//!   [`CacheStorage`]
//! - **Best effort**: storage failures are logged and treated as misses
//!
//! ## Example
//!
//! ```rust
//! use stitch_cache::cache::{BundleCache, CacheConfig, MemoryStorage};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = CacheConfig::builder()
//!     .namespace("stitch")
//!     .version("1.0.0")
//!     .ttl(Duration::from_secs(7 * 24 * 3600))
//!     .build();
//!
//! let cache = BundleCache::new(config, Arc::new(MemoryStorage::new()))?;
//!
//! let found = cache.read(&["foo@1.0.0".to_string()]).await;
//! if let Some(entry) = found.get("foo@1.0.0") {
//!     println!("Cache hit: {}", entry.body);
//! }
//!
//! cache.maintain().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod entry;
pub mod generation;
pub mod invalidation;
pub mod storage;
pub mod store;
pub mod types;

pub use config::{CacheConfig, CacheConfigBuilder};
pub use entry::CacheEntry;
pub use generation::CacheGeneration;
pub use invalidation::{InvalidationEvent, InvalidationPolicy, InvalidationReason};
pub use storage::{CacheStorage, FsStorage, MemoryStorage, NamedCache, StoredResponse};
pub use store::BundleCache;
pub use types::{system_clock, CacheKey, CacheStats, CacheableChunk, Clock, EpochMillis, HIT_HEADER};
