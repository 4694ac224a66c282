//! Bundle cache store over a pluggable storage backend
//!
//! Every operation is best-effort. A storage failure on one entry is logged,
//! counted, and treated as a miss; it never aborts the surrounding request.
//! Concurrent writers are not serialized: a slower `fill` may overwrite a
//! faster one for the same id, which is harmless because an id's content is
//! immutable within a generation.

use crate::cache::{
    config::CacheConfig,
    entry::CacheEntry,
    generation::CacheGeneration,
    invalidation::{InvalidationEvent, InvalidationPolicy, InvalidationReason},
    storage::{CacheStorage, NamedCache},
    types::{system_clock, CacheKey, CacheStats, CacheableChunk, Clock, EpochMillis},
};
use crate::error::Result;
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Versioned, TTL-bound store of individual bundle bodies
pub struct BundleCache {
    config: CacheConfig,
    generation: CacheGeneration,
    storage: Arc<dyn CacheStorage>,
    clock: Clock,
    stats: RwLock<CacheStats>,
}

impl BundleCache {
    /// Create a cache over `storage` for the generation described by `config`
    pub fn new(config: CacheConfig, storage: Arc<dyn CacheStorage>) -> Result<Self> {
        config.validate()?;
        let generation = config.generation();

        info!(
            "Initializing bundle cache {} on {} storage",
            generation,
            storage.backend_name()
        );

        Ok(Self {
            config,
            generation,
            storage,
            clock: system_clock(),
            stats: RwLock::new(CacheStats::default()),
        })
    }

    /// Replace the time source
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn generation(&self) -> &CacheGeneration {
        &self.generation
    }

    /// Canonical single-bundle URL used as the storage key for `id`
    pub fn key_for(&self, id: &str) -> CacheKey {
        format!("{}/{}/{}", self.config.scope, self.config.namespace, id)
    }

    /// Inverse of [`key_for`](Self::key_for)
    pub fn id_for_key<'a>(&self, key: &'a str) -> Option<&'a str> {
        key.strip_prefix(self.config.scope.as_str())?
            .strip_prefix('/')?
            .strip_prefix(self.config.namespace.as_str())?
            .strip_prefix('/')
    }

    fn now(&self) -> EpochMillis {
        (self.clock)()
    }

    async fn open(&self) -> Result<Arc<dyn NamedCache>> {
        self.storage.open(&self.generation.name()).await
    }

    /// Look up `ids` without modifying anything.
    ///
    /// Absent ids, and ids whose lookup failed, are missing from the map.
    pub async fn read(&self, ids: &[String]) -> HashMap<String, CacheEntry> {
        let unique: Vec<&String> = {
            let mut seen = HashSet::new();
            ids.iter().filter(|id| seen.insert(id.as_str())).collect()
        };

        let cache = match self.open().await {
            Ok(cache) => cache,
            Err(e) => {
                warn!("Cache {} unavailable, treating all as misses: {}", self.generation, e);
                let mut stats = self.stats.write().await;
                stats.errors += 1;
                stats.misses += unique.len() as u64;
                return HashMap::new();
            }
        };

        let lookups = unique.iter().map(|id| {
            let cache = cache.clone();
            let key = self.key_for(id);
            async move { (id, cache.match_key(&key).await) }
        });

        let mut found = HashMap::new();
        let mut errors = 0u64;
        for (id, result) in join_all(lookups).await {
            match result {
                Ok(Some(stored)) => {
                    found.insert(id.to_string(), CacheEntry::from_stored(id.as_str(), stored));
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("Cache read failed for {}: {}", id, e);
                    errors += 1;
                }
            }
        }

        let mut stats = self.stats.write().await;
        stats.hits += found.len() as u64;
        stats.misses += (unique.len() - found.len()) as u64;
        stats.errors += errors;

        debug!("Cache read: {} of {} ids present", found.len(), unique.len());
        found
    }

    /// Store every cacheable chunk, stamping it with the current time.
    ///
    /// Existing entries at the same id are overwritten. Returns the number of
    /// entries written.
    pub async fn fill<C>(&self, chunks: &[C]) -> usize
    where
        C: CacheableChunk + Sync,
    {
        let cacheable: Vec<&C> = chunks.iter().filter(|c| c.cacheable()).collect();
        let skipped = (chunks.len() - cacheable.len()) as u64;

        if cacheable.is_empty() {
            self.stats.write().await.skipped += skipped;
            return 0;
        }

        let cache = match self.open().await {
            Ok(cache) => cache,
            Err(e) => {
                warn!("Cache {} unavailable, dropping fill: {}", self.generation, e);
                self.stats.write().await.errors += 1;
                return 0;
            }
        };

        let now = self.now();
        let writes = cacheable.iter().map(|chunk| {
            let cache = cache.clone();
            let key = self.key_for(chunk.id());
            let stored = CacheEntry::new(chunk.id(), chunk.body(), now).into_stored();
            let id = chunk.id().to_string();
            async move { (id, cache.put(&key, stored).await) }
        });

        let mut written = 0usize;
        let mut errors = 0u64;
        for (id, result) in join_all(writes).await {
            match result {
                Ok(()) => written += 1,
                Err(e) => {
                    warn!("Cache write failed for {}: {}", id, e);
                    errors += 1;
                }
            }
        }

        let mut stats = self.stats.write().await;
        stats.fills += written as u64;
        stats.skipped += skipped;
        stats.errors += errors;

        debug!("Cache fill: stored {} chunks, skipped {}", written, skipped);
        written
    }

    /// Refresh the hit timestamp of entries reused without a re-fetch.
    ///
    /// Bodies are left untouched; ids no longer present are ignored.
    pub async fn hit(&self, ids: &[String]) -> usize {
        let cache = match self.open().await {
            Ok(cache) => cache,
            Err(e) => {
                warn!("Cache {} unavailable, dropping hit: {}", self.generation, e);
                self.stats.write().await.errors += 1;
                return 0;
            }
        };

        let now = self.now();
        let unique: HashSet<&String> = ids.iter().collect();
        let updates = unique.into_iter().map(|id| {
            let cache = cache.clone();
            let key = self.key_for(id);
            async move { refresh(cache.as_ref(), &key, id, now).await }
        });

        let mut refreshed = 0usize;
        let mut errors = 0u64;
        for result in join_all(updates).await {
            match result {
                Ok(true) => refreshed += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!("Cache hit update failed: {}", e);
                    errors += 1;
                }
            }
        }

        let mut stats = self.stats.write().await;
        stats.refreshed += refreshed as u64;
        stats.errors += errors;
        refreshed
    }

    /// Drop entries in the active generation that were not hit within `ttl`
    /// or carry no timestamp.
    pub async fn invalidate(&self, ttl: Duration) -> Result<Vec<InvalidationEvent>> {
        let cache = self.open().await?;
        let policy = InvalidationPolicy::new(ttl);
        let now = self.now();

        let mut removed: HashMap<InvalidationReason, Vec<String>> = HashMap::new();
        let mut errors = 0u64;

        for key in cache.keys().await? {
            let stored = match cache.match_key(&key).await {
                Ok(Some(stored)) => stored,
                Ok(None) => continue,
                Err(e) => {
                    warn!("Skipping unreadable cache entry {}: {}", key, e);
                    errors += 1;
                    continue;
                }
            };

            let id = self.id_for_key(&key).unwrap_or(&key).to_string();
            let entry = CacheEntry::from_stored(id, stored);

            if let Some(reason) = policy.should_invalidate(&entry, now) {
                match cache.delete(&key).await {
                    Ok(_) => removed.entry(reason).or_default().push(key),
                    Err(e) => {
                        warn!("Failed to evict {}: {}", key, e);
                        errors += 1;
                    }
                }
            }
        }

        let total: usize = removed.values().map(Vec::len).sum();
        {
            let mut stats = self.stats.write().await;
            stats.evictions_ttl += total as u64;
            stats.errors += errors;
        }

        if total > 0 {
            info!("Invalidated {} idle entries from {}", total, self.generation);
        }

        Ok(removed
            .into_iter()
            .map(|(reason, keys)| {
                let context = format!("Removed {} entries (ttl {:?})", keys.len(), ttl);
                InvalidationEvent::new(reason, keys).with_context(context)
            })
            .collect())
    }

    /// Delete caches of the same namespace and content kind but another version
    pub async fn clean(&self) -> Result<Vec<InvalidationEvent>> {
        let mut events = Vec::new();

        for name in self.storage.keys().await? {
            let Ok(other) = name.parse::<CacheGeneration>() else {
                continue;
            };
            if !self.generation.supersedes(&other) {
                continue;
            }

            match self.storage.delete(&name).await {
                Ok(true) => {
                    info!("Removed superseded cache generation {}", name);
                    events.push(InvalidationEvent::new(
                        InvalidationReason::Superseded {
                            generation: name.clone(),
                        },
                        vec![name],
                    ));
                }
                Ok(false) => {}
                Err(e) => warn!("Failed to remove cache generation {}: {}", name, e),
            }
        }

        self.stats.write().await.generations_removed += events.len() as u64;
        Ok(events)
    }

    /// `clean` followed by `invalidate` with the configured TTL
    pub async fn maintain(&self) -> Result<Vec<InvalidationEvent>> {
        let mut events = self.clean().await?;
        events.extend(self.invalidate(self.config.ttl).await?);
        Ok(events)
    }

    /// Get cache statistics
    pub async fn stats(&self) -> CacheStats {
        self.stats.read().await.clone()
    }
}

async fn refresh(cache: &dyn NamedCache, key: &str, id: &str, now: EpochMillis) -> Result<bool> {
    let Some(stored) = cache.match_key(key).await? else {
        return Ok(false);
    };
    let mut entry = CacheEntry::from_stored(id, stored);
    entry.mark_hit(now);
    cache.put(key, entry.into_stored()).await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::storage::{MemoryStorage, StoredResponse};
    use std::sync::atomic::{AtomicI64, Ordering};

    struct Chunk {
        id: &'static str,
        body: &'static str,
        cacheable: bool,
    }

    impl CacheableChunk for Chunk {
        fn id(&self) -> &str {
            self.id
        }
        fn body(&self) -> &str {
            self.body
        }
        fn cacheable(&self) -> bool {
            self.cacheable
        }
    }

    fn manual_clock(start: i64) -> (Arc<AtomicI64>, Clock) {
        let now = Arc::new(AtomicI64::new(start));
        let handle = now.clone();
        (now, Arc::new(move || handle.load(Ordering::SeqCst)))
    }

    fn cache_with_clock(start: i64) -> (Arc<AtomicI64>, Arc<MemoryStorage>, BundleCache) {
        let storage = Arc::new(MemoryStorage::new());
        let (now, clock) = manual_clock(start);
        let cache = BundleCache::new(CacheConfig::default(), storage.clone())
            .unwrap()
            .with_clock(clock);
        (now, storage, cache)
    }

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[tokio::test]
    async fn test_fill_then_read() {
        let (_, _, cache) = cache_with_clock(1_000);

        let written = cache
            .fill(&[
                Chunk { id: "foo@1.0.0", body: "foo()", cacheable: true },
                Chunk { id: "bar@1.0.0", body: "missing", cacheable: false },
            ])
            .await;
        assert_eq!(written, 1);

        let found = cache.read(&ids(&["foo@1.0.0", "bar@1.0.0"])).await;
        assert_eq!(found.len(), 1);
        let foo = &found["foo@1.0.0"];
        assert_eq!(foo.body, "foo()");
        assert_eq!(foo.last_hit_epoch, Some(1_000));

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.skipped, 1);
    }

    #[tokio::test]
    async fn test_fill_overwrites() {
        let (_, _, cache) = cache_with_clock(1);
        cache.fill(&[Chunk { id: "a", body: "one", cacheable: true }]).await;
        cache.fill(&[Chunk { id: "a", body: "two", cacheable: true }]).await;

        let found = cache.read(&ids(&["a"])).await;
        assert_eq!(found["a"].body, "two");
    }

    #[tokio::test]
    async fn test_hit_refreshes_timestamp_only() {
        let (now, _, cache) = cache_with_clock(1_000);
        cache.fill(&[Chunk { id: "a", body: "body", cacheable: true }]).await;

        now.store(5_000, Ordering::SeqCst);
        assert_eq!(cache.hit(&ids(&["a", "absent"])).await, 1);

        let found = cache.read(&ids(&["a"])).await;
        assert_eq!(found["a"].body, "body");
        assert_eq!(found["a"].last_hit_epoch, Some(5_000));
    }

    #[tokio::test]
    async fn test_invalidate_respects_ttl_boundary() {
        let ttl = Duration::from_secs(60);
        let (now, _, cache) = cache_with_clock(100_000);
        cache.fill(&[Chunk { id: "a", body: "x", cacheable: true }]).await;

        now.store(100_000 + 60_000 - 1, Ordering::SeqCst);
        assert!(cache.invalidate(ttl).await.unwrap().is_empty());
        assert_eq!(cache.read(&ids(&["a"])).await.len(), 1);

        now.store(100_000 + 60_000 + 1, Ordering::SeqCst);
        let events = cache.invalidate(ttl).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].reason, InvalidationReason::Expired);
        assert!(cache.read(&ids(&["a"])).await.is_empty());
    }

    #[tokio::test]
    async fn test_invalidate_drops_untracked_entries() {
        let (_, storage, cache) = cache_with_clock(0);
        let raw = storage.open(&cache.generation().name()).await.unwrap();
        raw.put(&cache.key_for("legacy"), StoredResponse::new("old"))
            .await
            .unwrap();

        let events = cache.invalidate(Duration::from_secs(3600)).await.unwrap();
        assert_eq!(events[0].reason, InvalidationReason::Untracked);
        assert!(raw.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clean_removes_only_superseded_generations() {
        let (_, storage, cache) = cache_with_clock(0);
        storage.open("stitch@text/javascript@old").await.unwrap();
        storage.open("stitch@text/css@old").await.unwrap();
        storage.open("unrelated").await.unwrap();
        storage.open(&cache.generation().name()).await.unwrap();

        let events = cache.clean().await.unwrap();
        assert_eq!(events.len(), 1);

        let mut remaining = storage.keys().await.unwrap();
        remaining.sort();
        assert_eq!(
            remaining,
            ids(&["stitch@text/css@old", "stitch@text/javascript@0.0.0", "unrelated"])
        );
    }

    #[test]
    fn test_key_round_trip() {
        let storage = Arc::new(MemoryStorage::new());
        let cache = BundleCache::new(CacheConfig::default(), storage).unwrap();

        let key = cache.key_for("@scope/pkg@1.0.0");
        assert_eq!(key, "http://localhost/stitch/@scope/pkg@1.0.0");
        assert_eq!(cache.id_for_key(&key), Some("@scope/pkg@1.0.0"));
        assert_eq!(cache.id_for_key("http://elsewhere/stitch/x"), None);
    }
}
