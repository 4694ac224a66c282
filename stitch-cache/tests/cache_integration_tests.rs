//! Integration tests for the cache module
//!
//! These tests verify the complete cache lifecycle including:
//! - Fill, read and hit against both storage backends
//! - Idle expiry around the TTL boundary
//! - Generation cleanup after a version bump
//! - Persistence across process restarts (filesystem backend)

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use stitch_cache::{
    BundleCache, CacheConfig, CacheError, CacheStorage, CacheableChunk, Clock, FsStorage,
    InvalidationReason, MemoryStorage, NamedCache, StoredResponse,
};
use tempfile::TempDir;

struct Bundle {
    id: String,
    body: String,
    cacheable: bool,
}

impl Bundle {
    fn ok(id: &str, body: &str) -> Self {
        Self {
            id: id.to_string(),
            body: body.to_string(),
            cacheable: true,
        }
    }

    fn failed(id: &str) -> Self {
        Self {
            id: id.to_string(),
            body: format!("console.warn('{} missing')", id),
            cacheable: false,
        }
    }
}

impl CacheableChunk for Bundle {
    fn id(&self) -> &str {
        &self.id
    }

    fn body(&self) -> &str {
        &self.body
    }

    fn cacheable(&self) -> bool {
        self.cacheable
    }
}

struct ManualClock(Arc<AtomicI64>);

impl ManualClock {
    fn new(start: i64) -> Self {
        Self(Arc::new(AtomicI64::new(start)))
    }

    fn clock(&self) -> Clock {
        let now = self.0.clone();
        Arc::new(move || now.load(Ordering::SeqCst))
    }

    fn set(&self, value: i64) {
        self.0.store(value, Ordering::SeqCst);
    }
}

/// Memory storage whose entries fail to read or write once poisoned
#[derive(Default)]
struct FlakyStorage {
    inner: MemoryStorage,
    poisoned: Arc<Mutex<HashSet<String>>>,
}

impl FlakyStorage {
    fn poison(&self, id: &str) {
        self.poisoned.lock().unwrap().insert(format!("/{}", id));
    }
}

struct FlakyCache {
    inner: Arc<dyn NamedCache>,
    poisoned: Arc<Mutex<HashSet<String>>>,
}

impl FlakyCache {
    fn check(&self, key: &str) -> stitch_cache::Result<()> {
        let poisoned = self.poisoned.lock().unwrap();
        if poisoned.iter().any(|suffix| key.ends_with(suffix.as_str())) {
            return Err(CacheError::Other(format!("disk error at {}", key)));
        }
        Ok(())
    }
}

#[async_trait]
impl CacheStorage for FlakyStorage {
    async fn open(&self, name: &str) -> stitch_cache::Result<Arc<dyn NamedCache>> {
        Ok(Arc::new(FlakyCache {
            inner: self.inner.open(name).await?,
            poisoned: self.poisoned.clone(),
        }))
    }

    async fn keys(&self) -> stitch_cache::Result<Vec<String>> {
        self.inner.keys().await
    }

    async fn delete(&self, name: &str) -> stitch_cache::Result<bool> {
        self.inner.delete(name).await
    }

    fn backend_name(&self) -> &'static str {
        "flaky"
    }
}

#[async_trait]
impl NamedCache for FlakyCache {
    async fn match_key(&self, key: &str) -> stitch_cache::Result<Option<StoredResponse>> {
        self.check(key)?;
        self.inner.match_key(key).await
    }

    async fn put(&self, key: &str, response: StoredResponse) -> stitch_cache::Result<()> {
        self.check(key)?;
        self.inner.put(key, response).await
    }

    async fn delete(&self, key: &str) -> stitch_cache::Result<bool> {
        self.inner.delete(key).await
    }

    async fn keys(&self) -> stitch_cache::Result<Vec<String>> {
        self.inner.keys().await
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn config(version: &str, ttl: Duration) -> CacheConfig {
    CacheConfig::builder()
        .namespace("stitch")
        .content_kind("text/javascript")
        .version(version)
        .scope("https://app.example.com/")
        .ttl(ttl)
        .build()
}

#[tokio::test]
async fn test_partial_hit_after_fill() {
    let storage = Arc::new(MemoryStorage::new());
    let cache = BundleCache::new(config("1", Duration::from_secs(60)), storage).unwrap();

    cache
        .fill(&[Bundle::ok("foo@1.0.0", "foo()"), Bundle::failed("baz@0.1.0")])
        .await;

    let found = cache
        .read(&ids(&["foo@1.0.0", "bar@2.2.9", "baz@0.1.0"]))
        .await;

    assert_eq!(found.len(), 1);
    assert_eq!(found["foo@1.0.0"].body, "foo()");

    let stats = cache.stats().await;
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 2);
    assert_eq!(stats.fills, 1);
    assert_eq!(stats.skipped, 1);
}

#[tokio::test]
async fn test_hit_keeps_entry_alive_past_original_ttl() {
    let ttl = Duration::from_secs(10);
    let clock = ManualClock::new(1_000_000);
    let storage = Arc::new(MemoryStorage::new());
    let cache = BundleCache::new(config("1", ttl), storage)
        .unwrap()
        .with_clock(clock.clock());

    cache.fill(&[Bundle::ok("a@1", "a"), Bundle::ok("b@1", "b")]).await;

    // Only `a` is reused
    clock.set(1_008_000);
    cache.hit(&ids(&["a@1"])).await;

    clock.set(1_015_000);
    let events = cache.invalidate(ttl).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].reason, InvalidationReason::Expired);
    assert_eq!(events[0].keys, vec!["https://app.example.com/stitch/b@1".to_string()]);

    let found = cache.read(&ids(&["a@1", "b@1"])).await;
    assert!(found.contains_key("a@1"));
    assert!(!found.contains_key("b@1"));
}

#[tokio::test]
async fn test_ttl_boundary() {
    let ttl = Duration::from_secs(30);
    let clock = ManualClock::new(50_000);
    let cache = BundleCache::new(config("1", ttl), Arc::new(MemoryStorage::new()))
        .unwrap()
        .with_clock(clock.clock());

    cache.fill(&[Bundle::ok("x@1", "x")]).await;

    clock.set(50_000 + 30_000 - 5);
    cache.invalidate(ttl).await.unwrap();
    assert_eq!(cache.read(&ids(&["x@1"])).await.len(), 1);

    clock.set(50_000 + 30_000 + 5);
    cache.invalidate(ttl).await.unwrap();
    assert!(cache.read(&ids(&["x@1"])).await.is_empty());
}

#[tokio::test]
async fn test_version_bump_discards_old_generation() {
    init_tracing();
    let storage: Arc<dyn CacheStorage> = Arc::new(MemoryStorage::new());
    let ttl = Duration::from_secs(3600);

    let old = BundleCache::new(config("1", ttl), storage.clone()).unwrap();
    old.fill(&[Bundle::ok("foo@1.0.0", "old")]).await;

    let new = BundleCache::new(config("2", ttl), storage.clone()).unwrap();
    assert!(new.read(&ids(&["foo@1.0.0"])).await.is_empty());

    let events = new.maintain().await.unwrap();
    assert!(events.iter().any(|e| matches!(
        &e.reason,
        InvalidationReason::Superseded { generation } if generation == "stitch@text/javascript@1"
    )));

    let names = storage.keys().await.unwrap();
    assert_eq!(names, vec!["stitch@text/javascript@2".to_string()]);
    assert_eq!(new.stats().await.generations_removed, 1);
}

#[tokio::test]
async fn test_filesystem_cache_survives_restart() {
    init_tracing();
    let tmp = TempDir::new().unwrap();
    let ttl = Duration::from_secs(3600);

    {
        let storage = FsStorage::new(tmp.path()).await.unwrap();
        let cache = BundleCache::new(config("1", ttl), Arc::new(storage)).unwrap();
        assert_eq!(cache.fill(&[Bundle::ok("@scope/pkg@1.0.0", "scoped()")]).await, 1);
    }

    let storage = FsStorage::new(tmp.path()).await.unwrap();
    let cache = BundleCache::new(config("1", ttl), Arc::new(storage)).unwrap();

    let found = cache.read(&ids(&["@scope/pkg@1.0.0"])).await;
    assert_eq!(found["@scope/pkg@1.0.0"].body, "scoped()");
    assert!(found["@scope/pkg@1.0.0"].last_hit_epoch.is_some());
}

#[tokio::test]
async fn test_filesystem_clean_and_invalidate() {
    init_tracing();
    let tmp = TempDir::new().unwrap();
    let ttl = Duration::from_secs(1);
    let clock = ManualClock::new(10_000);

    let storage: Arc<dyn CacheStorage> = Arc::new(FsStorage::new(tmp.path()).await.unwrap());

    let old = BundleCache::new(config("1", ttl), storage.clone()).unwrap();
    old.fill(&[Bundle::ok("a@1", "a")]).await;

    let current = BundleCache::new(config("2", ttl), storage.clone())
        .unwrap()
        .with_clock(clock.clock());
    current.fill(&[Bundle::ok("b@1", "b")]).await;

    clock.set(20_000);
    let events = current.maintain().await.unwrap();
    assert_eq!(events.len(), 2);

    assert_eq!(
        storage.keys().await.unwrap(),
        vec!["stitch@text/javascript@2".to_string()]
    );
    assert!(current.read(&ids(&["b@1"])).await.is_empty());
}

#[tokio::test]
async fn test_entry_failures_are_isolated() {
    init_tracing();
    let storage = Arc::new(FlakyStorage::default());
    let cache = BundleCache::new(config("1", Duration::from_secs(60)), storage.clone()).unwrap();

    assert_eq!(cache.fill(&[Bundle::ok("a@1", "a"), Bundle::ok("b@1", "b")]).await, 2);

    storage.poison("b@1");
    storage.poison("c@1");

    // Unreadable entries are misses
    let found = cache.read(&ids(&["a@1", "b@1"])).await;
    assert_eq!(found.len(), 1);
    assert_eq!(found["a@1"].body, "a");
    assert!(!found.contains_key("b@1"));

    let stats = cache.stats().await;
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.errors, 1);

    // Writes land for healthy entries only
    assert_eq!(cache.fill(&[Bundle::ok("c@1", "c"), Bundle::ok("d@1", "d")]).await, 1);
    assert_eq!(cache.stats().await.errors, 2);
    assert!(cache.read(&ids(&["d@1"])).await.contains_key("d@1"));

    assert_eq!(cache.hit(&ids(&["a@1", "b@1"])).await, 1);
    let stats = cache.stats().await;
    assert_eq!(stats.errors, 3);
    assert_eq!(stats.fills, 3);
    assert_eq!(stats.refreshed, 1);
}

#[test]
fn test_invalid_config_is_rejected() {
    let bad = CacheConfig::builder().namespace("a/b").build();
    assert!(BundleCache::new(bad, Arc::new(MemoryStorage::new())).is_err());
}
