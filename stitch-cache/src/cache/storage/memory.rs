//! Process-local storage backend.

use super::{CacheStorage, NamedCache, StoredResponse};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory storage. Contents vanish with the process.
#[derive(Default)]
pub struct MemoryStorage {
    caches: RwLock<HashMap<String, Arc<MemoryCache>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Default)]
struct MemoryCache {
    entries: RwLock<HashMap<String, StoredResponse>>,
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn open(&self, name: &str) -> Result<Arc<dyn NamedCache>> {
        if let Some(cache) = self.caches.read().await.get(name) {
            return Ok(cache.clone());
        }

        let mut caches = self.caches.write().await;
        let cache = caches
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryCache::default()))
            .clone();
        Ok(cache)
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.caches.read().await.keys().cloned().collect())
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        Ok(self.caches.write().await.remove(name).is_some())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[async_trait]
impl NamedCache for MemoryCache {
    async fn match_key(&self, key: &str) -> Result<Option<StoredResponse>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, response: StoredResponse) -> Result<()> {
        self.entries.write().await.insert(key.to_string(), response);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.entries.write().await.remove(key).is_some())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }
}
