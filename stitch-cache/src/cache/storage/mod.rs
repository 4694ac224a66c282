//! Persistent key/value storage boundary.
//!
//! The cache store only needs `open/match/put/delete/keys` semantics over
//! named collections of text responses keyed by URL-like strings. Backends
//! decide where bytes live.

mod filesystem;
mod memory;

pub use filesystem::FsStorage;
pub use memory::MemoryStorage;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A stored bundle response: body text plus string headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StoredResponse {
    pub body: String,

    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl StoredResponse {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            headers: BTreeMap::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

/// Collection of named caches.
#[async_trait]
pub trait CacheStorage: Send + Sync + 'static {
    /// Open a named cache, creating it when absent.
    async fn open(&self, name: &str) -> Result<Arc<dyn NamedCache>>;

    /// Names of every cache currently held.
    async fn keys(&self) -> Result<Vec<String>>;

    /// Delete a named cache and all of its entries.
    async fn delete(&self, name: &str) -> Result<bool>;

    /// Static identifier for logging.
    fn backend_name(&self) -> &'static str;
}

/// One opened cache.
#[async_trait]
pub trait NamedCache: Send + Sync {
    async fn match_key(&self, key: &str) -> Result<Option<StoredResponse>>;

    /// Store a response, replacing any previous one at `key`.
    async fn put(&self, key: &str, response: StoredResponse) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<bool>;

    async fn keys(&self) -> Result<Vec<String>>;
}
