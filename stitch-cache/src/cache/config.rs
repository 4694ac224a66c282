//! Configuration for the cache system

use crate::cache::generation::CacheGeneration;
use crate::error::{CacheError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the bundle cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// URL namespace segment the bundles are served under
    pub namespace: String,

    /// MIME type of the cached content
    pub content_kind: String,

    /// Cache generation version; bumping it discards older generations
    pub version: String,

    /// Origin every cache key is formatted against (scheme, host, port)
    pub scope: String,

    /// How long an entry may go without a hit before `invalidate` drops it
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            namespace: "stitch".to_string(),
            content_kind: "text/javascript".to_string(),
            version: "0.0.0".to_string(),
            scope: "http://localhost".to_string(),
            // 30 days
            ttl: Duration::from_secs(30 * 24 * 3600),
        }
    }
}

impl CacheConfig {
    /// Create a new builder for cache configuration
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.namespace.is_empty() || self.namespace.contains(['@', '/']) {
            return Err(CacheError::ConfigError(format!(
                "namespace must be a non-empty path segment without '@' or '/': {:?}",
                self.namespace
            )));
        }

        if self.content_kind.is_empty() {
            return Err(CacheError::ConfigError(
                "content_kind must not be empty".to_string(),
            ));
        }

        if self.version.contains('@') {
            return Err(CacheError::ConfigError(format!(
                "version must not contain '@': {:?}",
                self.version
            )));
        }

        if !(self.scope.starts_with("http://") || self.scope.starts_with("https://")) {
            return Err(CacheError::ConfigError(format!(
                "scope must be an http(s) origin: {:?}",
                self.scope
            )));
        }

        if self.ttl.is_zero() {
            return Err(CacheError::ConfigError(
                "ttl must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// The generation this configuration reads and writes
    pub fn generation(&self) -> CacheGeneration {
        CacheGeneration::new(&self.namespace, &self.content_kind, &self.version)
    }
}

/// Builder for cache configuration with validation
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    namespace: Option<String>,
    content_kind: Option<String>,
    version: Option<String>,
    scope: Option<String>,
    ttl: Option<Duration>,
}

impl CacheConfigBuilder {
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn content_kind(mut self, kind: impl Into<String>) -> Self {
        self.content_kind = Some(kind.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Set the origin cache keys are formatted against
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Set the idle time-to-live for entries
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Build the cache configuration
    pub fn build(self) -> CacheConfig {
        let defaults = CacheConfig::default();

        CacheConfig {
            namespace: self.namespace.unwrap_or(defaults.namespace),
            content_kind: self.content_kind.unwrap_or(defaults.content_kind),
            version: self.version.unwrap_or(defaults.version),
            scope: self
                .scope
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or(defaults.scope),
            ttl: self.ttl.unwrap_or(defaults.ttl),
        }
    }
}
