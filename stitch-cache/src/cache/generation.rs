//! Cache generation naming
//!
//! One logical cache is identified by `{namespace, content kind}`. Each
//! deployed version of the agent owns exactly one generation of that cache,
//! named `namespace@content-kind@version`, e.g. `stitch@text/javascript@0.0.0`.
//! Older generations are removed by [`BundleCache::clean`].
//!
//! [`BundleCache::clean`]: crate::cache::BundleCache::clean

use crate::error::{CacheError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fingerprint of the active cache collection
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheGeneration {
    pub namespace: String,
    pub content_kind: String,
    pub version: String,
}

impl CacheGeneration {
    pub fn new(
        namespace: impl Into<String>,
        content_kind: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            content_kind: content_kind.into(),
            version: version.into(),
        }
    }

    /// Storage name of this generation
    pub fn name(&self) -> String {
        format!("{}@{}@{}", self.namespace, self.content_kind, self.version)
    }

    /// True when `other` belongs to the same logical cache but a different version
    pub fn supersedes(&self, other: &CacheGeneration) -> bool {
        self.namespace == other.namespace
            && self.content_kind == other.content_kind
            && self.version != other.version
    }
}

impl fmt::Display for CacheGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl FromStr for CacheGeneration {
    type Err = CacheError;

    /// Namespace ends at the first `@`, version starts after the last `@`.
    fn from_str(name: &str) -> Result<Self> {
        let (namespace, rest) = name
            .split_once('@')
            .ok_or_else(|| CacheError::InvalidGeneration(name.to_string()))?;
        let (content_kind, version) = rest
            .rsplit_once('@')
            .ok_or_else(|| CacheError::InvalidGeneration(name.to_string()))?;

        if namespace.is_empty() || content_kind.is_empty() {
            return Err(CacheError::InvalidGeneration(name.to_string()));
        }

        Ok(Self::new(namespace, content_kind, version))
    }
}
