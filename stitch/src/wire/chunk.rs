//! One bundle's body plus its framing metadata

use crate::bundle::BundleRequest;
use crate::error::Result;
use crate::wire::{marker::Marker, preset::ContentKind};
use serde::{Deserialize, Serialize};
use stitch_cache::CacheableChunk;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleChunk {
    pub name: String,
    pub version: Option<String>,
    pub id: String,
    pub body: String,
    /// False when `body` is a missing or failure diagnostic
    pub cacheable: bool,
}

impl BundleChunk {
    pub fn new(request: &BundleRequest, body: impl Into<String>, cacheable: bool) -> Self {
        Self {
            name: request.name.clone(),
            version: request.version.clone(),
            id: request.id.clone(),
            body: body.into(),
            cacheable,
        }
    }

    /// Rebuild a chunk from a parsed marker and the text above it
    pub fn from_marker(marker: Marker, body: impl Into<String>) -> Self {
        let id = marker.id();
        Self {
            name: marker.name,
            version: marker.version,
            id,
            body: body.into(),
            cacheable: marker.cache,
        }
    }

    pub fn marker(&self) -> Marker {
        Marker::new(&self.name, self.version.clone(), self.cacheable)
    }

    /// Body followed by its marker line
    pub fn framed(&self, kind: ContentKind) -> Result<String> {
        Ok(format!("{}\n{}", self.body, kind.marker_line(&self.marker())?))
    }
}

impl CacheableChunk for BundleChunk {
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
