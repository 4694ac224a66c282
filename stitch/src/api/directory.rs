//! Catch-all handler serving bundles from a directory
//!
//! `foo@1.2.0` resolves to `<root>/foo-1.2.0.<ext>`, an unversioned `foo` to
//! `<root>/foo.<ext>`. Scoped names map to a subdirectory.

use crate::bundle::BundleRequest;
use crate::wire::ContentKind;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use super::registry::BundleHandler;

pub struct DirectoryBundles {
    root: PathBuf,
    extension: &'static str,
}

impl DirectoryBundles {
    pub fn new(root: impl Into<PathBuf>, kind: ContentKind) -> Self {
        Self {
            root: root.into(),
            extension: kind.extension(),
        }
    }

    /// File for `request`, or `None` when it would escape the root
    pub fn path_for(&self, request: &BundleRequest) -> Option<PathBuf> {
        let file = match &request.version {
            Some(version) => format!("{}-{}.{}", request.name, version, self.extension),
            None => format!("{}.{}", request.name, self.extension),
        };

        let relative = Path::new(&file);
        let contained = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));

        contained.then(|| self.root.join(relative))
    }
}

#[async_trait]
impl BundleHandler for DirectoryBundles {
    async fn produce(&self, request: &BundleRequest) -> anyhow::Result<Option<String>> {
        let Some(path) = self.path_for(request) else {
            debug!("Rejected bundle path for {}", request.id);
            return Ok(None);
        };

        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(anyhow::anyhow!("failed to read {}: {}", path.display(), e)),
        }
    }
}
