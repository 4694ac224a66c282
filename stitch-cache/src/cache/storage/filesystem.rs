//! Local filesystem storage backend.
//!
//! Layout: one directory per cache, one JSON document per entry.
//!
//! ```text
//! <root>/<sha256(cache name)>/.name        cache name, verbatim
//! <root>/<sha256(cache name)>/<sha256(key)>.json
//! ```
//!
//! Names and keys are hashed so arbitrary URL-like strings never reach the
//! path; the originals are kept inside the files so `keys()` can return them.

use super::{CacheStorage, NamedCache, StoredResponse};
use crate::error::{CacheError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

const NAME_FILE: &str = ".name";
const ENTRY_EXTENSION: &str = "json";

/// Filesystem-backed storage that survives process restarts.
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    /// Create the backend, creating `root` if needed.
    pub async fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn cache_dir(&self, name: &str) -> PathBuf {
        self.root.join(digest(name))
    }
}

#[derive(Serialize, Deserialize)]
struct EntryFile {
    key: String,
    response: StoredResponse,
}

struct FsCache {
    dir: PathBuf,
}

impl FsCache {
    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", digest(key), ENTRY_EXTENSION))
    }

    async fn read_entry(path: &Path) -> Result<Option<EntryFile>> {
        match fs::read(path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn digest(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}

/// Write to a sibling temp file, then rename into place.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| CacheError::InvalidKey(format!("no parent for {:?}", path)))?;
    let tmp = parent.join(format!(".tmp-{}", Uuid::new_v4()));

    fs::write(&tmp, bytes).await?;
    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}

#[async_trait]
impl CacheStorage for FsStorage {
    async fn open(&self, name: &str) -> Result<Arc<dyn NamedCache>> {
        let dir = self.cache_dir(name);
        let name_file = dir.join(NAME_FILE);

        if fs::metadata(&name_file).await.is_err() {
            fs::create_dir_all(&dir).await?;
            write_atomic(&name_file, name.as_bytes()).await?;
            debug!("Created cache {} at {:?}", name, dir);
        }

        Ok(Arc::new(FsCache { dir }))
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut dirs = fs::read_dir(&self.root).await?;

        while let Some(entry) = dirs.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            match fs::read_to_string(entry.path().join(NAME_FILE)).await {
                Ok(name) => names.push(name),
                Err(e) => warn!("Skipping unnamed cache directory {:?}: {}", entry.path(), e),
            }
        }

        Ok(names)
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        match fs::remove_dir_all(self.cache_dir(name)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }
}

#[async_trait]
impl NamedCache for FsCache {
    async fn match_key(&self, key: &str) -> Result<Option<StoredResponse>> {
        let entry = Self::read_entry(&self.entry_path(key)).await?;
        Ok(entry.filter(|e| e.key == key).map(|e| e.response))
    }

    async fn put(&self, key: &str, response: StoredResponse) -> Result<()> {
        let file = EntryFile {
            key: key.to_string(),
            response,
        };
        let bytes = serde_json::to_vec(&file)?;
        write_atomic(&self.entry_path(key), &bytes).await
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        match fs::remove_file(self.entry_path(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut files = match fs::read_dir(&self.dir).await {
            Ok(files) => files,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(keys),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = files.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(ENTRY_EXTENSION) {
                continue;
            }
            match Self::read_entry(&path).await {
                Ok(Some(file)) => keys.push(file.key),
                Ok(None) => {}
                Err(e) => warn!("Skipping unreadable cache entry {:?}: {}", path, e),
            }
        }

        Ok(keys)
    }
}
