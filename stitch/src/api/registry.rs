//! Bundle handler registry
//!
//! One registry belongs to one server instance and is handed to the
//! concatenator by reference.

use crate::bundle::BundleRequest;
use crate::error::{Result, StitchError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// Produces the content of a bundle.
///
/// `Ok(None)` (or empty content) means the bundle is not available, which
/// the concatenator reports as missing. An error becomes a failure chunk.
#[async_trait]
pub trait BundleHandler: Send + Sync {
    async fn produce(&self, request: &BundleRequest) -> anyhow::Result<Option<String>>;
}

/// Adapter turning an async closure into a [`BundleHandler`]
pub struct FnHandler<F>(F);

/// Wrap an async closure as a handler
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(BundleRequest) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Option<String>>> + Send,
{
    FnHandler(f)
}

#[async_trait]
impl<F, Fut> BundleHandler for FnHandler<F>
where
    F: Fn(BundleRequest) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Option<String>>> + Send,
{
    async fn produce(&self, request: &BundleRequest) -> anyhow::Result<Option<String>> {
        (self.0)(request.clone()).await
    }
}

#[derive(Clone, Default)]
pub struct Registry {
    handlers: HashMap<String, Arc<dyn BundleHandler>>,
    catch_all: Vec<Arc<dyn BundleHandler>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the dedicated handler for `name`.
    ///
    /// Fails if `name` already has one.
    pub fn register(&mut self, name: impl Into<String>, handler: impl BundleHandler + 'static) -> Result<()> {
        let name = name.into();
        if self.handlers.contains_key(&name) {
            return Err(StitchError::DuplicateRegistration { name });
        }

        debug!("Registered handler for bundle {}", name);
        self.handlers.insert(name, Arc::new(handler));
        Ok(())
    }

    /// Append a catch-all handler, tried after earlier catch-alls
    pub fn register_catch_all(&mut self, handler: impl BundleHandler + 'static) {
        self.catch_all.push(Arc::new(handler));
        debug!("Registered catch-all handler #{}", self.catch_all.len());
    }

    pub fn handler(&self, name: &str) -> Option<&Arc<dyn BundleHandler>> {
        self.handlers.get(name)
    }

    pub fn catch_all(&self) -> &[Arc<dyn BundleHandler>] {
        &self.catch_all
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty() && self.catch_all.is_empty()
    }
}
