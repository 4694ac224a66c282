//! Background work that must outlive the response it belongs to
//!
//! The agent hands back a [`Settle`] handle for every piece of background
//! persistence; the host passes it to [`Keepalive::wait_until`] and drains
//! the keepalive before shutting down.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Handle to spawned background work
#[must_use = "pass the handle to Keepalive::wait_until or await it"]
#[derive(Debug)]
pub struct Settle {
    handle: JoinHandle<()>,
}

impl Settle {
    pub fn spawn<F>(work: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            handle: tokio::spawn(work),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the work to finish
    pub async fn wait(self) {
        if let Err(e) = self.handle.await {
            warn!("Background task failed: {}", e);
        }
    }
}

/// Tracks outstanding [`Settle`] handles
#[derive(Clone, Default)]
pub struct Keepalive {
    pending: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl Keepalive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep the host alive until `settle` finishes
    pub async fn wait_until(&self, settle: Settle) {
        let mut pending = self.pending.lock().await;
        pending.retain(|handle| !handle.is_finished());
        pending.push(settle.handle);
    }

    /// Number of tracked tasks that have not finished yet
    pub async fn pending(&self) -> usize {
        let mut pending = self.pending.lock().await;
        pending.retain(|handle| !handle.is_finished());
        pending.len()
    }

    /// Wait for every tracked task, including ones added while draining
    pub async fn drain(&self) {
        loop {
            let batch: Vec<JoinHandle<()>> = std::mem::take(&mut *self.pending.lock().await);
            if batch.is_empty() {
                return;
            }

            debug!("Draining {} background tasks", batch.len());
            for handle in batch {
                if let Err(e) = handle.await {
                    warn!("Background task failed: {}", e);
                }
            }
        }
    }
}
