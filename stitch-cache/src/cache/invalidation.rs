//! Cache invalidation reasons and policy
//!
//! Two maintenance passes remove data:
//! - idle expiry: entries not hit within the TTL, or never stamped at all
//! - generation cleanup: whole caches belonging to a superseded version

use crate::cache::entry::CacheEntry;
use crate::cache::types::EpochMillis;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Reason for cache invalidation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvalidationReason {
    /// Entry was not hit within the TTL
    Expired,

    /// Entry carries no hit timestamp
    Untracked,

    /// Whole generation replaced by a newer version
    Superseded { generation: String },
}

impl std::fmt::Display for InvalidationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidationReason::Expired => write!(f, "TTL expired"),
            InvalidationReason::Untracked => write!(f, "missing hit timestamp"),
            InvalidationReason::Superseded { generation } => {
                write!(f, "superseded generation: {}", generation)
            }
        }
    }
}

/// Idle-expiry policy applied by `invalidate`
#[derive(Debug, Clone, Copy)]
pub struct InvalidationPolicy {
    pub ttl: Duration,
}

impl InvalidationPolicy {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }

    /// Check if an entry should be dropped at `now`
    pub fn should_invalidate(&self, entry: &CacheEntry, now: EpochMillis) -> Option<InvalidationReason> {
        if entry.last_hit_epoch.is_none() {
            return Some(InvalidationReason::Untracked);
        }
        if entry.is_stale(now, self.ttl) {
            return Some(InvalidationReason::Expired);
        }
        None
    }
}

/// Event for cache invalidation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvalidationEvent {
    /// Reason for invalidation
    pub reason: InvalidationReason,

    /// When the invalidation occurred
    pub timestamp: DateTime<Utc>,

    /// Keys (or cache names) that were invalidated
    pub keys: Vec<String>,

    /// Additional context
    pub context: Option<String>,
}

impl InvalidationEvent {
    pub fn new(reason: InvalidationReason, keys: Vec<String>) -> Self {
        Self {
            reason,
            timestamp: Utc::now(),
            keys,
            context: None,
        }
    }

    pub fn with_context(mut self, context: String) -> Self {
        self.context = Some(context);
        self
    }
}
