//! Cache entry with last-hit tracking

use crate::cache::storage::StoredResponse;
use crate::cache::types::{EpochMillis, HIT_HEADER};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One cached bundle body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Canonical bundle id (`name@version`)
    pub id: String,

    /// Bundle body without its marker line
    pub body: String,

    /// Last time the entry was written or reused, in epoch milliseconds
    pub last_hit_epoch: Option<EpochMillis>,
}

impl CacheEntry {
    pub fn new(id: impl Into<String>, body: impl Into<String>, now: EpochMillis) -> Self {
        Self {
            id: id.into(),
            body: body.into(),
            last_hit_epoch: Some(now),
        }
    }

    /// Rebuild an entry from its stored response.
    ///
    /// A missing or unparsable hit header yields `last_hit_epoch: None`.
    pub fn from_stored(id: impl Into<String>, stored: StoredResponse) -> Self {
        let last_hit_epoch = stored
            .header(HIT_HEADER)
            .and_then(|value| value.trim().parse::<EpochMillis>().ok())
            .filter(|epoch| *epoch > 0);

        Self {
            id: id.into(),
            body: stored.body,
            last_hit_epoch,
        }
    }

    /// Convert into the stored representation
    pub fn into_stored(self) -> StoredResponse {
        let stored = StoredResponse::new(self.body);
        match self.last_hit_epoch {
            Some(epoch) => stored.with_header(HIT_HEADER, epoch.to_string()),
            None => stored,
        }
    }

    /// Record a hit at `now`
    pub fn mark_hit(&mut self, now: EpochMillis) {
        self.last_hit_epoch = Some(now);
    }

    /// True when the entry has no timestamp or was last hit more than `ttl` ago
    pub fn is_stale(&self, now: EpochMillis, ttl: Duration) -> bool {
        match self.last_hit_epoch {
            None => true,
            Some(hit) => {
                let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
                now.saturating_sub(hit) > ttl_ms
            }
        }
    }

    /// Last hit as a timestamp, for display
    pub fn last_hit(&self) -> Option<DateTime<Utc>> {
        self.last_hit_epoch
            .and_then(|epoch| Utc.timestamp_millis_opt(epoch).single())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stored_round_trip_keeps_hit() {
        let entry = CacheEntry::new("foo@1.0.0", "console.log(1)", 1_000);
        let stored = entry.clone().into_stored();

        assert_eq!(stored.header(HIT_HEADER), Some("1000"));
        assert_eq!(CacheEntry::from_stored("foo@1.0.0", stored), entry);
    }

    #[test]
    fn test_missing_hit_header_is_stale() {
        let entry = CacheEntry::from_stored("foo", StoredResponse::new("x"));
        assert_eq!(entry.last_hit_epoch, None);
        assert!(entry.is_stale(0, Duration::from_secs(3600)));
    }

    #[test]
    fn test_garbage_hit_header_is_ignored() {
        let stored = StoredResponse::new("x").with_header(HIT_HEADER, "yesterday");
        let entry = CacheEntry::from_stored("foo", stored);
        assert_eq!(entry.last_hit_epoch, None);
    }

    #[test]
    fn test_staleness_boundary() {
        let ttl = Duration::from_millis(1_000);
        let entry = CacheEntry::new("foo", "x", 10_000);

        assert!(!entry.is_stale(10_999, ttl));
        assert!(!entry.is_stale(11_000, ttl));
        assert!(entry.is_stale(11_001, ttl));
    }

    #[test]
    fn test_mark_hit() {
        let mut entry = CacheEntry::new("foo", "x", 1);
        entry.mark_hit(500);
        assert_eq!(entry.last_hit_epoch, Some(500));
        assert_eq!(entry.last_hit().unwrap().timestamp_millis(), 500);
    }
}
