//! Time-based snapshot cache. Plain TTL invalidation keyed by the exact
//! request tuple; no LRU, no dependency tracking.

use crate::snapshot::AnalyticsSnapshot;
use chrono::{DateTime, NaiveDate, Utc};
use log::debug;
use std::collections::HashMap;
use std::sync::Mutex;

pub const DEFAULT_TTL_SECONDS: i64 = 15 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SnapshotKey {
    pub location: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub data_type: String,
}

struct CachedSnapshot {
    snapshot: AnalyticsSnapshot,
    cached_at: DateTime<Utc>,
}

pub struct SnapshotCache {
    inner: Mutex<HashMap<SnapshotKey, CachedSnapshot>>,
    ttl_seconds: i64,
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::with_ttl(DEFAULT_TTL_SECONDS)
    }
}

impl SnapshotCache {
    pub fn with_ttl(ttl_seconds: i64) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            ttl_seconds,
        }
    }

    fn expired(&self, cached_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(cached_at).num_seconds() >= self.ttl_seconds
    }

    /// Returns the cached snapshot when present and fresh. A poisoned lock
    /// degrades to a miss; the cache is an optimization, not a store of
    /// record.
    pub fn get(&self, key: &SnapshotKey) -> Option<AnalyticsSnapshot> {
        let cache = self.inner.lock().ok()?;
        let cached = cache.get(key)?;

        if self.expired(cached.cached_at, Utc::now()) {
            debug!("Snapshot cache expired for {:?}", key);
            return None;
        }
        Some(cached.snapshot.clone())
    }

    pub fn insert(&self, key: SnapshotKey, snapshot: AnalyticsSnapshot) {
        if let Ok(mut cache) = self.inner.lock() {
            let now = Utc::now();
            cache.retain(|_, cached| !self.expired(cached.cached_at, now));
            cache.insert(
                key,
                CachedSnapshot {
                    snapshot,
                    cached_at: now,
                },
            );
        }
    }

    pub fn invalidate(&self, key: &SnapshotKey) {
        if let Ok(mut cache) = self.inner.lock() {
            cache.remove(key);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|cache| cache.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::costs::CostReport;
    use crate::processor::ProcessedData;
    use crate::snapshot::{assemble, ApiStatus, PeriodConfig};

    fn sample_snapshot() -> AnalyticsSnapshot {
        let period = PeriodConfig::new(
            "test",
            NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 31).unwrap(),
            None,
        );
        assemble(
            &period,
            &ProcessedData::default(),
            &CostReport::default(),
            ApiStatus::Live,
        )
    }

    fn key(location: &str) -> SnapshotKey {
        SnapshotKey {
            location: location.to_string(),
            start_date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 3, 31).unwrap(),
            data_type: "analytics".to_string(),
        }
    }

    #[test]
    fn test_hit_within_ttl() {
        let cache = SnapshotCache::default();
        cache.insert(key("all"), sample_snapshot());

        assert!(cache.get(&key("all")).is_some());
        assert!(cache.get(&key("gilbert")).is_none());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_zero_ttl_always_misses() {
        let cache = SnapshotCache::with_ttl(0);
        cache.insert(key("all"), sample_snapshot());
        assert!(cache.get(&key("all")).is_none());
    }

    #[test]
    fn test_invalidate() {
        let cache = SnapshotCache::default();
        cache.insert(key("all"), sample_snapshot());
        cache.invalidate(&key("all"));
        assert!(cache.get(&key("all")).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_insert_prunes_expired_entries() {
        let cache = SnapshotCache::with_ttl(0);
        cache.insert(key("a"), sample_snapshot());
        cache.insert(key("b"), sample_snapshot());
        // The second insert pruned the already-expired first entry.
        assert_eq!(cache.len(), 1);
    }
}
