//! Time-bounded in-memory cache for responses from external APIs.
//!
//! Entries are never evicted. A lookup older than the TTL behaves as a miss
//! and the caller is expected to refetch and `put` the fresh value, which
//! supersedes the stale one.

use chrono::{DateTime, Utc};
use moka::sync::Cache;
use std::sync::Arc;
use std::time::Duration;

/// Source of the current time, injected so freshness can be tested.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub fetched_at: DateTime<Utc>,
}

pub struct TtlCache<V> {
    entries: Cache<String, CacheEntry<V>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<V> TtlCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        // No capacity and no time-based expiry: staleness is judged on read.
        let entries = Cache::builder().build();
        Self {
            entries,
            ttl,
            clock,
        }
    }

    /// Returns the cached value only while `now - fetched_at < ttl`.
    pub fn get(&self, key: &str) -> Option<V> {
        let entry = self.entries.get(key)?;
        if self.is_fresh(&entry) {
            Some(entry.value)
        } else {
            tracing::debug!("Cache entry {} is stale", key);
            None
        }
    }

    /// Stores `value` under `key` stamped with the current time, replacing
    /// any previous entry.
    pub fn put(&self, key: impl Into<String>, value: V) {
        let entry = CacheEntry {
            value,
            fetched_at: self.clock.now(),
        };
        self.entries.insert(key.into(), entry);
    }

    /// Returns the entry regardless of its age.
    pub fn peek(&self, key: &str) -> Option<CacheEntry<V>> {
        self.entries.get(key)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn len(&self) -> u64 {
        self.entries.run_pending_tasks();
        self.entries.entry_count()
    }

    fn is_fresh(&self, entry: &CacheEntry<V>) -> bool {
        // A fetch stamped in the future (clock skew) counts as age zero.
        let age = (self.clock.now() - entry.fetched_at)
            .to_std()
            .unwrap_or_default();
        age < self.ttl
    }
}

#[cfg(test)]
pub struct ManualClock {
    now: std::sync::Mutex<DateTime<Utc>>,
}

#[cfg(test)]
impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: std::sync::Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now = *now + chrono::Duration::from_std(by).unwrap();
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}
