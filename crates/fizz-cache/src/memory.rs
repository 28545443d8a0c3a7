//! In-memory cache implementation.

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use fizz_core::{CacheKey, CvmCode, IndicatorCache, IndicatorResult, Result};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Default time-to-live of a cached indicator: one day.
pub const DEFAULT_TTL: Duration = Duration::from_secs(86_400);

/// Cache entry with timestamp for TTL-based invalidation.
#[derive(Debug, Clone)]
struct CacheEntry {
    result: IndicatorResult,
    cached_at: DateTime<Utc>,
}

impl CacheEntry {
    fn new(result: IndicatorResult) -> Self {
        Self {
            result,
            cached_at: Utc::now(),
        }
    }

    /// An entry aged exactly `ttl` is already stale, so a zero TTL caches nothing.
    fn is_stale(&self, ttl: Duration) -> bool {
        let age = Utc::now().signed_duration_since(self.cached_at);
        age >= TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX)
    }
}

/// In-memory indicator cache with a fixed time-to-live.
///
/// Entries live in an `RwLock`-protected `HashMap` and are lost when the cache
/// is dropped. A stale entry is reported as a miss even before
/// [`IndicatorCache::invalidate_stale`] sweeps it out.
#[derive(Debug)]
pub struct InMemoryCache {
    ttl: Duration,
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
}

impl InMemoryCache {
    /// Create a new empty cache whose entries expire after `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Time-to-live of cached entries.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of entries held, stale ones included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns true if nothing is held.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

#[async_trait]
impl IndicatorCache for InMemoryCache {
    #[instrument(skip(self), fields(cvm_code = %key.cvm_code, kind = %key.kind))]
    async fn get(&self, key: &CacheKey) -> Result<Option<IndicatorResult>> {
        let cache = self.entries.read().await;
        match cache.get(key) {
            Some(entry) if !entry.is_stale(self.ttl) => {
                debug!("Cache hit for indicator");
                Ok(Some(entry.result.clone()))
            }
            Some(_) => {
                debug!("Cached indicator expired");
                Ok(None)
            }
            None => {
                debug!("Cache miss for indicator");
                Ok(None)
            }
        }
    }

    #[instrument(skip(self, result), fields(cvm_code = %key.cvm_code, kind = %key.kind))]
    async fn put(&self, key: &CacheKey, result: &IndicatorResult) -> Result<()> {
        let mut cache = self.entries.write().await;
        cache.insert(*key, CacheEntry::new(result.clone()));
        debug!("Cached indicator");
        Ok(())
    }

    #[instrument(skip(self), fields(cvm_code = %cvm_code))]
    async fn invalidate_company(&self, cvm_code: CvmCode) -> Result<usize> {
        let mut cache = self.entries.write().await;
        let before = cache.len();
        cache.retain(|key, _| key.cvm_code != cvm_code);
        let removed = before - cache.len();
        debug!("Invalidated {} cached indicators", removed);
        Ok(removed)
    }

    #[instrument(skip(self))]
    async fn invalidate_stale(&self) -> Result<usize> {
        let mut cache = self.entries.write().await;
        let before = cache.len();
        cache.retain(|_, entry| !entry.is_stale(self.ttl));
        let removed = before - cache.len();

        if removed > 0 {
            debug!("Invalidated {} stale cache entries", removed);
        }

        Ok(removed)
    }

    #[instrument(skip(self))]
    async fn clear(&self) -> Result<()> {
        self.entries.write().await.clear();
        debug!("Cleared all cache entries");
        Ok(())
    }
}
