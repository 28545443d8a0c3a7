//! No-op cache implementation.

use async_trait::async_trait;
use fizz_core::{CacheKey, CvmCode, IndicatorCache, IndicatorResult, Result};
use tracing::trace;

/// A no-op cache that doesn't store anything.
///
/// `get` always returns `Ok(None)` and every write succeeds without effect.
/// Useful for disabling caching or testing code paths without cache hits.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCache;

impl NoopCache {
    /// Create a new no-op cache.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl IndicatorCache for NoopCache {
    async fn get(&self, _key: &CacheKey) -> Result<Option<IndicatorResult>> {
        trace!("NoopCache: get called, returning None");
        Ok(None)
    }

    async fn put(&self, _key: &CacheKey, _result: &IndicatorResult) -> Result<()> {
        trace!("NoopCache: put called, doing nothing");
        Ok(())
    }

    async fn invalidate_company(&self, _cvm_code: CvmCode) -> Result<usize> {
        trace!("NoopCache: invalidate_company called, returning 0");
        Ok(0)
    }

    async fn invalidate_stale(&self) -> Result<usize> {
        trace!("NoopCache: invalidate_stale called, returning 0");
        Ok(0)
    }

    async fn clear(&self) -> Result<()> {
        trace!("NoopCache: clear called, doing nothing");
        Ok(())
    }
}
