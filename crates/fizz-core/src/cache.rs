//! Cache trait for computed indicators.
//!
//! This module defines the [`IndicatorCache`] trait, an optional read-through
//! side table keyed by company, indicator and cutoff date. A cache is never a
//! source of truth: implementations must not serve entries older than their
//! TTL, and callers invalidate a company proactively when its filings change.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    indicator::{IndicatorKind, IndicatorResult},
    types::CvmCode,
};

/// Key of a cached indicator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    /// Company the indicator belongs to.
    pub cvm_code: CvmCode,
    /// Which indicator.
    pub kind: IndicatorKind,
    /// Cutoff the indicator was computed for (`None` = latest).
    pub as_of: Option<NaiveDate>,
}

impl CacheKey {
    /// Creates a new cache key.
    #[must_use]
    pub const fn new(cvm_code: CvmCode, kind: IndicatorKind, as_of: Option<NaiveDate>) -> Self {
        Self {
            cvm_code,
            kind,
            as_of,
        }
    }
}

/// Trait for caching computed indicators.
#[async_trait]
pub trait IndicatorCache: Send + Sync {
    /// Retrieves a fresh cached result.
    ///
    /// Returns `Ok(None)` when nothing is cached or the entry has expired.
    async fn get(&self, key: &CacheKey) -> Result<Option<IndicatorResult>>;

    /// Stores a result.
    async fn put(&self, key: &CacheKey, result: &IndicatorResult) -> Result<()>;

    /// Removes every entry of a company, regardless of age.
    ///
    /// Returns the number of entries removed.
    async fn invalidate_company(&self, cvm_code: CvmCode) -> Result<usize>;

    /// Removes entries older than the cache's TTL.
    ///
    /// Returns the number of entries removed.
    async fn invalidate_stale(&self) -> Result<usize>;

    /// Clears all cached data.
    async fn clear(&self) -> Result<()>;
}
