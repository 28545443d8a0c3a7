//! Writes to the SQLite store that keep the indicator cache current.

use std::collections::BTreeSet;
use std::sync::Arc;

use fizz_core::{BalanceEntry, Company, CvmCode, IndicatorCache, Quote, Result};
use fizz_store::SqliteStore;
use tracing::{debug, instrument};

/// Ingestion handle returned by [`open_sqlite`](crate::open_sqlite).
///
/// Every write of filings or quotes drops the cached indicators of the
/// companies it touched, so the next computation sees the new data.
#[derive(Clone)]
pub struct SqliteIngest {
    store: Arc<SqliteStore>,
    cache: Arc<dyn IndicatorCache>,
}

impl std::fmt::Debug for SqliteIngest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteIngest")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl SqliteIngest {
    /// Creates a handle writing to `store` and invalidating `cache`.
    #[must_use]
    pub fn new(store: Arc<SqliteStore>, cache: Arc<dyn IndicatorCache>) -> Self {
        Self { store, cache }
    }

    /// The underlying store, for reads.
    #[must_use]
    pub const fn store(&self) -> &Arc<SqliteStore> {
        &self.store
    }

    /// Inserts or replaces balance entries, then invalidates their companies.
    ///
    /// Returns the number of rows written.
    ///
    /// # Errors
    /// Returns [`FizzError::StoreUnavailable`](crate::FizzError::StoreUnavailable)
    /// if the write fails and [`FizzError::Cache`](crate::FizzError::Cache) if
    /// the entries were written but the cache could not be invalidated.
    #[instrument(skip(self, entries), fields(count = entries.len()))]
    pub async fn upsert_entries(&self, entries: &[BalanceEntry]) -> Result<usize> {
        let written = self.store.upsert_entries(entries)?;
        let codes: BTreeSet<CvmCode> = entries.iter().map(|e| e.cvm_code).collect();
        self.invalidate(codes).await?;
        Ok(written)
    }

    /// Inserts or replaces a quote, then invalidates its company.
    ///
    /// # Errors
    /// As [`Self::upsert_entries`].
    pub async fn upsert_quote(&self, quote: &Quote) -> Result<()> {
        self.store.upsert_quote(quote)?;
        self.invalidate([quote.cvm_code]).await?;
        Ok(())
    }

    /// Inserts or replaces a company.
    ///
    /// Register data does not enter any indicator, so nothing is invalidated.
    ///
    /// # Errors
    /// Returns an error if the company cannot be serialized or written.
    pub fn upsert_company(&self, company: &Company) -> Result<()> {
        self.store.upsert_company(company)
    }

    async fn invalidate(&self, codes: impl IntoIterator<Item = CvmCode>) -> Result<()> {
        let mut removed = 0;
        for code in codes {
            removed += self.cache.invalidate_company(code).await?;
        }
        debug!(removed, "Invalidated cached indicators after ingestion");
        Ok(())
    }
}
