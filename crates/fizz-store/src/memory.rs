//! In-memory store implementation.

use async_trait::async_trait;
use chrono::NaiveDate;
use fizz_core::{
    BalanceEntry, BalanceStore, Company, CompanyDirectory, CvmCode, EntryQuery, Page, PageRequest,
    PriceSource, Quote, Result,
};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Unique slot of a balance entry.
///
/// Field order gives the listing order of [`BalanceStore::list_entries`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct EntryKey {
    cvm_code: CvmCode,
    statement: &'static str,
    period_end: NaiveDate,
    category: String,
    subcategory: String,
}

impl From<&BalanceEntry> for EntryKey {
    fn from(entry: &BalanceEntry) -> Self {
        Self {
            cvm_code: entry.cvm_code,
            statement: entry.statement.code(),
            period_end: entry.period_end,
            category: entry.category.clone(),
            subcategory: entry.subcategory.clone(),
        }
    }
}

/// Store that keeps balances, companies and quotes in memory.
///
/// Tables are `RwLock`-protected maps and are lost when the store is dropped.
/// Writing an entry into an occupied slot replaces it, which is how corrective
/// re-filings are applied.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: RwLock<BTreeMap<EntryKey, BalanceEntry>>,
    companies: RwLock<BTreeMap<CvmCode, Company>>,
    quotes: RwLock<HashMap<CvmCode, Vec<Quote>>>,
}

impl InMemoryStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a balance entry.
    ///
    /// Returns true if an existing entry was overwritten.
    pub async fn upsert_entry(&self, entry: BalanceEntry) -> bool {
        let key = EntryKey::from(&entry);
        self.entries.write().await.insert(key, entry).is_some()
    }

    /// Inserts or replaces many balance entries.
    ///
    /// Returns the number of entries that overwrote an existing one.
    pub async fn upsert_entries(&self, entries: impl IntoIterator<Item = BalanceEntry>) -> usize {
        let mut table = self.entries.write().await;
        let mut replaced = 0;
        for entry in entries {
            if table.insert(EntryKey::from(&entry), entry).is_some() {
                replaced += 1;
            }
        }
        debug!(replaced, total = table.len(), "Stored balance entries");
        replaced
    }

    /// Inserts or replaces a company.
    pub async fn upsert_company(&self, company: Company) {
        self.companies
            .write()
            .await
            .insert(company.cvm_code, company);
    }

    /// Records a quote; a quote for an already quoted date replaces it.
    pub async fn upsert_quote(&self, quote: Quote) {
        let mut quotes = self.quotes.write().await;
        let series = quotes.entry(quote.cvm_code).or_default();
        series.retain(|q| q.quoted_on != quote.quoted_on);
        series.push(quote);
        series.sort_by_key(|q| q.quoted_on);
    }

    /// Number of stored balance entries.
    pub async fn entry_count(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl BalanceStore for InMemoryStore {
    #[instrument(skip(self), fields(cvm_code = %query.cvm_code))]
    async fn find_entries(&self, query: &EntryQuery) -> Result<Vec<BalanceEntry>> {
        let table = self.entries.read().await;
        let mut found: Vec<BalanceEntry> = table
            .values()
            .filter(|e| query.matches(e))
            .cloned()
            .collect();
        found.sort_by_key(|e| e.period_end);
        debug!(count = found.len(), "Found balance entries");
        Ok(found)
    }

    async fn list_entries(&self, request: PageRequest) -> Result<Page<BalanceEntry>> {
        let table = self.entries.read().await;
        Ok(Page::from_sorted(table.values().cloned().collect(), request))
    }
}

#[async_trait]
impl CompanyDirectory for InMemoryStore {
    #[instrument(skip(self), fields(cvm_code = %cvm_code))]
    async fn find_company(&self, cvm_code: CvmCode) -> Result<Option<Company>> {
        Ok(self.companies.read().await.get(&cvm_code).cloned())
    }

    async fn list_companies(&self, request: PageRequest) -> Result<Page<Company>> {
        let table = self.companies.read().await;
        Ok(Page::from_sorted(table.values().cloned().collect(), request))
    }
}

#[async_trait]
impl PriceSource for InMemoryStore {
    #[instrument(skip(self), fields(cvm_code = %cvm_code))]
    async fn latest_quote(
        &self,
        cvm_code: CvmCode,
        as_of: Option<NaiveDate>,
    ) -> Result<Option<Quote>> {
        let quotes = self.quotes.read().await;
        Ok(quotes.get(&cvm_code).and_then(|series| {
            series
                .iter()
                .rev()
                .find(|q| as_of.is_none_or(|d| q.quoted_on <= d))
                .cloned()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fizz_core::{PeriodRange, StatementType};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn equity(code: u32, period_end: NaiveDate, value: f64) -> BalanceEntry {
        BalanceEntry::new(
            CvmCode::new(code),
            StatementType::BalanceSheetLiabilities,
            "DF Consolidado - Balanço Patrimonial Passivo",
            "Patrimônio Líquido Consolidado",
            period_end,
            Some(value),
        )
    }

    #[tokio::test]
    async fn test_find_entries_is_ordered_by_period() {
        let store = InMemoryStore::new();
        store
            .upsert_entries([
                equity(1, date(2023, 12, 31), 3.0),
                equity(1, date(2021, 12, 31), 1.0),
                equity(1, date(2022, 12, 31), 2.0),
                equity(2, date(2022, 12, 31), 9.0),
            ])
            .await;

        let found = store
            .find_entries(&EntryQuery::company(CvmCode::new(1)))
            .await
            .unwrap();
        let values: Vec<_> = found.iter().map(|e| e.value).collect();
        assert_eq!(values, vec![Some(1.0), Some(2.0), Some(3.0)]);

        let windowed = store
            .find_entries(
                &EntryQuery::company(CvmCode::new(1)).period(PeriodRange::up_to(date(2022, 12, 31))),
            )
            .await
            .unwrap();
        assert_eq!(windowed.len(), 2);
    }

    #[tokio::test]
    async fn test_refiling_overwrites() {
        let store = InMemoryStore::new();
        assert!(!store.upsert_entry(equity(1, date(2023, 12, 31), 100.0)).await);
        assert!(store.upsert_entry(equity(1, date(2023, 12, 31), 120.0)).await);
        assert_eq!(store.entry_count().await, 1);

        let found = store
            .find_entries(&EntryQuery::company(CvmCode::new(1)))
            .await
            .unwrap();
        assert_eq!(found[0].value, Some(120.0));
    }

    #[tokio::test]
    async fn test_unknown_company_yields_empty() {
        let store = InMemoryStore::new();
        assert!(
            store
                .find_entries(&EntryQuery::company(CvmCode::new(42)))
                .await
                .unwrap()
                .is_empty()
        );
        assert!(store.find_company(CvmCode::new(42)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_companies_paged() {
        let store = InMemoryStore::new();
        for code in [30, 10, 20] {
            store
                .upsert_company(Company::new(CvmCode::new(code), "cnpj", format!("Cia {code}")))
                .await;
        }
        let page = store
            .list_companies(PageRequest::new(0, 2).unwrap())
            .await
            .unwrap();
        let codes: Vec<_> = page.items.iter().map(|c| c.cvm_code.get()).collect();
        assert_eq!(codes, vec![10, 20]);
        assert_eq!(page.total, 3);
        assert!(page.has_next());
    }

    #[tokio::test]
    async fn test_latest_quote_respects_cutoff() {
        let store = InMemoryStore::new();
        let code = CvmCode::new(5);
        store
            .upsert_quote(Quote::new(code, 10.0, 100.0, date(2024, 1, 2)))
            .await;
        store
            .upsert_quote(Quote::new(code, 11.0, 100.0, date(2024, 2, 1)))
            .await;

        let latest = store.latest_quote(code, None).await.unwrap().unwrap();
        assert_eq!(latest.price, 11.0);

        let earlier = store
            .latest_quote(code, Some(date(2024, 1, 15)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(earlier.price, 10.0);

        assert!(
            store
                .latest_quote(code, Some(date(2023, 12, 31)))
                .await
                .unwrap()
                .is_none()
        );
    }
}
