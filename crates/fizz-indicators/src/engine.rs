//! The indicator engine.

use std::sync::Arc;

use chrono::NaiveDate;
use fizz_core::{
    BalanceEntry, BalanceStore, CacheKey, CompanyDirectory, CvmCode, EntryQuery, FizzError,
    IndicatorCache, IndicatorKind, IndicatorResult, LineItem, PeriodRange, PriceSource,
    ResolvedInput, Result, StatementType,
};
use tracing::{debug, instrument, warn};

use crate::config::{CashFlowPolicy, EngineConfig};
use crate::line_items::LineItemTable;
use crate::resolve;

const BALANCE_SHEET_ITEMS: [LineItem; 4] = [
    LineItem::TotalLiabilities,
    LineItem::CurrentLiabilities,
    LineItem::NoncurrentLiabilities,
    LineItem::TotalEquity,
];

/// Equity filed further than this from the net income period is unrelated to it.
const ADJACENT_PERIOD_DAYS: i64 = 366;

const CASH_FLOW_ITEMS: [LineItem; 3] = [
    LineItem::OperatingCashFlow,
    LineItem::InvestingCashFlow,
    LineItem::FinancingCashFlow,
];

/// Computes fundamental indicators from stored statements.
///
/// The engine only reads from its collaborators and keeps no state between
/// calls besides the optional cache, so a single instance can serve
/// concurrent requests. Every operation first checks the company directory;
/// an unknown company fails with [`FizzError::CompanyNotFound`] before any
/// balance entry is read.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use fizz_indicators::IndicatorEngine;
/// use fizz_store::InMemoryStore;
///
/// let store = Arc::new(InMemoryStore::new());
/// let engine = IndicatorEngine::new(store.clone(), store.clone()).with_prices(store);
///
/// let de = engine.debt_equity_ratio(CvmCode::new(9512), None).await?;
/// println!("D/E = {}", de.value);
/// ```
pub struct IndicatorEngine {
    balances: Arc<dyn BalanceStore>,
    companies: Arc<dyn CompanyDirectory>,
    prices: Option<Arc<dyn PriceSource>>,
    cache: Option<Arc<dyn IndicatorCache>>,
    line_items: Arc<LineItemTable>,
    config: EngineConfig,
}

impl std::fmt::Debug for IndicatorEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndicatorEngine")
            .field("balances", &self.balances)
            .field("companies", &self.companies)
            .field("prices", &self.prices)
            .field("cache", &self.cache.as_ref().map(|_| "configured"))
            .field("line_items", &self.line_items.rules().len())
            .field("config", &self.config)
            .finish()
    }
}

impl IndicatorEngine {
    /// Creates an engine with the default configuration, no price source and no cache.
    #[must_use]
    pub fn new(balances: Arc<dyn BalanceStore>, companies: Arc<dyn CompanyDirectory>) -> Self {
        Self {
            balances,
            companies,
            prices: None,
            cache: None,
            line_items: Arc::new(LineItemTable::default()),
            config: EngineConfig::default(),
        }
    }

    /// Sets the price source used by the price-to-earnings ratio.
    #[must_use]
    pub fn with_prices(mut self, prices: Arc<dyn PriceSource>) -> Self {
        self.prices = Some(prices);
        self
    }

    /// Sets the cache for computed indicators.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn IndicatorCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Replaces the line item table.
    #[must_use]
    pub fn with_line_items(mut self, table: LineItemTable) -> Self {
        self.line_items = Arc::new(table);
        self
    }

    /// Applies a configuration, including its line item table when it has one.
    ///
    /// # Errors
    /// Returns [`FizzError::Config`] if the configuration is invalid.
    pub fn with_config(mut self, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        if config.line_items.is_some() {
            self.line_items = Arc::new(config.line_item_table()?);
        }
        self.config = config;
        Ok(self)
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The active line item table.
    #[must_use]
    pub fn line_items(&self) -> &LineItemTable {
        &self.line_items
    }

    /// Price-to-earnings ratio: price per share over earnings per share.
    ///
    /// Earnings are the latest net income filed within
    /// [`EngineConfig::earnings_lookback_days`] before the cutoff, or before
    /// the quote date when no cutoff is given.
    ///
    /// # Errors
    /// - [`FizzError::NotConfigured`] without a price source
    /// - [`FizzError::MissingData`] without a quote or net income in the window
    /// - [`FizzError::Undefined`] if net income or shares outstanding are not positive
    pub async fn price_to_earning_ratio(
        &self,
        cvm_code: CvmCode,
        as_of: Option<NaiveDate>,
    ) -> Result<IndicatorResult> {
        self.compute(IndicatorKind::PriceToEarnings, cvm_code, as_of)
            .await
    }

    /// Total liabilities over total equity at the latest balance sheet period.
    ///
    /// Total liabilities fall back to current plus non-current liabilities of
    /// the same period.
    ///
    /// # Errors
    /// - [`FizzError::MissingData`] if either side is absent for that period
    /// - [`FizzError::Undefined`] if equity is zero
    pub async fn debt_equity_ratio(
        &self,
        cvm_code: CvmCode,
        as_of: Option<NaiveDate>,
    ) -> Result<IndicatorResult> {
        self.compute(IndicatorKind::DebtToEquity, cvm_code, as_of)
            .await
    }

    /// Operating plus investing plus financing cash flow of the latest cash flow statement.
    ///
    /// # Errors
    /// - [`FizzError::MissingData`] without any cash flow statement, or with a
    ///   missing component under [`CashFlowPolicy::Strict`]
    pub async fn net_cash_flow(
        &self,
        cvm_code: CvmCode,
        as_of: Option<NaiveDate>,
    ) -> Result<IndicatorResult> {
        self.compute(IndicatorKind::NetCashFlow, cvm_code, as_of)
            .await
    }

    /// Net income over the average equity around the net income period.
    ///
    /// Equity is taken from the two periods nearest to the latest net income,
    /// each at most a year away from it. With a single such figure it is used
    /// alone and the result is flagged low confidence.
    ///
    /// # Errors
    /// - [`FizzError::MissingData`] without net income, or without equity
    ///   filed within a year of it
    /// - [`FizzError::Undefined`] if the equity denominator is zero
    pub async fn return_on_equity(
        &self,
        cvm_code: CvmCode,
        as_of: Option<NaiveDate>,
    ) -> Result<IndicatorResult> {
        self.compute(IndicatorKind::ReturnOnEquity, cvm_code, as_of)
            .await
    }

    /// Computes any indicator, going through the cache when one is set.
    ///
    /// Only successful results are cached. A failing cache is logged and
    /// bypassed.
    #[instrument(skip(self), fields(cvm_code = %cvm_code, kind = %kind))]
    pub async fn compute(
        &self,
        kind: IndicatorKind,
        cvm_code: CvmCode,
        as_of: Option<NaiveDate>,
    ) -> Result<IndicatorResult> {
        let key = CacheKey::new(cvm_code, kind, as_of);

        if let Some(cache) = &self.cache {
            match cache.get(&key).await {
                Ok(Some(cached)) => {
                    debug!("Cache hit for indicator");
                    return Ok(cached);
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "Failed to read indicator cache"),
            }
        }

        self.ensure_company(cvm_code).await?;

        let result = match kind {
            IndicatorKind::PriceToEarnings => self.evaluate_pe(cvm_code, as_of).await,
            IndicatorKind::DebtToEquity => self.evaluate_de(cvm_code, as_of).await,
            IndicatorKind::NetCashFlow => self.evaluate_ncf(cvm_code, as_of).await,
            IndicatorKind::ReturnOnEquity => self.evaluate_roe(cvm_code, as_of).await,
        }?;

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.put(&key, &result).await {
                warn!(error = %e, "Failed to cache indicator");
            }
        }

        Ok(result)
    }

    /// Drops cached results of companies whose filings changed.
    ///
    /// Returns the number of cache entries removed.
    ///
    /// # Errors
    /// Returns [`FizzError::Cache`] if the cache fails.
    #[instrument(skip(self), fields(count = cvm_codes.len()))]
    pub async fn invalidate(&self, cvm_codes: &[CvmCode]) -> Result<usize> {
        let Some(cache) = &self.cache else {
            return Ok(0);
        };
        let mut removed = 0;
        for code in cvm_codes {
            removed += cache.invalidate_company(*code).await?;
        }
        debug!(removed, "Invalidated cached indicators");
        Ok(removed)
    }

    async fn ensure_company(&self, cvm_code: CvmCode) -> Result<()> {
        match self.companies.find_company(cvm_code).await? {
            Some(_) => Ok(()),
            None => Err(FizzError::CompanyNotFound(cvm_code)),
        }
    }

    async fn entries(
        &self,
        cvm_code: CvmCode,
        statement: StatementType,
        as_of: Option<NaiveDate>,
    ) -> Result<Vec<BalanceEntry>> {
        let period = as_of.map_or_else(PeriodRange::all, PeriodRange::up_to);
        self.balances
            .find_entries(
                &EntryQuery::company(cvm_code)
                    .statement(statement)
                    .period(period),
            )
            .await
    }

    async fn evaluate_pe(
        &self,
        cvm_code: CvmCode,
        as_of: Option<NaiveDate>,
    ) -> Result<IndicatorResult> {
        let prices = self.prices.as_ref().ok_or_else(|| {
            FizzError::NotConfigured("No price source configured".to_string())
        })?;

        let (income, quote) = futures::try_join!(
            self.entries(cvm_code, StatementType::IncomeStatement, as_of),
            prices.latest_quote(cvm_code, as_of),
        )?;

        let quote = quote.ok_or_else(|| FizzError::missing(cvm_code, "no market quote"))?;

        let window_end = as_of.unwrap_or(quote.quoted_on);
        let window_start = window_end
            .checked_sub_signed(self.config.earnings_lookback())
            .ok_or_else(|| {
                FizzError::InvalidParameter(format!(
                    "earnings window before {} is out of the calendar range",
                    window_end
                ))
            })?;
        let window = PeriodRange::between(window_start, window_end);
        let income: Vec<BalanceEntry> = income
            .into_iter()
            .filter(|e| window.contains(e.period_end))
            .collect();

        let net_income = resolve::latest(&self.line_items, &income, LineItem::NetIncome)
            .ok_or_else(|| {
                FizzError::missing(
                    cvm_code,
                    format!(
                        "no net income within {} days before {}",
                        self.config.earnings_lookback_days, window_end
                    ),
                )
            })?;

        if net_income.value <= 0.0 {
            return Err(FizzError::undefined(
                cvm_code,
                format!("net income {} is not positive", net_income.value),
            ));
        }
        if quote.shares_outstanding <= 0.0 {
            return Err(FizzError::undefined(
                cvm_code,
                format!("shares outstanding {} is not positive", quote.shares_outstanding),
            ));
        }

        let eps = net_income.value * self.config.amount_scale / quote.shares_outstanding;
        let value = finite(cvm_code, quote.price / eps)?;
        debug!(
            period_end = %net_income.period_end,
            quoted_on = %quote.quoted_on,
            eps,
            "Computed price to earnings"
        );

        let mut result =
            IndicatorResult::new(cvm_code, IndicatorKind::PriceToEarnings, value, vec![net_income]);
        result.quote = Some(quote);
        Ok(result)
    }

    async fn evaluate_de(
        &self,
        cvm_code: CvmCode,
        as_of: Option<NaiveDate>,
    ) -> Result<IndicatorResult> {
        let entries = self
            .entries(cvm_code, StatementType::BalanceSheetLiabilities, as_of)
            .await?;
        let table = &self.line_items;

        let period = resolve::latest_period(table, &entries, &BALANCE_SHEET_ITEMS)
            .ok_or_else(|| FizzError::missing(cvm_code, "no balance sheet"))?;
        debug!(period_end = %period, "Using balance sheet period");

        let equity = resolve::at_period(table, &entries, LineItem::TotalEquity, period)
            .ok_or_else(|| FizzError::missing(cvm_code, format!("no total equity at {}", period)))?;

        let liabilities = match resolve::at_period(table, &entries, LineItem::TotalLiabilities, period)
        {
            Some(total) => vec![total],
            None => {
                let current =
                    resolve::at_period(table, &entries, LineItem::CurrentLiabilities, period);
                let noncurrent =
                    resolve::at_period(table, &entries, LineItem::NoncurrentLiabilities, period);
                match (current, noncurrent) {
                    (Some(current), Some(noncurrent)) => vec![current, noncurrent],
                    _ => {
                        return Err(FizzError::missing(
                            cvm_code,
                            format!("no total liabilities at {}", period),
                        ));
                    }
                }
            }
        };

        if equity.value == 0.0 {
            return Err(FizzError::undefined(cvm_code, "total equity is zero"));
        }

        let total_liabilities: f64 = liabilities.iter().map(|i| i.value).sum();
        let value = finite(cvm_code, total_liabilities / equity.value)?;

        let mut inputs = liabilities;
        inputs.push(equity);
        Ok(IndicatorResult::new(
            cvm_code,
            IndicatorKind::DebtToEquity,
            value,
            inputs,
        ))
    }

    async fn evaluate_ncf(
        &self,
        cvm_code: CvmCode,
        as_of: Option<NaiveDate>,
    ) -> Result<IndicatorResult> {
        let (indirect, direct) = futures::try_join!(
            self.entries(cvm_code, StatementType::CashFlowIndirect, as_of),
            self.entries(cvm_code, StatementType::CashFlowDirect, as_of),
        )?;

        if indirect.is_empty() && direct.is_empty() {
            return Err(FizzError::missing(cvm_code, "no cash flow statement"));
        }

        let table = &self.line_items;
        let indirect_period = resolve::latest_period(table, &indirect, &CASH_FLOW_ITEMS);
        let direct_period = resolve::latest_period(table, &direct, &CASH_FLOW_ITEMS);

        // Later statement wins; a tie goes to the indirect method.
        let (entries, period) = match (indirect_period, direct_period) {
            (Some(i), Some(d)) if d > i => (&direct, d),
            (Some(i), _) => (&indirect, i),
            (None, Some(d)) => (&direct, d),
            (None, None) => {
                return Err(FizzError::missing(
                    cvm_code,
                    "no cash flow component in any statement",
                ));
            }
        };
        debug!(period_end = %period, "Using cash flow statement period");

        let mut inputs = Vec::with_capacity(CASH_FLOW_ITEMS.len());
        let mut missing = Vec::new();
        for item in CASH_FLOW_ITEMS {
            match resolve::at_period(table, entries, item, period) {
                Some(input) => inputs.push(input),
                None => missing.push(item),
            }
        }

        if !missing.is_empty() && self.config.cash_flow_policy == CashFlowPolicy::Strict {
            let names: Vec<String> = missing.iter().map(ToString::to_string).collect();
            return Err(FizzError::missing(
                cvm_code,
                format!("no {} at {}", names.join(", "), period),
            ));
        }

        let value = finite(cvm_code, inputs.iter().map(|i| i.value).sum())?;
        let mut result = IndicatorResult::new(cvm_code, IndicatorKind::NetCashFlow, value, inputs);
        result.partial = !missing.is_empty();
        Ok(result)
    }

    async fn evaluate_roe(
        &self,
        cvm_code: CvmCode,
        as_of: Option<NaiveDate>,
    ) -> Result<IndicatorResult> {
        let (income, balance) = futures::try_join!(
            self.entries(cvm_code, StatementType::IncomeStatement, as_of),
            self.entries(cvm_code, StatementType::BalanceSheetLiabilities, as_of),
        )?;
        let table = &self.line_items;

        let equity = resolve::series(table, &balance, LineItem::TotalEquity);
        if equity.is_empty() {
            return Err(FizzError::missing(cvm_code, "no total equity"));
        }
        let net_income = resolve::latest(table, &income, LineItem::NetIncome)
            .ok_or_else(|| FizzError::missing(cvm_code, "no net income"))?;

        let period = net_income.period_end;
        let mut matched: Vec<ResolvedInput> = equity
            .into_iter()
            .filter(|e| days_apart(e.period_end, period) <= ADJACENT_PERIOD_DAYS)
            .collect();
        if matched.is_empty() {
            return Err(FizzError::missing(
                cvm_code,
                format!("no total equity adjacent to net income at {}", period),
            ));
        }
        // Two nearest periods, the earlier one on a tie
        matched.sort_by_key(|e| (days_apart(e.period_end, period), e.period_end));
        matched.truncate(2);
        matched.sort_by_key(|e| e.period_end);

        let low_confidence = matched.len() < 2;
        let denominator = matched.iter().map(|i| i.value).sum::<f64>() / matched.len() as f64;

        if denominator == 0.0 {
            return Err(FizzError::undefined(cvm_code, "average equity is zero"));
        }

        let value = finite(cvm_code, net_income.value / denominator)?;
        let mut inputs = vec![net_income];
        inputs.extend(matched);

        let mut result = IndicatorResult::new(cvm_code, IndicatorKind::ReturnOnEquity, value, inputs);
        result.low_confidence = low_confidence;
        Ok(result)
    }
}

fn days_apart(a: NaiveDate, b: NaiveDate) -> i64 {
    a.signed_duration_since(b).num_days().abs()
}

/// Rejects NaN and infinite values as undefined.
fn finite(cvm_code: CvmCode, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(FizzError::undefined(
            cvm_code,
            format!("result {} is not a finite number", value),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::line_items::LineItemRule;
    use fizz_cache::InMemoryCache;
    use fizz_core::{Company, Page, PageRequest, Quote};
    use fizz_store::InMemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const BPP_GROUP: &str = "DF Consolidado - Balanço Patrimonial Passivo";
    const DRE_GROUP: &str = "DF Consolidado - Demonstração do Resultado";
    const DFC_GROUP: &str = "DF Consolidado - Demonstração do Fluxo de Caixa (Método Indireto)";

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn entry(
        code: u32,
        statement: StatementType,
        category: &str,
        subcategory: &str,
        period_end: NaiveDate,
        value: f64,
    ) -> BalanceEntry {
        BalanceEntry::new(
            CvmCode::new(code),
            statement,
            category,
            subcategory,
            period_end,
            Some(value),
        )
    }

    fn bpp(code: u32, subcategory: &str, period_end: NaiveDate, value: f64) -> BalanceEntry {
        entry(
            code,
            StatementType::BalanceSheetLiabilities,
            BPP_GROUP,
            subcategory,
            period_end,
            value,
        )
    }

    fn dre(code: u32, period_end: NaiveDate, value: f64) -> BalanceEntry {
        entry(
            code,
            StatementType::IncomeStatement,
            DRE_GROUP,
            "Lucro/Prejuízo Consolidado do Período",
            period_end,
            value,
        )
    }

    fn dfc(
        code: u32,
        statement: StatementType,
        subcategory: &str,
        period_end: NaiveDate,
        value: f64,
    ) -> BalanceEntry {
        entry(code, statement, DFC_GROUP, subcategory, period_end, value)
    }

    async fn store_with(codes: &[u32], entries: Vec<BalanceEntry>) -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        for code in codes {
            store
                .upsert_company(Company::new(
                    CvmCode::new(*code),
                    "00.000.000/0001-00",
                    format!("Companhia {code}"),
                ))
                .await;
        }
        store.upsert_entries(entries).await;
        store
    }

    fn engine(store: &Arc<InMemoryStore>) -> IndicatorEngine {
        IndicatorEngine::new(store.clone(), store.clone()).with_prices(store.clone())
    }

    /// Balance store that counts queries and can be switched to fail.
    #[derive(Debug, Default)]
    struct CountingStore {
        inner: InMemoryStore,
        queries: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl BalanceStore for CountingStore {
        async fn find_entries(&self, query: &EntryQuery) -> Result<Vec<BalanceEntry>> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(FizzError::StoreUnavailable("connection reset".to_string()));
            }
            self.inner.find_entries(query).await
        }

        async fn list_entries(&self, request: PageRequest) -> Result<Page<BalanceEntry>> {
            self.inner.list_entries(request).await
        }
    }

    /// Cache whose every operation fails.
    #[derive(Debug)]
    struct BrokenCache;

    #[async_trait]
    impl IndicatorCache for BrokenCache {
        async fn get(&self, _key: &CacheKey) -> Result<Option<IndicatorResult>> {
            Err(FizzError::Cache("unreachable".to_string()))
        }

        async fn put(&self, _key: &CacheKey, _result: &IndicatorResult) -> Result<()> {
            Err(FizzError::Cache("unreachable".to_string()))
        }

        async fn invalidate_company(&self, _cvm_code: CvmCode) -> Result<usize> {
            Err(FizzError::Cache("unreachable".to_string()))
        }

        async fn invalidate_stale(&self) -> Result<usize> {
            Err(FizzError::Cache("unreachable".to_string()))
        }

        async fn clear(&self) -> Result<()> {
            Err(FizzError::Cache("unreachable".to_string()))
        }
    }

    #[tokio::test]
    async fn test_debt_equity_ratio() {
        let d = date(2023, 12, 31);
        let store = store_with(
            &[1001],
            vec![
                bpp(1001, "Total Liabilities", d, 500.0),
                bpp(1001, "Total Equity", d, 250.0),
            ],
        )
        .await;

        let result = engine(&store)
            .debt_equity_ratio(CvmCode::new(1001), None)
            .await
            .unwrap();
        assert_eq!(result.value, 2.0);
        assert_eq!(result.inputs.len(), 2);
        assert_eq!(result.period_end(), Some(d));
    }

    #[tokio::test]
    async fn test_debt_equity_sums_liability_groups() {
        let old = date(2022, 12, 31);
        let d = date(2023, 12, 31);
        let store = store_with(
            &[9512],
            vec![
                bpp(9512, "Passivo Circulante", old, 1.0),
                bpp(9512, "Passivo Não Circulante", old, 1.0),
                bpp(9512, "Patrimônio Líquido Consolidado", old, 1.0),
                bpp(9512, "Passivo Circulante", d, 150.0),
                bpp(9512, "Passivo Não Circulante", d, 450.0),
                bpp(9512, "Patrimônio Líquido Consolidado", d, 400.0),
                bpp(9512, "Passivo Total", d, 1_000.0),
            ],
        )
        .await;
        let engine = engine(&store);

        let result = engine
            .debt_equity_ratio(CvmCode::new(9512), None)
            .await
            .unwrap();
        assert_eq!(result.value, 1.5);

        let earlier = engine
            .debt_equity_ratio(CvmCode::new(9512), Some(date(2023, 6, 30)))
            .await
            .unwrap();
        assert_eq!(earlier.value, 2.0);
        assert_eq!(earlier.period_end(), Some(old));
    }

    #[tokio::test]
    async fn test_zero_equity_is_undefined() {
        let d = date(2023, 12, 31);
        let store = store_with(
            &[1003],
            vec![
                bpp(1003, "Total Liabilities", d, 100.0),
                bpp(1003, "Total Equity", d, 0.0),
            ],
        )
        .await;

        let err = engine(&store)
            .debt_equity_ratio(CvmCode::new(1003), None)
            .await
            .unwrap_err();
        assert!(matches!(err, FizzError::Undefined { .. }));
    }

    #[tokio::test]
    async fn test_debt_equity_missing_side() {
        let d = date(2023, 12, 31);
        let store = store_with(
            &[1, 2],
            vec![
                bpp(1, "Total Equity", d, 100.0),
                bpp(2, "Passivo Circulante", d, 100.0),
                bpp(2, "Passivo Não Circulante", d, 100.0),
            ],
        )
        .await;
        let engine = engine(&store);

        for code in [1, 2] {
            let err = engine
                .debt_equity_ratio(CvmCode::new(code), None)
                .await
                .unwrap_err();
            assert_eq!(err.code(), "missing_data");
        }
    }

    #[tokio::test]
    async fn test_no_cash_flow_is_missing() {
        let store = store_with(&[1002], vec![dre(1002, date(2023, 12, 31), 10.0)]).await;
        let err = engine(&store)
            .net_cash_flow(CvmCode::new(1002), None)
            .await
            .unwrap_err();
        assert!(matches!(err, FizzError::MissingData { .. }));
    }

    #[tokio::test]
    async fn test_unknown_company_never_queries_balances() {
        let balances = Arc::new(CountingStore::default());
        let directory = store_with(&[1], Vec::new()).await;
        let engine = IndicatorEngine::new(balances.clone(), directory.clone())
            .with_prices(directory.clone());

        for kind in IndicatorKind::ALL {
            let err = engine
                .compute(kind, CvmCode::new(9999), None)
                .await
                .unwrap_err();
            assert_eq!(err, FizzError::CompanyNotFound(CvmCode::new(9999)));
        }
        let err = engine
            .return_on_equity(CvmCode::new(9999), None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "company_not_found");
        assert_eq!(balances.queries.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_return_on_equity_averages_equity() {
        let a = date(2022, 12, 31);
        let b = date(2023, 12, 31);
        let store = store_with(
            &[1004],
            vec![
                dre(1004, a, 80.0),
                bpp(1004, "Patrimônio Líquido Consolidado", a, 400.0),
                bpp(1004, "Patrimônio Líquido Consolidado", b, 600.0),
            ],
        )
        .await;

        let result = engine(&store)
            .return_on_equity(CvmCode::new(1004), None)
            .await
            .unwrap();
        assert!((result.value - 0.16).abs() < 1e-12);
        assert!(!result.low_confidence);
        assert_eq!(result.inputs.len(), 3);
    }

    #[tokio::test]
    async fn test_return_on_equity_single_period() {
        let a = date(2022, 12, 31);
        let store = store_with(
            &[7],
            vec![
                dre(7, a, 50.0),
                bpp(7, "Patrimônio Líquido Consolidado", a, 500.0),
                bpp(7, "Patrimônio Líquido Consolidado", date(2023, 12, 31), 700.0),
            ],
        )
        .await;

        let result = engine(&store)
            .return_on_equity(CvmCode::new(7), Some(date(2023, 1, 31)))
            .await
            .unwrap();
        assert_eq!(result.value, 0.1);
        assert!(result.low_confidence);
    }

    #[tokio::test]
    async fn test_return_on_equity_pairs_equity_with_income_period() {
        let store = store_with(
            &[1, 2],
            vec![
                // Company 1: income a decade older than any equity
                dre(1, date(2010, 12, 31), 80.0),
                bpp(1, "Patrimônio Líquido Consolidado", date(2022, 12, 31), 400.0),
                bpp(1, "Patrimônio Líquido Consolidado", date(2023, 12, 31), 600.0),
                // Company 2: beginning and ending equity of the income year
                dre(2, date(2022, 12, 31), 90.0),
                bpp(2, "Patrimônio Líquido Consolidado", date(2021, 12, 31), 200.0),
                bpp(2, "Patrimônio Líquido Consolidado", date(2022, 12, 31), 400.0),
                bpp(2, "Patrimônio Líquido Consolidado", date(2023, 12, 31), 900.0),
            ],
        )
        .await;
        let engine = engine(&store);

        let err = engine
            .return_on_equity(CvmCode::new(1), None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "missing_data");

        let result = engine
            .return_on_equity(CvmCode::new(2), None)
            .await
            .unwrap();
        assert_eq!(result.value, 0.3);
        assert!(!result.low_confidence);
        let periods: Vec<NaiveDate> = result.inputs.iter().map(|i| i.period_end).collect();
        assert_eq!(
            periods,
            vec![date(2022, 12, 31), date(2021, 12, 31), date(2022, 12, 31)]
        );
    }

    #[tokio::test]
    async fn test_return_on_equity_failures() {
        let a = date(2022, 12, 31);
        let store = store_with(
            &[1, 2, 3],
            vec![
                dre(1, a, 50.0),
                bpp(2, "Patrimônio Líquido Consolidado", a, 500.0),
                dre(3, a, 50.0),
                bpp(3, "Patrimônio Líquido Consolidado", a, 0.0),
            ],
        )
        .await;
        let engine = engine(&store);

        let no_equity = engine.return_on_equity(CvmCode::new(1), None).await;
        assert_eq!(no_equity.unwrap_err().code(), "missing_data");
        let no_income = engine.return_on_equity(CvmCode::new(2), None).await;
        assert_eq!(no_income.unwrap_err().code(), "missing_data");
        let zero_equity = engine.return_on_equity(CvmCode::new(3), None).await;
        assert_eq!(zero_equity.unwrap_err().code(), "undefined");
    }

    #[tokio::test]
    async fn test_price_to_earnings() {
        let code = CvmCode::new(9512);
        let store = store_with(&[9512], vec![dre(9512, date(2023, 12, 31), 124_606_000.0)]).await;
        store
            .upsert_quote(Quote::new(code, 38.1, 13_044_496_930.0, date(2024, 3, 1)))
            .await;

        let result = engine(&store)
            .price_to_earning_ratio(code, None)
            .await
            .unwrap();
        let eps = 124_606_000.0 * 1_000.0 / 13_044_496_930.0;
        let expected = 38.1 / eps;
        assert!(((result.value - expected) / expected).abs() < 1e-9);
        let quote = result.quote.as_ref().unwrap();
        assert_eq!(quote.price, 38.1);
        assert_eq!(quote.shares_outstanding, 13_044_496_930.0);
        assert_eq!(quote.quoted_on, date(2024, 3, 1));
    }

    #[tokio::test]
    async fn test_price_to_earnings_failures() {
        let d = date(2023, 12, 31);
        let store = store_with(
            &[1, 2, 3, 4, 5],
            vec![dre(2, d, 100.0), dre(3, d, -5.0), dre(4, d, 100.0), dre(5, date(2020, 12, 31), 100.0)],
        )
        .await;
        for code in [1, 3, 5] {
            store
                .upsert_quote(Quote::new(CvmCode::new(code), 10.0, 1_000.0, date(2024, 1, 2)))
                .await;
        }
        store
            .upsert_quote(Quote::new(CvmCode::new(4), 10.0, 0.0, date(2024, 1, 2)))
            .await;
        let engine = engine(&store);

        let cases = [
            (1, "missing_data"),
            (2, "missing_data"),
            (3, "undefined"),
            (4, "undefined"),
            (5, "missing_data"),
        ];
        for (code, expected) in cases {
            let err = engine
                .price_to_earning_ratio(CvmCode::new(code), None)
                .await
                .unwrap_err();
            assert_eq!(err.code(), expected, "company {code}");
        }

        // Window start before the first representable date
        store
            .upsert_quote(Quote::new(CvmCode::new(2), 10.0, 1_000.0, NaiveDate::MIN))
            .await;
        let err = engine
            .price_to_earning_ratio(CvmCode::new(2), Some(NaiveDate::MIN))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "invalid_parameter");

        let unpriced = IndicatorEngine::new(store.clone(), store.clone());
        let err = unpriced
            .price_to_earning_ratio(CvmCode::new(2), None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "not_configured");
    }

    #[tokio::test]
    async fn test_net_cash_flow_is_additive() {
        let d = date(2023, 12, 31);
        let (op, inv, fin) = (1_234.56, -789.01, -120.3);
        let store = store_with(
            &[1],
            vec![
                dfc(1, StatementType::CashFlowIndirect, "Caixa Líquido Atividades Operacionais", d, op),
                dfc(1, StatementType::CashFlowIndirect, "Caixa Líquido Atividades de Investimento", d, inv),
                dfc(1, StatementType::CashFlowIndirect, "Caixa Líquido Atividades de Financiamento", d, fin),
            ],
        )
        .await;

        let result = engine(&store)
            .net_cash_flow(CvmCode::new(1), None)
            .await
            .unwrap();
        assert_eq!(result.value, op + inv + fin);
        assert!(!result.partial);
        assert_eq!(result.unit(), fizz_core::Unit::Amount);
    }

    #[tokio::test]
    async fn test_net_cash_flow_partial_policy() {
        let d = date(2023, 12, 31);
        let entries = vec![
            dfc(1, StatementType::CashFlowIndirect, "Caixa Líquido Atividades Operacionais", d, 100.0),
            dfc(1, StatementType::CashFlowIndirect, "Caixa Líquido Atividades de Investimento", d, -40.0),
        ];
        let store = store_with(&[1], entries).await;

        let zero_fill = engine(&store)
            .net_cash_flow(CvmCode::new(1), None)
            .await
            .unwrap();
        assert_eq!(zero_fill.value, 60.0);
        assert!(zero_fill.partial);

        let strict = engine(&store)
            .with_config(EngineConfig {
                cash_flow_policy: CashFlowPolicy::Strict,
                ..EngineConfig::default()
            })
            .unwrap();
        let err = strict
            .net_cash_flow(CvmCode::new(1), None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "missing_data");
    }

    #[tokio::test]
    async fn test_net_cash_flow_statement_choice() {
        let old = date(2022, 12, 31);
        let d = date(2023, 12, 31);
        let store = store_with(
            &[1, 2],
            vec![
                // Company 1: direct method is more recent
                dfc(1, StatementType::CashFlowIndirect, "Caixa Líquido Atividades Operacionais", old, 1.0),
                dfc(1, StatementType::CashFlowDirect, "Caixa Líquido Atividades Operacionais", d, 7.0),
                // Company 2: same period in both, indirect wins
                dfc(2, StatementType::CashFlowIndirect, "Caixa Líquido Atividades Operacionais", d, 3.0),
                dfc(2, StatementType::CashFlowDirect, "Caixa Líquido Atividades Operacionais", d, 5.0),
            ],
        )
        .await;
        let engine = engine(&store);

        let first = engine.net_cash_flow(CvmCode::new(1), None).await.unwrap();
        assert_eq!(first.value, 7.0);
        assert_eq!(first.inputs[0].statement, StatementType::CashFlowDirect);

        let second = engine.net_cash_flow(CvmCode::new(2), None).await.unwrap();
        assert_eq!(second.value, 3.0);
        assert_eq!(second.inputs[0].statement, StatementType::CashFlowIndirect);
    }

    #[tokio::test]
    async fn test_net_cash_flow_unlabelled_statement() {
        let store = store_with(
            &[1],
            vec![dfc(1, StatementType::CashFlowIndirect, "Lucro Líquido", date(2023, 12, 31), 10.0)],
        )
        .await;
        let err = engine(&store)
            .net_cash_flow(CvmCode::new(1), None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "missing_data");
    }

    #[tokio::test]
    async fn test_synonym_labels_give_same_result() {
        let d = date(2023, 12, 31);
        let store = store_with(
            &[1, 2],
            vec![
                bpp(1, "Total Liabilities", d, 300.0),
                bpp(1, "Patrimônio Líquido Consolidado", d, 150.0),
                bpp(2, "Passivo Exigível", d, 300.0),
                bpp(2, "Total Equity", d, 150.0),
            ],
        )
        .await;
        let engine = engine(&store);

        let a = engine.debt_equity_ratio(CvmCode::new(1), None).await.unwrap();
        let b = engine.debt_equity_ratio(CvmCode::new(2), None).await.unwrap();
        assert_eq!(a.value, b.value);
        assert_eq!(
            a.inputs.iter().map(|i| i.item).collect::<Vec<_>>(),
            b.inputs.iter().map(|i| i.item).collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn test_idempotent() {
        let d = date(2023, 12, 31);
        let store = store_with(
            &[1],
            vec![
                dre(1, d, 80.0),
                bpp(1, "Total Equity", d, 400.0),
                bpp(1, "Total Liabilities", d, 1_000.0),
                dfc(1, StatementType::CashFlowIndirect, "Caixa Líquido Atividades Operacionais", d, 0.1),
                dfc(1, StatementType::CashFlowIndirect, "Caixa Líquido Atividades de Investimento", d, 0.2),
                dfc(1, StatementType::CashFlowIndirect, "Caixa Líquido Atividades de Financiamento", d, -0.7),
            ],
        )
        .await;
        store
            .upsert_quote(Quote::new(CvmCode::new(1), 7.3, 3_000.0, date(2024, 3, 1)))
            .await;
        let engine = engine(&store);

        for kind in IndicatorKind::ALL {
            let first = engine.compute(kind, CvmCode::new(1), None).await.unwrap();
            let second = engine.compute(kind, CvmCode::new(1), None).await.unwrap();
            assert_eq!(first.value.to_bits(), second.value.to_bits());
            assert_eq!(first, second);
        }
    }

    #[tokio::test]
    async fn test_store_fault_propagates() {
        let directory = store_with(&[1], Vec::new()).await;
        let balances = Arc::new(CountingStore {
            fail: true,
            ..CountingStore::default()
        });
        let engine = IndicatorEngine::new(balances, directory);

        let err = engine
            .debt_equity_ratio(CvmCode::new(1), None)
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(err.code(), "store_unavailable");
    }

    #[tokio::test]
    async fn test_cache_serves_and_invalidates() {
        let d = date(2023, 12, 31);
        let balances = Arc::new(CountingStore::default());
        balances
            .inner
            .upsert_entries([
                bpp(1, "Total Liabilities", d, 500.0),
                bpp(1, "Total Equity", d, 250.0),
            ])
            .await;
        let directory = store_with(&[1], Vec::new()).await;
        let engine = IndicatorEngine::new(balances.clone(), directory)
            .with_cache(Arc::new(InMemoryCache::default()));

        let first = engine.debt_equity_ratio(CvmCode::new(1), None).await.unwrap();
        let queries = balances.queries.load(Ordering::SeqCst);
        let second = engine.debt_equity_ratio(CvmCode::new(1), None).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(balances.queries.load(Ordering::SeqCst), queries);

        // Re-filing plus invalidation is visible on the next call
        balances
            .inner
            .upsert_entry(bpp(1, "Total Equity", d, 500.0))
            .await;
        assert_eq!(engine.invalidate(&[CvmCode::new(1)]).await.unwrap(), 1);
        let third = engine.debt_equity_ratio(CvmCode::new(1), None).await.unwrap();
        assert_eq!(third.value, 1.0);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let store = store_with(&[1], Vec::new()).await;
        let cache = Arc::new(InMemoryCache::default());
        let engine = engine(&store).with_cache(cache.clone());

        assert!(engine.net_cash_flow(CvmCode::new(1), None).await.is_err());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_broken_cache_is_bypassed() {
        let d = date(2023, 12, 31);
        let store = store_with(
            &[1],
            vec![
                bpp(1, "Total Liabilities", d, 500.0),
                bpp(1, "Total Equity", d, 250.0),
            ],
        )
        .await;
        let engine = engine(&store).with_cache(Arc::new(BrokenCache));

        let result = engine.debt_equity_ratio(CvmCode::new(1), None).await.unwrap();
        assert_eq!(result.value, 2.0);
        assert_eq!(engine.invalidate(&[CvmCode::new(1)]).await.unwrap_err().code(), "cache");
    }

    #[tokio::test]
    async fn test_with_config_line_items() {
        let d = date(2023, 12, 31);
        let store = store_with(
            &[1],
            vec![bpp(1, "Exigível", d, 30.0), bpp(1, "PL", d, 10.0)],
        )
        .await;

        let config = EngineConfig::from_json_str(
            r#"{ "line_items": [
                { "statement": "BPP", "subcategory": "Exigível", "item": "total_liabilities" },
                { "statement": "BPP", "subcategory": "PL", "item": "total_equity" }
            ] }"#,
        )
        .unwrap();
        let engine = engine(&store).with_config(config).unwrap();

        let result = engine.debt_equity_ratio(CvmCode::new(1), None).await.unwrap();
        assert_eq!(result.value, 3.0);
    }

    #[tokio::test]
    async fn test_with_line_items() {
        let d = date(2023, 12, 31);
        let store = store_with(
            &[1],
            vec![
                bpp(1, "Dívidas Totais", d, 90.0),
                bpp(1, "Capital Próprio", d, 30.0),
                bpp(1, "Total Liabilities", d, 10.0),
                bpp(1, "Total Equity", d, 10.0),
            ],
        )
        .await;

        let table = LineItemTable::from_rules(vec![
            LineItemRule::new(
                StatementType::BalanceSheetLiabilities,
                "Dívidas Totais",
                LineItem::TotalLiabilities,
            ),
            LineItemRule::new(
                StatementType::BalanceSheetLiabilities,
                "Capital Próprio",
                LineItem::TotalEquity,
            ),
        ])
        .unwrap();
        let engine = engine(&store).with_line_items(table);
        assert_eq!(engine.line_items().rules().len(), 2);

        let result = engine.debt_equity_ratio(CvmCode::new(1), None).await.unwrap();
        assert_eq!(result.value, 3.0);
        assert_eq!(result.inputs[0].subcategory, "Dívidas Totais");
    }
}
