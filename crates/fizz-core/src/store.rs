//! Read interfaces the indicator engine consumes.
//!
//! This module defines the collaborator traits:
//!
//! - [`BalanceStore`] - Statement line items by company, statement and period
//! - [`CompanyDirectory`] - Company register lookups
//! - [`PriceSource`] - Market quotes for valuation ratios

use async_trait::async_trait;
use chrono::NaiveDate;
use std::fmt::Debug;

use crate::{
    error::Result,
    page::{Page, PageRequest},
    statement::{PeriodRange, StatementType},
    types::{BalanceEntry, Company, CvmCode, Quote},
};

/// Filter for [`BalanceStore::find_entries`].
///
/// Only the company is mandatory; every other field narrows the result when set.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EntryQuery {
    /// Company to read entries for.
    pub cvm_code: CvmCode,
    /// Restrict to one statement.
    pub statement: Option<StatementType>,
    /// Restrict to an exact category label.
    pub category: Option<String>,
    /// Restrict to an exact subcategory label.
    pub subcategory: Option<String>,
    /// Restrict to a window of period end dates.
    pub period: PeriodRange,
}

impl EntryQuery {
    /// Matches every entry of a company.
    #[must_use]
    pub const fn company(cvm_code: CvmCode) -> Self {
        Self {
            cvm_code,
            statement: None,
            category: None,
            subcategory: None,
            period: PeriodRange::all(),
        }
    }

    /// Restricts the query to one statement.
    #[must_use]
    pub const fn statement(mut self, statement: StatementType) -> Self {
        self.statement = Some(statement);
        self
    }

    /// Restricts the query to a category label.
    #[must_use]
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Restricts the query to a subcategory label.
    #[must_use]
    pub fn subcategory(mut self, subcategory: impl Into<String>) -> Self {
        self.subcategory = Some(subcategory.into());
        self
    }

    /// Restricts the query to a period window.
    #[must_use]
    pub const fn period(mut self, period: PeriodRange) -> Self {
        self.period = period;
        self
    }

    /// Returns true if `entry` satisfies every filter of this query.
    #[must_use]
    pub fn matches(&self, entry: &BalanceEntry) -> bool {
        entry.cvm_code == self.cvm_code
            && self.statement.is_none_or(|s| s == entry.statement)
            && self
                .category
                .as_deref()
                .is_none_or(|c| c == entry.category)
            && self
                .subcategory
                .as_deref()
                .is_none_or(|s| s == entry.subcategory)
            && self.period.contains(entry.period_end)
    }
}

/// Source of filed statement line items.
#[async_trait]
pub trait BalanceStore: Send + Sync + Debug {
    /// Returns every entry matching `query`, ordered by period end ascending.
    ///
    /// An empty result is not an error.
    async fn find_entries(&self, query: &EntryQuery) -> Result<Vec<BalanceEntry>>;

    /// Lists all entries one page at a time, ordered by company, statement
    /// code, period end, category and subcategory.
    async fn list_entries(&self, request: PageRequest) -> Result<Page<BalanceEntry>>;
}

/// Source of company register information.
#[async_trait]
pub trait CompanyDirectory: Send + Sync + Debug {
    /// Looks up a company by its CVM code.
    async fn find_company(&self, cvm_code: CvmCode) -> Result<Option<Company>>;

    /// Lists all companies one page at a time, ordered by CVM code.
    async fn list_companies(&self, request: PageRequest) -> Result<Page<Company>>;
}

/// Source of market quotes.
#[async_trait]
pub trait PriceSource: Send + Sync + Debug {
    /// Returns the latest quote for a company quoted on or before `as_of`
    /// (any date when `None`).
    async fn latest_quote(&self, cvm_code: CvmCode, as_of: Option<NaiveDate>)
    -> Result<Option<Quote>>;
}
