//! Financial statement kinds and accounting period ranges.
//!
//! This module defines [`StatementType`] for the statements a CVM filing is
//! split into and [`PeriodRange`] for restricting lookups to a window of
//! period end dates.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::FizzError;

/// Kind of financial statement a balance entry belongs to.
///
/// Variants follow the statement codes used by the CVM DFP/ITR datasets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StatementType {
    /// Balance sheet, assets side (`BPA`).
    #[serde(rename = "BPA")]
    BalanceSheetAssets,
    /// Balance sheet, liabilities and equity side (`BPP`).
    #[serde(rename = "BPP")]
    BalanceSheetLiabilities,
    /// Income statement (`DRE`).
    #[serde(rename = "DRE")]
    IncomeStatement,
    /// Comprehensive income statement (`DRA`).
    #[serde(rename = "DRA")]
    ComprehensiveIncome,
    /// Cash flow statement, direct method (`DFC_MD`).
    #[serde(rename = "DFC_MD")]
    CashFlowDirect,
    /// Cash flow statement, indirect method (`DFC_MI`).
    #[serde(rename = "DFC_MI")]
    CashFlowIndirect,
    /// Statement of changes in equity (`DMPL`).
    #[serde(rename = "DMPL")]
    ChangesInEquity,
    /// Value added statement (`DVA`).
    #[serde(rename = "DVA")]
    ValueAdded,
}

impl StatementType {
    /// All statement types, in code order.
    pub const ALL: [Self; 8] = [
        Self::BalanceSheetAssets,
        Self::BalanceSheetLiabilities,
        Self::IncomeStatement,
        Self::ComprehensiveIncome,
        Self::CashFlowDirect,
        Self::CashFlowIndirect,
        Self::ChangesInEquity,
        Self::ValueAdded,
    ];

    /// Returns the CVM code of this statement (e.g. `"DRE"`).
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::BalanceSheetAssets => "BPA",
            Self::BalanceSheetLiabilities => "BPP",
            Self::IncomeStatement => "DRE",
            Self::ComprehensiveIncome => "DRA",
            Self::CashFlowDirect => "DFC_MD",
            Self::CashFlowIndirect => "DFC_MI",
            Self::ChangesInEquity => "DMPL",
            Self::ValueAdded => "DVA",
        }
    }

    /// Returns true for either side of the balance sheet.
    #[must_use]
    pub const fn is_balance_sheet(&self) -> bool {
        matches!(self, Self::BalanceSheetAssets | Self::BalanceSheetLiabilities)
    }

    /// Returns true for either cash flow method.
    #[must_use]
    pub const fn is_cash_flow(&self) -> bool {
        matches!(self, Self::CashFlowDirect | Self::CashFlowIndirect)
    }
}

impl fmt::Display for StatementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for StatementType {
    type Err = FizzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|st| st.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| FizzError::Parse(format!("Invalid statement type: {}", s)))
    }
}

/// Inclusive range of accounting period end dates.
///
/// Either bound may be open.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeriodRange {
    /// Earliest period end date accepted.
    pub start: Option<NaiveDate>,
    /// Latest period end date accepted.
    pub end: Option<NaiveDate>,
}

impl PeriodRange {
    /// A range with both bounds open.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            start: None,
            end: None,
        }
    }

    /// A range accepting every period ending on or before `end`.
    #[must_use]
    pub const fn up_to(end: NaiveDate) -> Self {
        Self {
            start: None,
            end: Some(end),
        }
    }

    /// A closed range `[start, end]`.
    #[must_use]
    pub const fn between(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    /// Returns true if `date` falls inside the range.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.is_none_or(|s| date >= s) && self.end.is_none_or(|e| date <= e)
    }
}
