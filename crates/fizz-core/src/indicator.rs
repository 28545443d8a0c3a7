//! Indicator kinds, canonical line items and computed results.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::FizzError;
use crate::statement::StatementType;
use crate::types::{CvmCode, Quote};

/// A fundamental indicator the engine can compute.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorKind {
    /// Price-to-earnings ratio.
    PriceToEarnings,
    /// Total liabilities over total equity.
    DebtToEquity,
    /// Sum of operating, investing and financing cash flows.
    NetCashFlow,
    /// Net income over average equity.
    ReturnOnEquity,
}

impl IndicatorKind {
    /// All indicator kinds.
    pub const ALL: [Self; 4] = [
        Self::PriceToEarnings,
        Self::DebtToEquity,
        Self::NetCashFlow,
        Self::ReturnOnEquity,
    ];

    /// Short identifier (e.g. `"pe_ratio"`).
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::PriceToEarnings => "pe_ratio",
            Self::DebtToEquity => "debt_to_equity",
            Self::NetCashFlow => "net_cash_flow",
            Self::ReturnOnEquity => "roe",
        }
    }

    /// Whether the indicator is a dimensionless ratio or a currency amount.
    #[must_use]
    pub const fn unit(&self) -> Unit {
        match self {
            Self::NetCashFlow => Unit::Amount,
            _ => Unit::Ratio,
        }
    }
}

impl fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for IndicatorKind {
    type Err = FizzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| FizzError::Parse(format!("Unknown indicator: {}", s)))
    }
}

/// Unit of an indicator value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    /// Dimensionless ratio.
    Ratio,
    /// Amount in the statement's reporting currency.
    Amount,
}

/// Canonical accounting line item, independent of the label a filing uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineItem {
    /// Total assets.
    TotalAssets,
    /// Total liabilities, excluding equity.
    TotalLiabilities,
    /// Current liabilities.
    CurrentLiabilities,
    /// Non-current liabilities.
    NoncurrentLiabilities,
    /// Shareholders' equity.
    TotalEquity,
    /// Net income (loss) for the period.
    NetIncome,
    /// Net cash from operating activities.
    OperatingCashFlow,
    /// Net cash from investing activities.
    InvestingCashFlow,
    /// Net cash from financing activities.
    FinancingCashFlow,
}

impl LineItem {
    /// Statements on which this item is filed.
    #[must_use]
    pub const fn statements(&self) -> &'static [StatementType] {
        match self {
            Self::TotalAssets => &[StatementType::BalanceSheetAssets],
            Self::TotalLiabilities
            | Self::CurrentLiabilities
            | Self::NoncurrentLiabilities
            | Self::TotalEquity => &[StatementType::BalanceSheetLiabilities],
            Self::NetIncome => &[StatementType::IncomeStatement],
            Self::OperatingCashFlow | Self::InvestingCashFlow | Self::FinancingCashFlow => &[
                StatementType::CashFlowIndirect,
                StatementType::CashFlowDirect,
            ],
        }
    }
}

impl fmt::Display for LineItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::TotalAssets => "total assets",
            Self::TotalLiabilities => "total liabilities",
            Self::CurrentLiabilities => "current liabilities",
            Self::NoncurrentLiabilities => "non-current liabilities",
            Self::TotalEquity => "total equity",
            Self::NetIncome => "net income",
            Self::OperatingCashFlow => "operating cash flow",
            Self::InvestingCashFlow => "investing cash flow",
            Self::FinancingCashFlow => "financing cash flow",
        };
        f.write_str(name)
    }
}

/// A stored value that went into an indicator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResolvedInput {
    /// Canonical item the value stands for.
    pub item: LineItem,
    /// Statement the value was read from.
    pub statement: StatementType,
    /// Category label as filed.
    pub category: String,
    /// Subcategory label as filed.
    pub subcategory: String,
    /// Period end of the value.
    pub period_end: NaiveDate,
    /// The value used.
    pub value: f64,
}

/// A computed indicator with the inputs it was derived from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndicatorResult {
    /// Company the indicator was computed for.
    pub cvm_code: CvmCode,
    /// Which indicator this is.
    pub kind: IndicatorKind,
    /// The computed value; always finite.
    pub value: f64,
    /// Line items and periods used.
    pub inputs: Vec<ResolvedInput>,
    /// Market quote used, for valuation ratios.
    pub quote: Option<Quote>,
    /// Some components were absent and counted as zero.
    pub partial: bool,
    /// Computed from fewer periods than the formula calls for.
    pub low_confidence: bool,
}

impl IndicatorResult {
    /// Creates a result with no flags set.
    #[must_use]
    pub fn new(
        cvm_code: CvmCode,
        kind: IndicatorKind,
        value: f64,
        inputs: Vec<ResolvedInput>,
    ) -> Self {
        Self {
            cvm_code,
            kind,
            value,
            inputs,
            quote: None,
            partial: false,
            low_confidence: false,
        }
    }

    /// Unit of [`Self::value`].
    #[must_use]
    pub const fn unit(&self) -> Unit {
        self.kind.unit()
    }

    /// Latest period end among the inputs.
    #[must_use]
    pub fn period_end(&self) -> Option<NaiveDate> {
        self.inputs.iter().map(|i| i.period_end).max()
    }
}
