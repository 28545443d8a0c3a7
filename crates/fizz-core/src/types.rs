//! Core data types for CVM issuers and their statements.
//!
//! This module defines the records read by the indicator engine:
//!
//! - [`CvmCode`] - Regulator-assigned company identifier
//! - [`BalanceEntry`] - One accounting line item of one statement and period
//! - [`Company`] - Company register information
//! - [`Quote`] - Market price snapshot used by valuation ratios

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::FizzError;
use crate::statement::StatementType;

/// A CVM company code.
///
/// Codes are globally unique and never reused.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CvmCode(u32);

impl CvmCode {
    /// Creates a code from its numeric value.
    #[must_use]
    pub const fn new(code: u32) -> Self {
        Self(code)
    }

    /// Returns the numeric value of the code.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for CvmCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CvmCode {
    type Err = FizzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u32>()
            .map(Self)
            .map_err(|e| FizzError::Parse(format!("Invalid CVM code {:?}: {}", s, e)))
    }
}

impl From<u32> for CvmCode {
    fn from(code: u32) -> Self {
        Self(code)
    }
}

/// One accounting line item as filed by a company.
///
/// At most one entry exists per (company, statement, category, subcategory,
/// period end); a re-filing overwrites the previous value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BalanceEntry {
    /// Company the entry belongs to.
    pub cvm_code: CvmCode,
    /// Company tax id (CNPJ), denormalised.
    pub cnpj: Option<String>,
    /// Company display name, denormalised.
    pub company_name: Option<String>,
    /// Statement the line item is part of.
    pub statement: StatementType,
    /// Upper level of the account classification.
    pub category: String,
    /// Account label.
    pub subcategory: String,
    /// Closing date of the accounting period.
    pub period_end: NaiveDate,
    /// Reported amount, if any was filed.
    pub value: Option<f64>,
}

impl BalanceEntry {
    /// Creates an entry with a value and no denormalised company fields.
    #[must_use]
    pub fn new(
        cvm_code: CvmCode,
        statement: StatementType,
        category: impl Into<String>,
        subcategory: impl Into<String>,
        period_end: NaiveDate,
        value: Option<f64>,
    ) -> Self {
        Self {
            cvm_code,
            cnpj: None,
            company_name: None,
            statement,
            category: category.into(),
            subcategory: subcategory.into(),
            period_end,
            value,
        }
    }

    /// Sets the denormalised company tax id and name.
    #[must_use]
    pub fn with_company(mut self, cnpj: impl Into<String>, name: impl Into<String>) -> Self {
        self.cnpj = Some(cnpj.into());
        self.company_name = Some(name.into());
        self
    }

    /// Returns true if `other` occupies the same unique slot as this entry.
    #[must_use]
    pub fn same_slot(&self, other: &Self) -> bool {
        self.cvm_code == other.cvm_code
            && self.statement == other.statement
            && self.category == other.category
            && self.subcategory == other.subcategory
            && self.period_end == other.period_end
    }
}

/// Registration situation of a company.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Situation {
    /// Registration is active.
    #[default]
    Active,
    /// Registration was cancelled.
    Cancelled,
    /// Any other situation reported by the regulator.
    Other(String),
}

impl FromStr for Situation {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_uppercase().as_str() {
            "ATIVO" | "ACTIVE" => Self::Active,
            "CANCELADA" | "CANCELADO" | "CANCELLED" => Self::Cancelled,
            other => Self::Other(other.to_string()),
        })
    }
}

/// Registered address of a company or of its investor-relations officer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// Street and number.
    pub street: Option<String>,
    /// Address complement.
    pub complement: Option<String>,
    /// Neighbourhood.
    pub neighborhood: Option<String>,
    /// City.
    pub city: Option<String>,
    /// State.
    pub state: Option<String>,
    /// Country.
    pub country: Option<String>,
    /// Postal code.
    pub zip: Option<String>,
    /// Phone number.
    pub phone: Option<String>,
    /// Contact e-mail.
    pub email: Option<String>,
}

/// Independent auditor of a company.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Auditor {
    /// Auditor name.
    pub name: String,
    /// Auditor tax id (CNPJ).
    pub cnpj: Option<String>,
}

/// Company register information.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Company {
    /// CVM code.
    pub cvm_code: CvmCode,
    /// Tax id (CNPJ).
    pub cnpj: String,
    /// Legal name (denominação social).
    pub legal_name: String,
    /// Trade name (denominação comercial).
    pub trade_name: Option<String>,
    /// Activity sector.
    pub sector: Option<String>,
    /// Market segment.
    pub market: Option<String>,
    /// Listing category.
    pub category: Option<String>,
    /// Registration situation.
    pub situation: Situation,
    /// Date of registration with the regulator.
    pub register_date: Option<NaiveDate>,
    /// Date the registration was cancelled.
    pub cancellation_date: Option<NaiveDate>,
    /// Reason for the cancellation.
    pub cancellation_reason: Option<String>,
    /// Registered address.
    pub address: Option<Address>,
    /// Independent auditor.
    pub auditor: Option<Auditor>,
}

impl Company {
    /// Creates an active company with required fields.
    #[must_use]
    pub fn new(cvm_code: CvmCode, cnpj: impl Into<String>, legal_name: impl Into<String>) -> Self {
        Self {
            cvm_code,
            cnpj: cnpj.into(),
            legal_name: legal_name.into(),
            trade_name: None,
            sector: None,
            market: None,
            category: None,
            situation: Situation::Active,
            register_date: None,
            cancellation_date: None,
            cancellation_reason: None,
            address: None,
            auditor: None,
        }
    }

    /// Sets the trade name.
    #[must_use]
    pub fn with_trade_name(mut self, trade_name: impl Into<String>) -> Self {
        self.trade_name = Some(trade_name.into());
        self
    }

    /// Sets the sector.
    #[must_use]
    pub fn with_sector(mut self, sector: impl Into<String>) -> Self {
        self.sector = Some(sector.into());
        self
    }

    /// Sets the market segment.
    #[must_use]
    pub fn with_market(mut self, market: impl Into<String>) -> Self {
        self.market = Some(market.into());
        self
    }

    /// Marks the registration as cancelled.
    #[must_use]
    pub fn cancelled(mut self, date: NaiveDate, reason: impl Into<String>) -> Self {
        self.situation = Situation::Cancelled;
        self.cancellation_date = Some(date);
        self.cancellation_reason = Some(reason.into());
        self
    }

    /// Returns true if the registration is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.situation == Situation::Active
    }
}

/// Market price snapshot for a company's security.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Company the quote refers to.
    pub cvm_code: CvmCode,
    /// Price per share, in the reporting currency.
    pub price: f64,
    /// Shares outstanding at the quote date.
    pub shares_outstanding: f64,
    /// Date of the price.
    pub quoted_on: NaiveDate,
}

impl Quote {
    /// Creates a new quote.
    #[must_use]
    pub const fn new(
        cvm_code: CvmCode,
        price: f64,
        shares_outstanding: f64,
        quoted_on: NaiveDate,
    ) -> Self {
        Self {
            cvm_code,
            price,
            shares_outstanding,
            quoted_on,
        }
    }

    /// Market capitalisation implied by the quote.
    #[must_use]
    pub fn market_cap(&self) -> f64 {
        self.price * self.shares_outstanding
    }
}
