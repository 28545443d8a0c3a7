//! Error types for store access and indicator computation.
//!
//! This module defines [`FizzError`] which covers every failure an indicator
//! call can surface: unknown companies, missing line items, undefined ratios
//! and faults of the underlying stores.

use thiserror::Error;

use crate::types::CvmCode;

/// Errors that can occur while reading statements or computing indicators.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FizzError {
    /// The company code has no entry in the company directory.
    #[error("Company not found: {0}")]
    CompanyNotFound(CvmCode),

    /// A line item (or quote) required by a formula is absent.
    #[error("Missing data for company {cvm_code}: {detail}")]
    MissingData {
        /// The company the indicator was requested for.
        cvm_code: CvmCode,
        /// What could not be found.
        detail: String,
    },

    /// The formula is not meaningful for the data at hand (e.g. zero denominator).
    #[error("Indicator undefined for company {cvm_code}: {detail}")]
    Undefined {
        /// The company the indicator was requested for.
        cvm_code: CvmCode,
        /// Why the value is undefined.
        detail: String,
    },

    /// The balance store, company directory or price source failed to answer.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Error interacting with the indicator cache.
    #[error("Cache error: {0}")]
    Cache(String),

    /// Error parsing stored or configured data.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid configuration (e.g. conflicting line-item rules).
    #[error("Configuration error: {0}")]
    Config(String),

    /// An invalid parameter was provided.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// A collaborator required by the operation was not configured.
    #[error("Not configured: {0}")]
    NotConfigured(String),
}

impl FizzError {
    /// Shorthand for [`FizzError::MissingData`].
    pub fn missing(cvm_code: CvmCode, detail: impl Into<String>) -> Self {
        Self::MissingData {
            cvm_code,
            detail: detail.into(),
        }
    }

    /// Shorthand for [`FizzError::Undefined`].
    pub fn undefined(cvm_code: CvmCode, detail: impl Into<String>) -> Self {
        Self::Undefined {
            cvm_code,
            detail: detail.into(),
        }
    }

    /// Returns true if a caller may retry the operation with backoff.
    ///
    /// Only store faults are transient; absent or undefined data stays absent
    /// until new filings are ingested.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }

    /// Stable identifier of the error kind, suitable for mapping to a status
    /// at an outer boundary.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::CompanyNotFound(_) => "company_not_found",
            Self::MissingData { .. } => "missing_data",
            Self::Undefined { .. } => "undefined",
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::Cache(_) => "cache",
            Self::Parse(_) => "parse",
            Self::Config(_) => "config",
            Self::InvalidParameter(_) => "invalid_parameter",
            Self::NotConfigured(_) => "not_configured",
        }
    }
}

/// Result type alias using [`FizzError`].
pub type Result<T> = std::result::Result<T, FizzError>;
