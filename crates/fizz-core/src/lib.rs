#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/modsim/fizz/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Core traits and types for CVM financial statements.
//!
//! This crate provides the foundational abstractions shared by the stores,
//! the cache and the indicator engine:
//!
//! - [`BalanceStore`](store::BalanceStore) - Filed statement line items
//! - [`CompanyDirectory`](store::CompanyDirectory) - Company register
//! - [`PriceSource`](store::PriceSource) - Market quotes
//! - [`IndicatorCache`](cache::IndicatorCache) - Caching abstraction
//! - [`FizzError`](error::FizzError) - Error taxonomy

/// Cache trait and key for computed indicators.
pub mod cache;
/// Error types for store access and indicator computation.
pub mod error;
/// Indicator kinds, line items and results.
pub mod indicator;
/// Paged listing types.
pub mod page;
/// Statement types and period ranges.
pub mod statement;
/// Collaborator traits for reading stored data.
pub mod store;
/// Core data types (CvmCode, BalanceEntry, Company, Quote).
pub mod types;

// Re-export commonly used items at crate root
pub use cache::{CacheKey, IndicatorCache};
pub use error::{FizzError, Result};
pub use indicator::{IndicatorKind, IndicatorResult, LineItem, ResolvedInput, Unit};
pub use page::{Page, PageRequest};
pub use statement::{PeriodRange, StatementType};
pub use store::{BalanceStore, CompanyDirectory, EntryQuery, PriceSource};
pub use types::{Address, Auditor, BalanceEntry, Company, CvmCode, Quote, Situation};
