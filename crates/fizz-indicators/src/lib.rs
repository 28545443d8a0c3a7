#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/modsim/fizz/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Fundamental indicator engine.
//!
//! - [`IndicatorEngine`] - Computes P/E, D/E, net cash flow and ROE
//! - [`LineItemTable`] - Exact-match synonym table for filed labels
//! - [`EngineConfig`] - Lookback, cache TTL, cash flow policy and scale

/// Engine configuration.
pub mod config;
/// The indicator engine.
pub mod engine;
/// Line item synonym table.
pub mod line_items;
/// Batch report.
pub mod report;

mod resolve;

pub use config::{CashFlowPolicy, EngineConfig, MAX_EARNINGS_LOOKBACK_DAYS};
pub use engine::IndicatorEngine;
pub use line_items::{LineItemMatch, LineItemRule, LineItemTable, default_rules};
pub use report::STATUS_OK;
