#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/modsim/fizz/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Fundamental indicators over CVM financial statements.
//!
//! This crate re-exports the core types, store and cache implementations and
//! the [`IndicatorEngine`].
//!
//! # Features
//!
//! - `sqlite` - SQLite-backed store, [`open_sqlite`] and [`SqliteIngest`] (default)
//!
//! # Example
//!
//! ```rust,ignore
//! use fizz::{CvmCode, EngineConfig};
//!
//! #[tokio::main]
//! async fn main() -> fizz::Result<()> {
//!     let (engine, ingest) = fizz::open_sqlite("fizz.db", EngineConfig::default())?;
//!     ingest.upsert_entries(&load_filings()?).await?;
//!
//!     let roe = engine.return_on_equity(CvmCode::new(9512), None).await?;
//!     println!("ROE {:.2}% (low confidence: {})", roe.value * 100.0, roe.low_confidence);
//!
//!     Ok(())
//! }
//! ```

#[cfg(feature = "sqlite")]
mod ingest;

// Core types and traits
pub use fizz_core::*;

// Cache implementations
pub use fizz_cache::{InMemoryCache, NoopCache};

// Stores
#[cfg(feature = "sqlite")]
pub use fizz_store::SqliteStore;
#[cfg(feature = "sqlite")]
pub use ingest::SqliteIngest;
pub use fizz_store::InMemoryStore;

// Engine
pub use fizz_indicators::{
    CashFlowPolicy, EngineConfig, IndicatorEngine, LineItemMatch, LineItemRule, LineItemTable,
    MAX_EARNINGS_LOOKBACK_DAYS, STATUS_OK, default_rules,
};

#[cfg(feature = "sqlite")]
use std::{path::Path, sync::Arc};

/// Opens a SQLite database and wires an engine to it.
///
/// The store serves as balance store, company directory and price source,
/// and results are cached in memory for [`EngineConfig::cache_ttl_secs`].
/// Filings and quotes are loaded through the returned [`SqliteIngest`],
/// which drops the cached results of every company it writes.
///
/// # Errors
/// Returns an error if the database cannot be opened or the configuration is
/// invalid.
#[cfg(feature = "sqlite")]
pub fn open_sqlite(
    path: impl AsRef<Path>,
    config: EngineConfig,
) -> Result<(IndicatorEngine, SqliteIngest)> {
    let store = Arc::new(SqliteStore::new(path)?);
    let cache = Arc::new(InMemoryCache::new(config.cache_ttl()));
    let engine = IndicatorEngine::new(store.clone(), store.clone())
        .with_prices(store.clone())
        .with_cache(cache.clone())
        .with_config(config)?;
    tracing::debug!(?engine, "Opened SQLite indicator engine");
    Ok((engine, SqliteIngest::new(store, cache)))
}
