#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/modsim/fizz/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Store implementations for CVM statements, companies and quotes.
//!
//! Every store here implements [`BalanceStore`], [`CompanyDirectory`] and
//! [`PriceSource`] from `fizz-core`:
//!
//! - [`SqliteStore`] - Persistent SQLite-backed store (default, requires `sqlite` feature)
//! - [`InMemoryStore`] - Map-backed store for tests and small datasets

/// In-memory store implementation.
pub mod memory;

/// SQLite-based store implementation.
#[cfg(feature = "sqlite")]
pub mod sqlite;

// Re-export the traits for convenience
pub use fizz_core::{BalanceStore, CompanyDirectory, PriceSource};

// Re-export implementations
pub use memory::InMemoryStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
