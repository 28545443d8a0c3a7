#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/modsim/fizz/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Caching implementations for computed indicators.
//!
//! This crate provides implementations of the [`IndicatorCache`] trait from `fizz-core`:
//!
//! - [`InMemoryCache`] - TTL-bounded in-memory cache
//! - [`NoopCache`] - No-op cache that doesn't store anything

/// In-memory cache implementation.
pub mod memory;
/// No-op cache implementation.
pub mod noop;

// Re-export the trait for convenience
pub use fizz_core::IndicatorCache;

// Re-export implementations
pub use memory::InMemoryCache;
pub use noop::NoopCache;
