//! Paged listing of stored records.

use serde::{Deserialize, Serialize};

use crate::error::{FizzError, Result};

/// Largest page size a store will serve.
pub const MAX_PAGE_SIZE: usize = 2_000;

/// A request for one page of records.
///
/// Pages are zero-based.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageRequest {
    /// Zero-based page index.
    pub page: usize,
    /// Number of records per page.
    pub size: usize,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { page: 0, size: 20 }
    }
}

impl PageRequest {
    /// Creates a page request, rejecting empty and oversized pages.
    pub fn new(page: usize, size: usize) -> Result<Self> {
        if size == 0 || size > MAX_PAGE_SIZE {
            return Err(FizzError::InvalidParameter(format!(
                "page size must be between 1 and {}, got {}",
                MAX_PAGE_SIZE, size
            )));
        }
        Ok(Self { page, size })
    }

    /// Number of records preceding this page.
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.page.saturating_mul(self.size)
    }
}

/// One page of records plus the total number of records available.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Records on this page.
    pub items: Vec<T>,
    /// The request that produced this page.
    pub request: PageRequest,
    /// Total number of records across all pages.
    pub total: usize,
}

impl<T> Page<T> {
    /// Builds a page by slicing an already ordered collection.
    #[must_use]
    pub fn from_sorted(all: Vec<T>, request: PageRequest) -> Self {
        let total = all.len();
        let items = all
            .into_iter()
            .skip(request.offset())
            .take(request.size)
            .collect();
        Self {
            items,
            request,
            total,
        }
    }

    /// Total number of pages for the request's page size.
    #[must_use]
    pub const fn total_pages(&self) -> usize {
        if self.request.size == 0 {
            return 0;
        }
        self.total.div_ceil(self.request.size)
    }

    /// Returns true if a page follows this one.
    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.request.page + 1 < self.total_pages()
    }
}
