//! Pagination utilities for the review view
//!
//! Out-of-range pages are clamped, never rejected.

use std::ops::Range;

/// Page size used when none is requested
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Largest page size accepted from callers
pub const MAX_PAGE_SIZE: usize = 500;

/// Page sizes offered by the dashboard
pub const PAGE_SIZE_CHOICES: [usize; 3] = [10, 25, 50];

/// Pagination metadata calculated from total results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Current page number (1-indexed)
    pub page: usize,
    /// Records per page
    pub page_size: usize,
    /// Total number of pages
    pub total_pages: usize,
    /// Index of the first record on this page
    pub offset: usize,
}

/// Calculate pagination metadata from total results and requested page
///
/// Ensures page is within valid bounds [1, total_pages]. An empty result set
/// has zero pages and reports page 1.
///
/// # Examples
/// ```
/// use triage_common::view::pagination::calculate_pagination;
///
/// // 25 results at 10 per page = 3 pages (10 + 10 + 5)
/// let p = calculate_pagination(25, 10, 2);
/// assert_eq!(p.page, 2);
/// assert_eq!(p.total_pages, 3);
/// assert_eq!(p.offset, 10);
///
/// // Requesting out-of-bounds page gets clamped
/// let p = calculate_pagination(25, 10, 99);
/// assert_eq!(p.page, 3);
/// assert_eq!(p.offset, 20);
/// ```
pub fn calculate_pagination(total_results: usize, page_size: usize, requested_page: usize) -> Pagination {
    let page_size = page_size.max(1);
    let total_pages = total_results.div_ceil(page_size);
    let page = requested_page.max(1).min(total_pages.max(1));
    let offset = (page - 1) * page_size;

    Pagination {
        page,
        page_size,
        total_pages,
        offset,
    }
}

impl Pagination {
    /// Index range of this page within a result set of `total_results`
    pub fn range(&self, total_results: usize) -> Range<usize> {
        let start = self.offset.min(total_results);
        let end = (self.offset + self.page_size).min(total_results);
        start..end
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}
