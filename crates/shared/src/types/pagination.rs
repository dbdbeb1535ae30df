//! Page windows over ordered lists such as the ledger export.

use serde::{Deserialize, Serialize};

/// Page size used when a caller names none.
pub const DEFAULT_PER_PAGE: u32 = 50;

/// A 1-indexed page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// Page number, starting at 1.
    pub page: u32,
    /// Items per page.
    pub per_page: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl PageRequest {
    /// Window from optional query parameters, falling back to the defaults.
    #[must_use]
    pub fn from_query(page: Option<u32>, per_page: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1),
            per_page: per_page.unwrap_or(DEFAULT_PER_PAGE),
        }
    }

    /// Rows to skip.
    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.per_page)
    }

    /// Rows to fetch.
    #[must_use]
    pub fn limit(&self) -> u64 {
        u64::from(self.per_page)
    }

    /// Forces `page >= 1` and `per_page` into `1..=max`.
    #[must_use]
    pub fn clamped(self, max: u32) -> Self {
        Self {
            page: self.page.max(1),
            per_page: self.per_page.clamp(1, max),
        }
    }
}

/// One page of items with its position in the full list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResponse<T> {
    /// Items on this page.
    pub data: Vec<T>,
    /// Position metadata.
    pub meta: PageMeta,
}

/// Where a page sits in the full list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    /// Page number.
    pub page: u32,
    /// Items per page.
    pub per_page: u32,
    /// Items across all pages.
    pub total: u64,
    /// Page count, at least 1 even for an empty list.
    pub total_pages: u32,
    /// Whether a later page exists.
    pub has_next: bool,
}

impl<T> PageResponse<T> {
    /// Wraps `data` as page `page` of a list holding `total` items.
    #[must_use]
    pub fn new(data: Vec<T>, page: u32, per_page: u32, total: u64) -> Self {
        let pages = total.div_ceil(u64::from(per_page.max(1))).max(1);
        let total_pages = u32::try_from(pages).unwrap_or(u32::MAX);
        Self {
            data,
            meta: PageMeta {
                page,
                per_page,
                total,
                total_pages,
                has_next: page < total_pages,
            },
        }
    }
}
