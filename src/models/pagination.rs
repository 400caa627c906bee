//! Pagination types

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Number of posts shown per page in every list view
pub const PAGE_SIZE: u32 = 10;

/// Requested page: a 1-based number or the last page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageNumber {
    Number(u32),
    Last,
}

impl Default for PageNumber {
    fn default() -> Self {
        PageNumber::Number(1)
    }
}

impl FromStr for PageNumber {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("last") {
            return Ok(PageNumber::Last);
        }
        s.parse::<u32>()
            .map(PageNumber::Number)
            .map_err(|_| anyhow::anyhow!("Page is not a number: {}", s))
    }
}

impl PageNumber {
    /// Resolve against a result size. `None` when the page does not exist.
    ///
    /// The first page always exists, even for an empty result.
    pub fn resolve(self, total: i64, per_page: u32) -> Option<u32> {
        let pages = page_count(total, per_page);
        match self {
            PageNumber::Last => Some(pages),
            PageNumber::Number(n) if n >= 1 && n <= pages => Some(n),
            PageNumber::Number(_) => None,
        }
    }
}

/// Number of pages for `total` items, never less than one
pub fn page_count(total: i64, per_page: u32) -> u32 {
    if per_page == 0 || total <= 0 {
        return 1;
    }
    let total = total as u64;
    let per_page = per_page as u64;
    total.div_ceil(per_page) as u32
}

/// Pagination parameters for repository queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListParams {
    /// Page number (1-indexed)
    pub page: u32,
    /// Number of items per page
    pub per_page: u32,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: PAGE_SIZE,
        }
    }
}

impl ListParams {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, 100),
        }
    }

    /// Offset for database queries
    pub fn offset(&self) -> i64 {
        (self.page.saturating_sub(1) as i64) * self.per_page as i64
    }

    /// Limit for database queries
    pub fn limit(&self) -> i64 {
        self.per_page as i64
    }
}

/// One page of a larger result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    /// Total number of items across all pages
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
}

impl<T> PagedResult<T> {
    pub fn new(items: Vec<T>, total: i64, params: &ListParams) -> Self {
        Self {
            items,
            total,
            page: params.page,
            per_page: params.per_page,
        }
    }

    pub fn total_pages(&self) -> u32 {
        page_count(self.total, self.per_page)
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    /// Convert the items while keeping the paging metadata
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PagedResult<U> {
        PagedResult {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_page_number_parsing() {
        assert_eq!("3".parse::<PageNumber>().unwrap(), PageNumber::Number(3));
        assert_eq!("last".parse::<PageNumber>().unwrap(), PageNumber::Last);
        assert_eq!("LAST".parse::<PageNumber>().unwrap(), PageNumber::Last);
        assert!("abc".parse::<PageNumber>().is_err());
        assert!("-1".parse::<PageNumber>().is_err());
    }

    #[test]
    fn test_first_page_of_empty_result_exists() {
        assert_eq!(PageNumber::Number(1).resolve(0, PAGE_SIZE), Some(1));
        assert_eq!(PageNumber::Last.resolve(0, PAGE_SIZE), Some(1));
        assert_eq!(PageNumber::Number(2).resolve(0, PAGE_SIZE), None);
    }

    #[test]
    fn test_out_of_range_pages() {
        assert_eq!(PageNumber::Number(0).resolve(25, PAGE_SIZE), None);
        assert_eq!(PageNumber::Number(3).resolve(25, PAGE_SIZE), Some(3));
        assert_eq!(PageNumber::Number(4).resolve(25, PAGE_SIZE), None);
        assert_eq!(PageNumber::Last.resolve(25, PAGE_SIZE), Some(3));
    }

    #[test]
    fn test_list_params_offset() {
        assert_eq!(ListParams::new(1, 10).offset(), 0);
        assert_eq!(ListParams::new(3, 10).offset(), 20);
        assert_eq!(ListParams::new(0, 10).page, 1);
    }

    #[test]
    fn test_paged_result_navigation() {
        let page = PagedResult::new(vec![1, 2], 12, &ListParams::new(2, 10));
        assert_eq!(page.total_pages(), 2);
        assert!(!page.has_next());
        assert!(page.has_prev());
        assert_eq!(page.map(|n| n * 10).items, vec![10, 20]);
    }

    proptest! {
        /// Every resolvable page lies within the page count and covers
        /// at most PAGE_SIZE items.
        #[test]
        fn resolved_pages_are_in_range(total in 0i64..500, requested in 0u32..60) {
            let pages = page_count(total, PAGE_SIZE);
            match PageNumber::Number(requested).resolve(total, PAGE_SIZE) {
                Some(page) => {
                    prop_assert!(page >= 1 && page <= pages);
                    let params = ListParams::new(page, PAGE_SIZE);
                    let remaining = (total - params.offset()).max(0);
                    prop_assert!(remaining.min(params.limit()) <= PAGE_SIZE as i64);
                }
                None => prop_assert!(requested == 0 || requested > pages),
            }
        }
    }
}
