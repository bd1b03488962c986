//! Pagination helpers and types.

use serde::Serialize;
use utoipa::ToSchema;

/// Default page size for point listings.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Largest page a client may request.
pub const MAX_PAGE_SIZE: usize = 500;

pub fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

/// Paginated response wrapper.
#[derive(Debug, Serialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total_count: usize,
    pub page_size: usize,
    pub offset: usize,
}

impl<T> PaginatedResponse<T> {
    /// Take one page out of `items`. `page_size` is clamped to `1..=MAX_PAGE_SIZE`.
    pub fn from_items(items: Vec<T>, offset: usize, page_size: usize) -> Self {
        let page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        let total_count = items.len();
        let page = items.into_iter().skip(offset).take(page_size).collect();
        Self {
            items: page,
            total_count,
            page_size,
            offset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_items() {
        let page = PaginatedResponse::from_items((0..120).collect(), 100, 50);
        assert_eq!(page.items, (100..120).collect::<Vec<_>>());
        assert_eq!(page.total_count, 120);

        let past_end = PaginatedResponse::from_items(vec![1, 2, 3], 10, 50);
        assert!(past_end.items.is_empty());
        assert_eq!(past_end.total_count, 3);
    }

    #[test]
    fn test_page_size_is_clamped() {
        let page = PaginatedResponse::from_items(vec![1, 2, 3], 0, 0);
        assert_eq!(page.page_size, 1);
        assert_eq!(page.items, vec![1]);

        let page = PaginatedResponse::<u8>::from_items(Vec::new(), 0, 10_000);
        assert_eq!(page.page_size, MAX_PAGE_SIZE);
    }
}
