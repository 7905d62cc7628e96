//! Pagination metadata for listing responses

use serde::Serialize;

/// `pagination` object attached to listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    /// Current page number (1-indexed)
    pub page: i64,
    pub limit: i64,
    /// Rows matching the listing filters
    pub total: i64,
    pub total_pages: i64,
    pub has_more: bool,
}

/// Calculate pagination metadata for a page of `limit` rows
///
/// Unlike a clamped browser, an out-of-range page is reported as-is; it
/// simply returns no rows.
///
/// # Examples
/// ```
/// use sitefeed_server::pagination::calculate_pagination;
///
/// // 120 matches at 50 per page = 3 pages (50 + 50 + 20)
/// let p = calculate_pagination(120, 2, 50);
/// assert_eq!(p.total_pages, 3);
/// assert!(p.has_more);
/// ```
pub fn calculate_pagination(total: i64, page: i64, limit: i64) -> Pagination {
    let limit = limit.max(1);
    let total_pages = (total + limit - 1) / limit;

    Pagination {
        page,
        limit,
        total,
        total_pages,
        has_more: page * limit < total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_middle_page() {
        let p = calculate_pagination(120, 2, 50);
        assert_eq!(p.total_pages, 3);
        assert!(p.has_more);
    }

    #[test]
    fn test_pagination_last_page() {
        let p = calculate_pagination(120, 3, 50);
        assert!(!p.has_more);
    }

    #[test]
    fn test_pagination_exact_multiple() {
        let p = calculate_pagination(100, 2, 50);
        assert_eq!(p.total_pages, 2);
        assert!(!p.has_more);
    }

    #[test]
    fn test_pagination_empty() {
        let p = calculate_pagination(0, 1, 50);
        assert_eq!(p.total_pages, 0);
        assert!(!p.has_more);
    }

    #[test]
    fn test_pagination_serializes_camel_case() {
        let json = serde_json::to_value(calculate_pagination(3, 1, 2)).unwrap();
        assert_eq!(json["totalPages"], 2);
        assert_eq!(json["hasMore"], true);
    }
}
