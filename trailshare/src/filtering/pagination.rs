use axum::http::HeaderValue;
use hyper::HeaderMap;

use super::query_parser::FilterOptions;

/// Largest page a client may request
pub const MAX_PAGE_SIZE: u64 = 100;
const DEFAULT_PAGE_SIZE: u64 = 10;

/// Sanitize resource name by removing control characters for HTTP headers
fn sanitize_resource_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii() && !c.is_ascii_control())
        .collect()
}

/// Build the `Content-Range` header for a page of results.
///
/// `resource 0-9/100` for the first ten of a hundred items.
#[must_use]
pub fn calculate_content_range(
    offset: u64,
    limit: u64,
    total_count: u64,
    resource_name: &str,
) -> HeaderMap {
    let last = offset
        .saturating_add(limit)
        .min(total_count)
        .saturating_sub(1)
        .max(offset.min(total_count.saturating_sub(1)));

    let safe_name = sanitize_resource_name(resource_name);
    let content_range = format!("{safe_name} {offset}-{last}/{total_count}");

    let mut headers = HeaderMap::new();
    let value = HeaderValue::from_str(&content_range)
        .unwrap_or_else(|_| HeaderValue::from_static("items 0-0/0"));
    headers.insert("Content-Range", value);
    headers
}

/// Parse a React Admin `[start, end]` range. Falls back to the first page.
#[must_use]
pub fn parse_range(range_str: Option<&str>) -> (u64, u64) {
    range_str.map_or((0, DEFAULT_PAGE_SIZE - 1), |r| {
        serde_json::from_str::<[u64; 2]>(r)
            .ok()
            .filter(|range| range[0] <= range[1])
            .map_or((0, DEFAULT_PAGE_SIZE - 1), |range| (range[0], range[1]))
    })
}

/// Returns `(offset, limit)`; `page`/`per_page` wins over `range`, limit is capped.
#[must_use]
pub fn parse_pagination(params: &FilterOptions) -> (u64, u64) {
    let (offset, limit) = if let (Some(page), Some(per_page)) = (params.page, params.per_page) {
        let per_page = per_page.clamp(1, MAX_PAGE_SIZE);
        (page.saturating_sub(1).saturating_mul(per_page), per_page)
    } else if let Some(range) = &params.range {
        let (start, end) = parse_range(Some(range));
        (start, end.saturating_sub(start).saturating_add(1))
    } else {
        (0, DEFAULT_PAGE_SIZE)
    };
    (offset, limit.min(MAX_PAGE_SIZE))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(headers: &HeaderMap) -> &str {
        headers.get("Content-Range").unwrap().to_str().unwrap()
    }

    #[test]
    fn test_content_range_normal() {
        let headers = calculate_content_range(0, 10, 100, "equipment");
        assert_eq!(header(&headers), "equipment 0-9/100");
    }

    #[test]
    fn test_content_range_last_partial_page() {
        let headers = calculate_content_range(20, 10, 25, "bookings");
        assert_eq!(header(&headers), "bookings 20-24/25");
    }

    #[test]
    fn test_content_range_zero_items() {
        let headers = calculate_content_range(0, 10, 0, "equipment");
        assert_eq!(header(&headers), "equipment 0-0/0");
    }

    #[test]
    fn test_content_range_strips_control_characters() {
        let headers = calculate_content_range(0, 10, 100, "users\r\nInjected: evil");
        let value = header(&headers);
        assert!(!value.contains('\r'));
        assert!(!value.contains('\n'));
    }

    #[test]
    fn test_parse_range() {
        assert_eq!(parse_range(Some("[0,24]")), (0, 24));
        assert_eq!(parse_range(Some("[5,2]")), (0, 9));
        assert_eq!(parse_range(Some("garbage")), (0, 9));
        assert_eq!(parse_range(None), (0, 9));
    }

    #[test]
    fn test_parse_pagination_page_wins() {
        let params = FilterOptions {
            page: Some(3),
            per_page: Some(20),
            range: Some("[0,4]".to_string()),
            ..Default::default()
        };
        assert_eq!(parse_pagination(&params), (40, 20));
    }

    #[test]
    fn test_parse_pagination_caps_limit() {
        let params = FilterOptions {
            range: Some("[0,9999]".to_string()),
            ..Default::default()
        };
        assert_eq!(parse_pagination(&params), (0, MAX_PAGE_SIZE));

        let params = FilterOptions {
            page: Some(1),
            per_page: Some(0),
            ..Default::default()
        };
        assert_eq!(parse_pagination(&params), (0, 1));
    }

    #[test]
    fn test_parse_pagination_default() {
        assert_eq!(parse_pagination(&FilterOptions::default()), (0, 10));
    }
}
