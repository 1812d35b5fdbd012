use serde::Serialize;

use crate::error::AppError;

/// Page sizes the upstream search endpoint accepts, in ascending order.
pub const ALLOWED_PAGE_SIZES: [u32; 4] = [10, 25, 50, 100];

/// Key under which batch enrichment stores fetched content on a decision.
pub const DOCUMENT_CONTENT_KEY: &str = "document_content";

/// One decision record exactly as returned by the upstream.
pub type Decision = serde_json::Map<String, serde_json::Value>;

/// Coerce a requested page size to the nearest allowed value.
///
/// Scans [`ALLOWED_PAGE_SIZES`] in ascending order and keeps the first
/// minimum of the absolute difference, so ties go to the smaller size.
pub fn coerce_page_size(requested: i64) -> u32 {
    let mut best = ALLOWED_PAGE_SIZES[0];
    let mut best_distance = requested.abs_diff(i64::from(best));
    for &candidate in &ALLOWED_PAGE_SIZES[1..] {
        let distance = requested.abs_diff(i64::from(candidate));
        if distance < best_distance {
            best = candidate;
            best_distance = distance;
        }
    }
    best
}

/// Clamp a requested page number to the 1-based range.
pub fn normalize_page_number(requested: i64) -> u32 {
    requested.clamp(1, i64::from(u32::MAX)) as u32
}

/// A normalized keyword search.
///
/// Construction through [`SearchRequest::new`] guarantees a non-empty
/// trimmed keyword, a page number of at least 1 and an allowed page size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchRequest {
    keyword: String,
    page_number: u32,
    page_size: u32,
}

impl SearchRequest {
    pub fn new(keyword: &str, page_number: i64, page_size: i64) -> Result<Self, AppError> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(AppError::InvalidArgument("keyword is required".into()));
        }

        let normalized_size = coerce_page_size(page_size);
        if i64::from(normalized_size) != page_size {
            tracing::info!(
                requested = page_size,
                using = normalized_size,
                "Page size not accepted upstream, using closest valid size"
            );
        }

        Ok(Self {
            keyword: keyword.to_string(),
            page_number: normalize_page_number(page_number),
            page_size: normalized_size,
        })
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }
}

/// One page of search results.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchResult {
    pub decisions: Vec<Decision>,
    pub total_records: u64,
    pub filtered_records: u64,
}

impl SearchResult {
    /// The degraded result returned for upstream, shape and transport failures.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }
}

/// Outcome of fetching a single decision's document content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentFetchResult {
    pub decision_id: String,
    pub content: String,
    pub found: bool,
}

impl ContentFetchResult {
    pub fn found(decision_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            decision_id: decision_id.into(),
            content: content.into(),
            found: true,
        }
    }

    pub fn not_found(decision_id: impl Into<String>) -> Self {
        Self {
            decision_id: decision_id.into(),
            content: String::new(),
            found: false,
        }
    }
}

/// Extract a decision's id as a string, accepting string or numeric ids.
pub fn decision_id(decision: &Decision) -> Option<String> {
    match decision.get("id")? {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_allowed_sizes_pass_through() {
        for size in ALLOWED_PAGE_SIZES {
            assert_eq!(coerce_page_size(i64::from(size)), size);
        }
    }

    #[test]
    fn test_coerce_to_nearest() {
        assert_eq!(coerce_page_size(17), 10);
        assert_eq!(coerce_page_size(18), 25);
        assert_eq!(coerce_page_size(37), 25);
        assert_eq!(coerce_page_size(38), 50);
        assert_eq!(coerce_page_size(90), 100);
        assert_eq!(coerce_page_size(1000), 100);
    }

    #[test]
    fn test_coerce_ties_go_to_smaller() {
        // 75 is equidistant from 50 and 100.
        assert_eq!(coerce_page_size(75), 50);
    }

    #[test]
    fn test_coerce_non_positive() {
        assert_eq!(coerce_page_size(0), 10);
        assert_eq!(coerce_page_size(-40), 10);
        assert_eq!(coerce_page_size(i64::MIN), 10);
        assert_eq!(coerce_page_size(i64::MAX), 100);
    }

    #[test]
    fn test_page_number_clamped() {
        assert_eq!(normalize_page_number(0), 1);
        assert_eq!(normalize_page_number(-7), 1);
        assert_eq!(normalize_page_number(1), 1);
        assert_eq!(normalize_page_number(42), 42);
    }

    #[test]
    fn test_search_request_normalizes() {
        let req = SearchRequest::new("  tazminat ", 0, 17).unwrap();
        assert_eq!(req.keyword(), "tazminat");
        assert_eq!(req.page_number(), 1);
        assert_eq!(req.page_size(), 10);
    }

    #[test]
    fn test_search_request_rejects_blank_keyword() {
        assert!(matches!(
            SearchRequest::new("", 1, 10),
            Err(AppError::InvalidArgument(_))
        ));
        assert!(matches!(
            SearchRequest::new(" \t\n ", 1, 10),
            Err(AppError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_decision_id_accepts_strings_and_numbers() {
        let with_str = json!({"id": "1087654321"});
        let with_num = json!({"id": 12345});
        let blank = json!({"id": "  "});
        let missing = json!({"daire": "3. Hukuk Dairesi"});

        assert_eq!(
            decision_id(with_str.as_object().unwrap()).as_deref(),
            Some("1087654321")
        );
        assert_eq!(
            decision_id(with_num.as_object().unwrap()).as_deref(),
            Some("12345")
        );
        assert_eq!(decision_id(blank.as_object().unwrap()), None);
        assert_eq!(decision_id(missing.as_object().unwrap()), None);
    }

    #[test]
    fn test_empty_result() {
        let result = SearchResult::empty();
        assert!(result.is_empty());
        assert_eq!(result.total_records, 0);
        assert_eq!(result.filtered_records, 0);
    }
}
