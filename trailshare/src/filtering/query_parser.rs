use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

/// Query parameters for filtering, pagination, and sorting list endpoints.
///
/// # Filtering
/// The `filter` parameter accepts a JSON-encoded object:
/// - **Free text search:** `{"q": "tent"}`
/// - **Single id / many ids:** `{"id": "550e8400-..."}`, `{"id": ["...", "..."]}`
/// - **Column equality:** `{"category": "camping"}`
/// - **Comparisons:** `{"price_per_day_cents_gte": 1000, "price_per_day_cents_lt": 5000}`
/// - **Null checks:** `{"latitude": null}`
///
/// # Pagination
/// - **React Admin format:** `range=[0,9]`
/// - **Standard REST format:** `page=1&per_page=10`
///
/// # Sorting
/// - **React Admin format:** `sort=["price_per_day_cents","ASC"]`
/// - **Standard REST format:** `sort_by=title&order=DESC`
#[derive(Debug, Clone, Deserialize, IntoParams, ToSchema, Default)]
#[into_params(parameter_in = Query)]
pub struct FilterOptions {
    /// JSON-encoded filter object.
    #[param(example = json!({"q": "tent", "category": "camping"}))]
    pub filter: Option<String>,
    /// Range for pagination in the format "[start, end]".
    #[param(example = "[0,9]")]
    pub range: Option<String>,
    /// Page number for standard REST pagination (1-based).
    #[param(example = 1)]
    pub page: Option<u64>,
    /// Number of items per page for standard REST pagination.
    #[param(example = 10)]
    pub per_page: Option<u64>,
    /// Sort order in the format `["column", "order"]`, or a bare column name.
    #[param(example = r#"["created_at", "DESC"]"#)]
    pub sort: Option<String>,
    /// Sort column for standard REST format.
    #[param(example = "title")]
    pub sort_by: Option<String>,
    /// Sort order for standard REST format (ASC or DESC).
    #[param(example = "ASC")]
    pub order: Option<String>,
}
