//! # Filtering, Sorting & Pagination
//!
//! Translates list query parameters into Sea-ORM conditions so every list
//! endpoint (equipment, bookings, blog posts, admin users) shares the same
//! query language.
//!
//! ```text
//! GET /equipment?filter={"category":"camping","price_per_day_cents_lte":3000}
//! GET /equipment?filter={"q":"two person tent"}&sort=["price_per_day_cents","ASC"]
//! GET /equipment?page=2&per_page=20
//! GET /bookings?range=[0,24]&sort_by=start_date&order=DESC
//! ```
//!
//! Only columns a resource declares as filterable or sortable are ever
//! touched; unknown keys are ignored. Search values have their LIKE
//! wildcards escaped.

pub mod conditions;
pub mod pagination;
pub mod query_parser;
pub mod search;
pub mod sort;

pub use conditions::apply_filters;
pub use pagination::{MAX_PAGE_SIZE, calculate_content_range, parse_pagination, parse_range};
pub use query_parser::FilterOptions;
pub use search::{build_fulltext_condition, build_like_condition, escape_like_wildcards};
pub use sort::parse_sorting;
