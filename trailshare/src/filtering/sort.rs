use sea_orm::{ColumnTrait, sea_query::Order};

use super::query_parser::FilterOptions;

const DEFAULT_SORT_ORDER: &str = "ASC";

/// Parse sort column and order from the React Admin JSON array format.
/// Returns `None` for anything that is not a non-empty JSON string array.
fn parse_json_sort(json: &str) -> Option<(String, String)> {
    let sort_vec: Vec<String> = serde_json::from_str(json).ok()?;
    let column = sort_vec.first()?.clone();
    let order = sort_vec
        .get(1)
        .cloned()
        .unwrap_or_else(|| DEFAULT_SORT_ORDER.to_string());
    Some((column, order))
}

/// Anything other than ASC (case-insensitive) sorts descending
fn parse_order(sort_order: &str) -> Order {
    if sort_order.eq_ignore_ascii_case("ASC") {
        Order::Asc
    } else {
        Order::Desc
    }
}

fn find_column<C>(column_name: &str, columns: &[(&str, C)]) -> Option<C>
where
    C: ColumnTrait + Copy,
{
    columns
        .iter()
        .find(|&&(name, _)| name == column_name)
        .map(|&(_, column)| column)
}

/// Parse sorting from `FilterOptions`, supporting both React Admin and standard REST formats.
///
/// Without any sort parameter the resource default applies. An unknown column
/// keeps the requested direction but falls back to the default column.
pub fn parse_sorting<C>(
    params: &FilterOptions,
    sortable_columns: &[(&str, C)],
    default: (C, Order),
) -> (C, Order)
where
    C: ColumnTrait + Copy,
{
    let requested_order = || {
        params
            .order
            .clone()
            .unwrap_or_else(|| DEFAULT_SORT_ORDER.to_string())
    };

    let requested = if let Some(sort_by) = &params.sort_by {
        Some((sort_by.clone(), requested_order()))
    } else if let Some(sort) = &params.sort {
        if sort.trim_start().starts_with('[') {
            parse_json_sort(sort)
        } else {
            Some((sort.clone(), requested_order()))
        }
    } else {
        None
    };

    match requested {
        Some((column_name, order)) => (
            find_column(&column_name, sortable_columns).unwrap_or(default.0),
            parse_order(&order),
        ),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::equipment::Column;

    fn columns() -> Vec<(&'static str, Column)> {
        vec![
            ("title", Column::Title),
            ("price_per_day_cents", Column::PricePerDayCents),
            ("created_at", Column::CreatedAt),
        ]
    }

    fn default() -> (Column, Order) {
        (Column::CreatedAt, Order::Desc)
    }

    #[test]
    fn test_parse_json_sort() {
        assert_eq!(
            parse_json_sort(r#"["title", "DESC"]"#),
            Some(("title".to_string(), "DESC".to_string()))
        );
        assert_eq!(
            parse_json_sort(r#"["title"]"#),
            Some(("title".to_string(), "ASC".to_string()))
        );
        assert_eq!(parse_json_sort("[]"), None);
        assert_eq!(parse_json_sort("invalid json"), None);
    }

    #[test]
    fn test_parse_order() {
        assert_eq!(parse_order("asc"), Order::Asc);
        assert_eq!(parse_order("DESC"), Order::Desc);
        assert_eq!(parse_order("random"), Order::Desc);
    }

    #[test]
    fn test_no_sort_uses_resource_default() {
        let params = FilterOptions::default();
        let (column, order) = parse_sorting(&params, &columns(), default());
        assert!(matches!(column, Column::CreatedAt));
        assert_eq!(order, Order::Desc);
    }

    #[test]
    fn test_react_admin_sort() {
        let params = FilterOptions {
            sort: Some(r#"["price_per_day_cents","ASC"]"#.to_string()),
            ..Default::default()
        };
        let (column, order) = parse_sorting(&params, &columns(), default());
        assert!(matches!(column, Column::PricePerDayCents));
        assert_eq!(order, Order::Asc);
    }

    #[test]
    fn test_rest_sort_by_wins_over_sort() {
        let params = FilterOptions {
            sort_by: Some("title".to_string()),
            order: Some("DESC".to_string()),
            sort: Some(r#"["price_per_day_cents","ASC"]"#.to_string()),
            ..Default::default()
        };
        let (column, order) = parse_sorting(&params, &columns(), default());
        assert!(matches!(column, Column::Title));
        assert_eq!(order, Order::Desc);
    }

    #[test]
    fn test_unknown_column_falls_back() {
        let params = FilterOptions {
            sort: Some("owner_password".to_string()),
            order: Some("ASC".to_string()),
            ..Default::default()
        };
        let (column, order) = parse_sorting(&params, &columns(), default());
        assert!(matches!(column, Column::CreatedAt));
        assert_eq!(order, Order::Asc);
    }
}
