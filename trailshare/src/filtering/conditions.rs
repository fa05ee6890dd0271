use sea_orm::{
    ColumnTrait, Condition, Value,
    sea_query::{Expr, Func, SimpleExpr},
};
use std::collections::HashMap;
use uuid::Uuid;

use super::search::{build_fulltext_condition, build_like_condition};
use crate::core::ListableResource;

// Basic safety limits
const MAX_FIELD_VALUE_LENGTH: usize = 1_000;
const MAX_FIELD_NAME_LENGTH: usize = 100;

/// Comparison operators available through key suffixes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comparison {
    Eq,
    Gte,
    Lte,
    Gt,
    Lt,
    Neq,
}

/// Basic field name validation
fn is_valid_field_name(field_name: &str) -> bool {
    !field_name.is_empty()
        && field_name.len() <= MAX_FIELD_NAME_LENGTH
        && !field_name.starts_with('_')
        && field_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Split a React Admin style key into its base column and comparison.
/// `price_per_day_cents_gte` → (`price_per_day_cents`, `Gte`)
fn parse_comparison_operator(field_name: &str) -> (&str, Comparison) {
    const SUFFIXES: [(&str, Comparison); 5] = [
        ("_gte", Comparison::Gte),
        ("_lte", Comparison::Lte),
        ("_neq", Comparison::Neq),
        ("_gt", Comparison::Gt),
        ("_lt", Comparison::Lt),
    ];
    SUFFIXES
        .iter()
        .find_map(|(suffix, op)| field_name.strip_suffix(suffix).map(|base| (base, *op)))
        .unwrap_or((field_name, Comparison::Eq))
}

fn compare<C: ColumnTrait, V: Into<Value>>(column: C, op: Comparison, value: V) -> SimpleExpr {
    match op {
        Comparison::Eq => column.eq(value),
        Comparison::Gte => column.gte(value),
        Comparison::Lte => column.lte(value),
        Comparison::Gt => column.gt(value),
        Comparison::Lt => column.lt(value),
        Comparison::Neq => column.ne(value),
    }
}

fn parse_filter_json(filter_str: Option<&str>) -> HashMap<String, serde_json::Value> {
    filter_str.map_or_else(HashMap::new, |filter| {
        serde_json::from_str(filter).unwrap_or_else(|e| {
            tracing::debug!(error = %e, "Ignoring invalid JSON in filter parameter");
            HashMap::new()
        })
    })
}

fn process_string_filter<R: ListableResource>(
    key: &str,
    op: Comparison,
    string_value: &str,
    column: R::Column,
) -> Option<SimpleExpr> {
    if string_value.len() > MAX_FIELD_VALUE_LENGTH {
        return None;
    }

    let trimmed_value = string_value.trim();
    if trimmed_value.is_empty() {
        return None;
    }

    if op != Comparison::Eq {
        // Ordered comparison on text (ISO dates compare correctly as strings)
        return Some(compare(column, op, trimmed_value.to_string()));
    }

    if R::like_filterable_columns().contains(&key) {
        return Some(build_like_condition(column, trimmed_value));
    }

    if let Ok(uuid_value) = Uuid::parse_str(trimmed_value) {
        return Some(column.eq(uuid_value));
    }

    // Case-insensitive string equality
    Some(Expr::expr(Func::upper(Expr::col(column))).eq(trimmed_value.to_uppercase()))
}

fn process_number_filter<C: ColumnTrait>(
    op: Comparison,
    number: &serde_json::Number,
    column: C,
) -> Option<SimpleExpr> {
    if let Some(int_value) = number.as_i64() {
        Some(compare(column, op, int_value))
    } else {
        number
            .as_f64()
            .map(|float_value| compare(column, op, float_value))
    }
}

fn process_array_filter<C: ColumnTrait>(
    array_values: &[serde_json::Value],
    column: C,
) -> Option<SimpleExpr> {
    let values: Vec<Value> = array_values
        .iter()
        .filter_map(|value| match value {
            serde_json::Value::String(s) => Some(
                Uuid::parse_str(s.trim()).map_or_else(|_| Value::from(s.clone()), Value::from),
            ),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Value::from)
                .or_else(|| n.as_f64().map(Value::from)),
            serde_json::Value::Bool(b) => Some(Value::from(*b)),
            _ => None,
        })
        .collect();

    if values.is_empty() {
        None
    } else {
        Some(column.is_in(values))
    }
}

/// Build a condition from the JSON `filter` query parameter.
///
/// `q` searches the resource's fulltext columns; any other key must name a
/// filterable column (optionally with a comparison suffix) or it is ignored.
#[must_use]
pub fn apply_filters<R: ListableResource>(filter_str: Option<&str>) -> Condition {
    let filters = parse_filter_json(filter_str);
    let filterable = R::filterable_columns();
    let mut condition = Condition::all();

    if let Some(q) = filters.get("q").and_then(serde_json::Value::as_str)
        && let Some(fulltext) = build_fulltext_condition(q, &R::fulltext_searchable_columns())
    {
        condition = condition.add(fulltext);
    }

    for (key, value) in &filters {
        if key == "q" || !is_valid_field_name(key) {
            continue;
        }

        let (base, op) = parse_comparison_operator(key);
        // A column whose own name ends in a suffix wins over the comparison reading
        let (base, op) = if filterable.iter().any(|(name, _)| name == key) {
            (key.as_str(), Comparison::Eq)
        } else {
            (base, op)
        };

        let Some(column) = filterable
            .iter()
            .find(|(name, _)| *name == base)
            .map(|(_, column)| *column)
        else {
            continue;
        };

        let filter_condition = match value {
            serde_json::Value::String(string_value) => {
                process_string_filter::<R>(base, op, string_value, column)
            }
            serde_json::Value::Number(number) => process_number_filter(op, number, column),
            serde_json::Value::Bool(bool_value) => Some(compare(column, op, *bool_value)),
            serde_json::Value::Array(array_values) if op == Comparison::Eq => {
                process_array_filter(array_values, column)
            }
            serde_json::Value::Null if op == Comparison::Eq => Some(column.is_null()),
            serde_json::Value::Null if op == Comparison::Neq => Some(column.is_not_null()),
            _ => None,
        };

        if let Some(filter_expr) = filter_condition {
            condition = condition.add(filter_expr);
        }
    }

    condition
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::equipment::Equipment;

    #[test]
    fn test_parse_comparison_operator() {
        assert_eq!(
            parse_comparison_operator("price_per_day_cents_gte"),
            ("price_per_day_cents", Comparison::Gte)
        );
        assert_eq!(
            parse_comparison_operator("deposit_cents_lt"),
            ("deposit_cents", Comparison::Lt)
        );
        assert_eq!(
            parse_comparison_operator("category_neq"),
            ("category", Comparison::Neq)
        );
        assert_eq!(parse_comparison_operator("category"), ("category", Comparison::Eq));
    }

    #[test]
    fn test_field_name_validation() {
        assert!(is_valid_field_name("category"));
        assert!(!is_valid_field_name(""));
        assert!(!is_valid_field_name("_hidden"));
        assert!(!is_valid_field_name("title; DROP TABLE"));
        assert!(!is_valid_field_name(&"a".repeat(200)));
    }

    #[test]
    fn test_invalid_json_yields_empty_condition() {
        let condition = apply_filters::<Equipment>(Some("{not json"));
        assert!(condition.is_empty());
    }

    #[test]
    fn test_unknown_columns_are_ignored() {
        let condition = apply_filters::<Equipment>(Some(r#"{"password_hash": "x"}"#));
        assert!(condition.is_empty());
    }

    #[test]
    fn test_known_columns_produce_conditions() {
        let condition = apply_filters::<Equipment>(Some(
            r#"{"category": "camping", "price_per_day_cents_lte": 3000, "is_available": true}"#,
        ));
        assert_eq!(condition.len(), 3);
    }

    #[test]
    fn test_fulltext_query_adds_condition() {
        let condition = apply_filters::<Equipment>(Some(r#"{"q": "tent"}"#));
        assert_eq!(condition.len(), 1);
    }

    #[test]
    fn test_array_filter_builds_in_clause() {
        let expr = process_array_filter(
            &[serde_json::json!("camping"), serde_json::json!("climbing")],
            crate::entities::equipment::Column::Category,
        );
        let debug = format!("{expr:?}");
        assert!(debug.contains("In"), "expected IN expression: {debug}");
    }
}
