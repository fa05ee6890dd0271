use sea_orm::{
    ColumnTrait, Condition,
    sea_query::{Expr, Func, LikeExpr, SimpleExpr},
};

// Basic safety limits
const MAX_SEARCH_QUERY_LENGTH: usize = 500;

/// Escape LIKE wildcards so user input only ever matches literally.
/// Escapes `\`, `%` and `_`.
#[must_use]
pub fn escape_like_wildcards(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Truncate a search query on a character boundary and trim it
fn sanitize_query(query: &str) -> String {
    query
        .chars()
        .take(MAX_SEARCH_QUERY_LENGTH)
        .collect::<String>()
        .trim()
        .to_string()
}

/// `UPPER(column) LIKE UPPER('%value%') ESCAPE '\'`
#[must_use]
pub fn build_like_condition(column: impl ColumnTrait, value: &str) -> SimpleExpr {
    let pattern = format!("%{}%", escape_like_wildcards(value).to_uppercase());
    Expr::expr(Func::upper(Expr::col(column))).like(LikeExpr::new(pattern).escape('\\'))
}

/// Case-insensitive substring search across every fulltext column.
///
/// Returns `None` when there is nothing to search (no columns or a blank query).
#[must_use]
pub fn build_fulltext_condition<C: ColumnTrait + Copy>(
    query: &str,
    columns: &[(&'static str, C)],
) -> Option<Condition> {
    let sanitized = sanitize_query(query);
    if columns.is_empty() || sanitized.is_empty() {
        return None;
    }

    let condition = columns
        .iter()
        .fold(Condition::any(), |acc, (_, column)| {
            acc.add(build_like_condition(*column, &sanitized))
        });
    Some(condition)
}
