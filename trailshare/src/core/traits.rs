use axum::{
    Json,
    response::{IntoResponse, Response},
};
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait, Order, PaginatorTrait,
    PrimaryKeyTrait, QueryFilter, QueryOrder, QuerySelect,
};
use serde::Serialize;
use uuid::Uuid;

use crate::filtering::{
    FilterOptions, apply_filters, calculate_content_range, parse_pagination, parse_sorting,
};

/// A resource that can be listed with `filter`/`range`/`sort` query parameters.
///
/// Implementors describe which columns clients may touch; everything else is
/// ignored by the query layer.
pub trait ListableResource:
    Sized + Send + Sync + From<<Self::Entity as EntityTrait>::Model>
{
    type Entity: EntityTrait<Column = Self::Column> + Sync;
    type Column: ColumnTrait + Copy + Send + Sync;

    const RESOURCE_NAME_SINGULAR: &'static str;
    const RESOURCE_NAME_PLURAL: &'static str;

    /// Column and direction used when the client does not ask for one
    fn default_sort() -> (Self::Column, Order);

    fn sortable_columns() -> Vec<(&'static str, Self::Column)>;

    fn filterable_columns() -> Vec<(&'static str, Self::Column)>;

    /// Filterable string columns matched with `LIKE` instead of equality
    #[must_use]
    fn like_filterable_columns() -> Vec<&'static str> {
        vec![]
    }

    /// Columns searched by the `q` filter key
    #[must_use]
    fn fulltext_searchable_columns() -> Vec<(&'static str, Self::Column)> {
        vec![]
    }
}

/// One page of a listing plus what is needed for the `Content-Range` header
#[derive(Debug)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
    pub resource: &'static str,
}

impl<T> Page<T> {
    /// Convert the items while keeping the range information
    #[must_use]
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            offset: self.offset,
            limit: self.limit,
            resource: self.resource,
        }
    }
}

impl<T: Serialize> IntoResponse for Page<T> {
    fn into_response(self) -> Response {
        let headers = calculate_content_range(self.offset, self.limit, self.total, self.resource);
        (headers, Json(self.items)).into_response()
    }
}

/// Run a filtered, sorted and paginated listing of `R`.
///
/// `scope` is ANDed with the client's filter so callers can restrict what a
/// user may see (e.g. only their own bookings) regardless of the query.
///
/// # Errors
/// Propagates database errors from the select or the count.
pub async fn list_page<R>(
    db: &DatabaseConnection,
    params: &FilterOptions,
    scope: Condition,
) -> Result<Page<R>, DbErr>
where
    R: ListableResource,
    <R::Entity as EntityTrait>::Model: Sync,
{
    let (offset, limit) = parse_pagination(params);
    let condition = Condition::all()
        .add(scope)
        .add(apply_filters::<R>(params.filter.as_deref()));
    let (order_column, order_direction) =
        parse_sorting(params, &R::sortable_columns(), R::default_sort());

    let models = R::Entity::find()
        .filter(condition.clone())
        .order_by(order_column, order_direction)
        .offset(offset)
        .limit(limit)
        .all(db)
        .await?;
    let total = R::Entity::find().filter(condition).count(db).await?;

    tracing::debug!(
        resource = R::RESOURCE_NAME_PLURAL,
        offset,
        limit,
        total,
        "Listed resources"
    );

    Ok(Page {
        items: models.into_iter().map(R::from).collect(),
        total,
        offset,
        limit,
        resource: R::RESOURCE_NAME_PLURAL,
    })
}

/// Load one `R` by primary key, mapping absence to `DbErr::RecordNotFound`
///
/// # Errors
/// `RecordNotFound` (rendered as 404) or the underlying database error.
pub async fn find_by_id<R>(db: &DatabaseConnection, id: Uuid) -> Result<R, DbErr>
where
    R: ListableResource,
    <R::Entity as EntityTrait>::Model: Sync,
    <<R::Entity as EntityTrait>::PrimaryKey as PrimaryKeyTrait>::ValueType: From<Uuid>,
{
    R::Entity::find_by_id(id)
        .one(db)
        .await?
        .map(R::from)
        .ok_or_else(|| DbErr::RecordNotFound(format!("{} not found", R::RESOURCE_NAME_SINGULAR)))
}
