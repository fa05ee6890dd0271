use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, QueryOrder, TransactionTrait,
};
use serde::Deserialize;
use tracing::{info, warn};
use utoipa::IntoParams;
use utoipa_axum::{router::OpenApiRouter, routes};
use uuid::Uuid;

use super::me::record_view;
use crate::{
    auth::{CurrentUser, MaybeUser},
    core::{Page, list_page},
    entities::{
        booking::{self, BookingStatus},
        equipment, equipment_image, favorite, recently_viewed,
    },
    errors::ApiError,
    filtering::FilterOptions,
    geo::RadiusQuery,
    resources::{
        equipment::{Equipment, EquipmentCreate, EquipmentDetail, EquipmentUpdate},
        image::Image,
    },
    services::{Coordinates, Geocoder},
    state::AppState,
    validation::Validatable,
};

pub fn router() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_equipment, create_equipment))
        .routes(routes!(delete_equipment_batch))
        .routes(routes!(get_equipment, update_equipment, delete_equipment))
}

/// Optional centre point restricting a listing query
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct NearQuery {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub radius_km: Option<f64>,
}

/// # Errors
/// 404 when no listing has `id`.
pub async fn load_equipment(db: &DatabaseConnection, id: Uuid) -> Result<equipment::Model, ApiError> {
    equipment::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| ApiError::not_found("Equipment", Some(id.to_string())))
}

/// Images of a listing, primary first then oldest first
///
/// # Errors
/// Database errors.
pub async fn load_images(
    db: &impl sea_orm::ConnectionTrait,
    equipment_id: Uuid,
) -> Result<Vec<equipment_image::Model>, ApiError> {
    Ok(equipment_image::Entity::find()
        .filter(equipment_image::Column::EquipmentId.eq(equipment_id))
        .order_by_desc(equipment_image::Column::IsPrimary)
        .order_by_asc(equipment_image::Column::CreatedAt)
        .all(db)
        .await?)
}

/// Geocoding is best effort: failures are logged and the listing keeps no coordinates
async fn geocode_location(geocoder: &dyn Geocoder, location: &str) -> Option<Coordinates> {
    match geocoder.geocode(location).await {
        Ok(coordinates) => coordinates,
        Err(e) => {
            warn!(error = %e, location, "Geocoding failed");
            None
        }
    }
}

/// Approved bookings that have not ended yet block deletion
async fn has_active_bookings(db: &DatabaseConnection, equipment_id: Uuid) -> Result<bool, ApiError> {
    let today = Utc::now().date_naive();
    let count = booking::Entity::find()
        .filter(booking::Column::EquipmentId.eq(equipment_id))
        .filter(booking::Column::Status.eq(BookingStatus::Approved))
        .filter(booking::Column::EndDate.gte(today))
        .count(db)
        .await?;
    Ok(count > 0)
}

/// Remove stored image objects first, then every row that belongs to the listing
async fn delete_listing(state: &AppState, listing: &equipment::Model) -> Result<(), ApiError> {
    let images = load_images(&state.db, listing.id).await?;
    for image in &images {
        state.store.delete(&image.storage_key).await.map_err(|e| {
            ApiError::internal("Could not delete listing images", Some(e.to_string()))
        })?;
    }

    let txn = state.db.begin().await?;
    equipment_image::Entity::delete_many()
        .filter(equipment_image::Column::EquipmentId.eq(listing.id))
        .exec(&txn)
        .await?;
    favorite::Entity::delete_many()
        .filter(favorite::Column::EquipmentId.eq(listing.id))
        .exec(&txn)
        .await?;
    recently_viewed::Entity::delete_many()
        .filter(recently_viewed::Column::EquipmentId.eq(listing.id))
        .exec(&txn)
        .await?;
    // Requests still waiting for an answer can never be fulfilled now
    booking::Entity::update_many()
        .col_expr(
            booking::Column::Status,
            sea_orm::sea_query::Expr::value(BookingStatus::Cancelled),
        )
        .col_expr(booking::Column::UpdatedAt, sea_orm::sea_query::Expr::value(Utc::now()))
        .filter(booking::Column::EquipmentId.eq(listing.id))
        .filter(booking::Column::Status.eq(BookingStatus::Pending))
        .exec(&txn)
        .await?;
    equipment::Entity::delete_by_id(listing.id).exec(&txn).await?;
    txn.commit().await?;

    info!(equipment_id = %listing.id, images = images.len(), "Deleted listing");
    Ok(())
}

#[utoipa::path(
    get,
    path = "/equipment",
    tag = "equipment",
    params(FilterOptions, NearQuery),
    responses(
        (status = 200, description = "Page of listings; `Content-Range` carries the totals", body = [Equipment]),
    ),
    summary = "List equipment",
    description = "Filterable on id, owner_id, category, condition, price_per_day_cents, deposit_cents, location, is_available, is_featured and created_at. `lat`, `lng` and `radius_km` together restrict results to the surrounding bounding box."
)]
pub async fn list_equipment(
    State(state): State<AppState>,
    Query(params): Query<FilterOptions>,
    Query(near): Query<NearQuery>,
) -> Result<Page<Equipment>, ApiError> {
    let mut scope = Condition::all();
    if let Some(radius) = RadiusQuery::from_parts(near.lat, near.lng, near.radius_km) {
        let bbox = radius.bounding_box();
        scope = scope
            .add(equipment::Column::Latitude.between(bbox.min_lat, bbox.max_lat))
            .add(equipment::Column::Longitude.between(bbox.min_lng, bbox.max_lng));
    }
    Ok(list_page::<Equipment>(&state.db, &params, scope).await?)
}

#[utoipa::path(
    get,
    path = "/equipment/{id}",
    tag = "equipment",
    params(("id" = Uuid, Path, description = "Listing id")),
    responses(
        (status = 200, description = "Listing with its images", body = EquipmentDetail),
        (status = 404, description = "Listing not found"),
    ),
    summary = "Get one listing",
    description = "Signed-in callers get the view added to their recently viewed list."
)]
pub async fn get_equipment(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(id): Path<Uuid>,
) -> Result<Json<EquipmentDetail>, ApiError> {
    let listing = load_equipment(&state.db, id).await?;
    let images = load_images(&state.db, id).await?;

    if let Some(user) = user {
        record_view(&state.db, user.id, id, Utc::now(), state.config.recently_viewed_limit).await?;
    }

    Ok(Json(EquipmentDetail {
        equipment: listing.into(),
        images: images.into_iter().map(Image::from).collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/equipment",
    tag = "equipment",
    request_body = EquipmentCreate,
    responses(
        (status = 201, description = "Listing created", body = Equipment),
        (status = 401, description = "Not signed in"),
        (status = 422, description = "Validation failed"),
    ),
    security(("bearer" = [])),
    summary = "Create a listing"
)]
pub async fn create_equipment(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(mut payload): Json<EquipmentCreate>,
) -> Result<(StatusCode, Json<Equipment>), ApiError> {
    payload.validate()?;

    if payload.latitude.is_none()
        && payload.longitude.is_none()
        && let Some(location) = payload.location.as_deref().map(str::trim).filter(|l| !l.is_empty())
        && let Some(coordinates) = geocode_location(state.geocoder.as_ref(), location).await
    {
        payload.latitude = Some(coordinates.latitude);
        payload.longitude = Some(coordinates.longitude);
    }

    let active = payload.into_active_model(user.id);
    let model = active.insert(&state.db).await?;
    info!(equipment_id = %model.id, owner_id = %user.id, "Listing created");
    Ok((StatusCode::CREATED, Json(model.into())))
}

#[utoipa::path(
    put,
    path = "/equipment/{id}",
    tag = "equipment",
    params(("id" = Uuid, Path, description = "Listing id")),
    request_body = EquipmentUpdate,
    responses(
        (status = 200, description = "Listing updated", body = Equipment),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Listing not found"),
        (status = 422, description = "Validation failed"),
    ),
    security(("bearer" = [])),
    summary = "Update a listing"
)]
pub async fn update_equipment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(mut payload): Json<EquipmentUpdate>,
) -> Result<Json<Equipment>, ApiError> {
    let listing = load_equipment(&state.db, id).await?;
    user.require_owner_or_admin(listing.owner_id)?;
    payload.validate()?;

    // A moved listing without explicit coordinates is re-geocoded
    let new_location = payload
        .location
        .as_ref()
        .map(|location| location.as_deref().map(str::trim).filter(|l| !l.is_empty()));
    if let Some(new_location) = new_location
        && new_location != listing.location.as_deref()
        && payload.latitude.is_none()
        && payload.longitude.is_none()
    {
        let coordinates = match new_location {
            Some(location) => geocode_location(state.geocoder.as_ref(), location).await,
            None => None,
        };
        payload.latitude = Some(coordinates.map(|c| c.latitude));
        payload.longitude = Some(coordinates.map(|c| c.longitude));
    }

    let mut active = listing.into_active_model();
    payload.merge_into(&mut active);
    let updated = active.update(&state.db).await?;
    Ok(Json(updated.into()))
}

#[utoipa::path(
    delete,
    path = "/equipment/{id}",
    tag = "equipment",
    params(("id" = Uuid, Path, description = "Listing id")),
    responses(
        (status = 204, description = "Listing deleted"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Listing not found"),
        (status = 409, description = "Listing has approved bookings that have not ended"),
    ),
    security(("bearer" = [])),
    summary = "Delete a listing"
)]
pub async fn delete_equipment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let listing = load_equipment(&state.db, id).await?;
    user.require_owner_or_admin(listing.owner_id)?;
    if has_active_bookings(&state.db, id).await? {
        return Err(ApiError::conflict(
            "This listing has approved bookings that have not ended yet",
        ));
    }
    delete_listing(&state, &listing).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/equipment/batch",
    tag = "equipment",
    request_body = Vec<Uuid>,
    responses(
        (status = 200, description = "Ids that were deleted", body = [Uuid]),
        (status = 403, description = "Admins only"),
    ),
    security(("bearer" = [])),
    summary = "Delete many listings",
    description = "Unknown ids, listings with approved bookings that have not ended and listings whose images cannot be removed are skipped."
)]
pub async fn delete_equipment_batch(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(ids): Json<Vec<Uuid>>,
) -> Result<Json<Vec<Uuid>>, ApiError> {
    user.require_admin()?;

    let listings = equipment::Entity::find()
        .filter(equipment::Column::Id.is_in(ids))
        .all(&state.db)
        .await?;

    let mut deleted = Vec::with_capacity(listings.len());
    for listing in listings {
        if has_active_bookings(&state.db, listing.id).await? {
            warn!(equipment_id = %listing.id, "Skipping listing with active bookings");
            continue;
        }
        match delete_listing(&state, &listing).await {
            Ok(()) => deleted.push(listing.id),
            Err(e) => warn!(equipment_id = %listing.id, error = %e, "Skipping listing"),
        }
    }
    Ok(Json(deleted))
}
