use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
    sea_query::Expr,
};
use tracing::info;
use utoipa_axum::{router::OpenApiRouter, routes};
use uuid::Uuid;

use super::equipment::load_equipment;
use crate::{
    auth::CurrentUser,
    core::{Page, list_page},
    entities::{
        account,
        booking::{self, BookingStatus},
        equipment,
    },
    errors::ApiError,
    filtering::FilterOptions,
    resources::booking::{
        BookedRange, Booking, BookingCreate, BookingRole, BookingRoleQuery, inclusive_days,
    },
    services::{Email, notify},
    state::AppState,
    validation::Validatable,
};

pub fn router() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(create_booking, list_bookings))
        .routes(routes!(get_booking))
        .routes(routes!(approve_booking))
        .routes(routes!(reject_booking))
        .routes(routes!(cancel_booking))
        .routes(routes!(complete_booking))
        .routes(routes!(equipment_availability))
}

/// Approved bookings of a listing overlapping `[start, end]`, ignoring `except`
async fn overlaps_approved<C: ConnectionTrait>(
    db: &C,
    equipment_id: Uuid,
    start: NaiveDate,
    end: NaiveDate,
    except: Option<Uuid>,
) -> Result<bool, ApiError> {
    let mut query = booking::Entity::find()
        .filter(booking::Column::EquipmentId.eq(equipment_id))
        .filter(booking::Column::Status.eq(BookingStatus::Approved))
        .filter(booking::Column::StartDate.lte(end))
        .filter(booking::Column::EndDate.gte(start));
    if let Some(id) = except {
        query = query.filter(booking::Column::Id.ne(id));
    }
    Ok(query.count(db).await? > 0)
}

async fn load_booking(db: &DatabaseConnection, id: Uuid) -> Result<booking::Model, ApiError> {
    booking::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| ApiError::not_found("Booking", Some(id.to_string())))
}

async fn email_of(db: &DatabaseConnection, user_id: Uuid) -> Result<Option<String>, ApiError> {
    Ok(account::Entity::find_by_id(user_id)
        .one(db)
        .await?
        .map(|account| account.email))
}

/// Email a participant about a booking; missing accounts are skipped
async fn notify_user(state: &AppState, user_id: Uuid, subject: String, text: String) -> Result<(), ApiError> {
    if let Some(to) = email_of(&state.db, user_id).await? {
        notify(state.mailer.as_ref(), Email { to, subject, text }).await;
    }
    Ok(())
}

async fn listing_title(db: &DatabaseConnection, equipment_id: Uuid) -> Result<String, ApiError> {
    Ok(equipment::Entity::find_by_id(equipment_id)
        .one(db)
        .await?
        .map_or_else(|| "your listing".to_string(), |listing| listing.title))
}

/// Move a booking to `next`, enforcing the status machine.
///
/// The status change only applies while the row still holds the status the
/// caller loaded; approvals lock the listing row and re-check overlaps inside
/// the same transaction.
///
/// # Errors
/// 409 for an illegal transition, an overlapping approved booking or a booking
/// changed by another request in the meantime.
pub async fn transition(
    db: &DatabaseConnection,
    booking: booking::Model,
    next: BookingStatus,
) -> Result<booking::Model, ApiError> {
    if !booking.status.can_transition_to(next) {
        return Err(ApiError::conflict(format!(
            "A {} booking cannot become {}",
            booking.status.as_str(),
            next.as_str()
        )));
    }

    let txn = db.begin().await?;
    if next == BookingStatus::Approved {
        // Serializes approvals of the same listing on backends with row locks
        equipment::Entity::find_by_id(booking.equipment_id)
            .lock_exclusive()
            .one(&txn)
            .await?;
        if overlaps_approved(&txn, booking.equipment_id, booking.start_date, booking.end_date, Some(booking.id))
            .await?
        {
            return Err(ApiError::conflict("The equipment is already booked for these dates"));
        }
    }

    let result = booking::Entity::update_many()
        .col_expr(booking::Column::Status, Expr::value(next))
        .col_expr(booking::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(booking::Column::Id.eq(booking.id))
        .filter(booking::Column::Status.eq(booking.status))
        .exec(&txn)
        .await?;
    if result.rows_affected == 0 {
        return Err(ApiError::conflict("The booking was changed by another request"));
    }
    let updated = booking::Entity::find_by_id(booking.id)
        .one(&txn)
        .await?
        .ok_or_else(|| ApiError::not_found("Booking", Some(booking.id.to_string())))?;
    txn.commit().await?;

    info!(booking_id = %updated.id, status = next.as_str(), "Booking status changed");
    Ok(updated)
}

fn require_owner(user: &CurrentUser, booking: &booking::Model) -> Result<(), ApiError> {
    if booking.owner_id == user.id {
        Ok(())
    } else {
        Err(ApiError::forbidden("Only the listing owner can do this"))
    }
}

/// Tell the renter what the owner decided
async fn notify_renter(state: &AppState, booking: &booking::Model) -> Result<(), ApiError> {
    let title = listing_title(&state.db, booking.equipment_id).await?;
    notify_user(
        state,
        booking.renter_id,
        format!("Your booking for {title} was {}", booking.status.as_str()),
        format!(
            "Your booking for {title} from {} to {} is now {}.",
            booking.start_date,
            booking.end_date,
            booking.status.as_str()
        ),
    )
    .await
}

#[utoipa::path(
    post,
    path = "/bookings",
    tag = "bookings",
    request_body = BookingCreate,
    responses(
        (status = 201, description = "Booking requested", body = Booking),
        (status = 400, description = "Own listing or listing unavailable"),
        (status = 404, description = "Listing not found"),
        (status = 409, description = "Dates overlap an approved booking"),
        (status = 422, description = "Invalid dates"),
    ),
    security(("bearer" = [])),
    summary = "Request a booking"
)]
pub async fn create_booking(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<BookingCreate>,
) -> Result<(StatusCode, Json<Booking>), ApiError> {
    payload.validate()?;
    let today = Utc::now().date_naive();
    if payload.start_date < today {
        return Err(ApiError::validation_failed(vec![
            "start_date: Must not be in the past".to_string(),
        ]));
    }

    let listing = load_equipment(&state.db, payload.equipment_id).await?;
    if listing.owner_id == user.id {
        return Err(ApiError::bad_request("You cannot book your own equipment"));
    }
    if !listing.is_available {
        return Err(ApiError::bad_request("This equipment is not available for rent"));
    }
    if overlaps_approved(&state.db, listing.id, payload.start_date, payload.end_date, None).await? {
        return Err(ApiError::conflict("The equipment is already booked for these dates"));
    }

    let days = inclusive_days(payload.start_date, payload.end_date);
    let total_price_cents = days
        .checked_mul(listing.price_per_day_cents)
        .ok_or_else(|| ApiError::bad_request("The total price for these dates is too large"))?;

    let now = Utc::now();
    let model = booking::ActiveModel {
        id: Set(Uuid::new_v4()),
        equipment_id: Set(listing.id),
        renter_id: Set(user.id),
        owner_id: Set(listing.owner_id),
        start_date: Set(payload.start_date),
        end_date: Set(payload.end_date),
        total_price_cents: Set(total_price_cents),
        status: Set(BookingStatus::Pending),
        message: Set(payload.message.map(|m| m.trim().to_string()).filter(|m| !m.is_empty())),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&state.db)
    .await?;

    info!(booking_id = %model.id, equipment_id = %listing.id, renter_id = %user.id, "Booking requested");
    notify_user(
        &state,
        listing.owner_id,
        format!("New booking request for {}", listing.title),
        format!(
            "{} asked to rent {} from {} to {} ({days} days).",
            user.email, listing.title, model.start_date, model.end_date
        ),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(model.into())))
}

#[utoipa::path(
    get,
    path = "/bookings",
    tag = "bookings",
    params(FilterOptions, BookingRoleQuery),
    responses((status = 200, description = "The caller's bookings as renter or owner", body = [Booking])),
    security(("bearer" = [])),
    summary = "List own bookings"
)]
pub async fn list_bookings(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(params): Query<FilterOptions>,
    Query(role): Query<BookingRoleQuery>,
) -> Result<Page<Booking>, ApiError> {
    let scope = match role.role.unwrap_or_default() {
        BookingRole::Renter => Condition::all().add(booking::Column::RenterId.eq(user.id)),
        BookingRole::Owner => Condition::all().add(booking::Column::OwnerId.eq(user.id)),
    };
    Ok(list_page::<Booking>(&state.db, &params, scope).await?)
}

#[utoipa::path(
    get,
    path = "/bookings/{id}",
    tag = "bookings",
    params(("id" = Uuid, Path, description = "Booking id")),
    responses(
        (status = 200, description = "Booking", body = Booking),
        (status = 403, description = "Not a participant"),
        (status = 404, description = "Booking not found"),
    ),
    security(("bearer" = [])),
    summary = "Get a booking"
)]
pub async fn get_booking(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, ApiError> {
    let booking = load_booking(&state.db, id).await?;
    if booking.renter_id != user.id && booking.owner_id != user.id && !user.is_admin() {
        return Err(ApiError::forbidden("You are not part of this booking"));
    }
    Ok(Json(booking.into()))
}

#[utoipa::path(
    post,
    path = "/bookings/{id}/approve",
    tag = "bookings",
    params(("id" = Uuid, Path, description = "Booking id")),
    responses(
        (status = 200, description = "Booking approved", body = Booking),
        (status = 403, description = "Not the owner"),
        (status = 409, description = "Not pending, or dates now overlap an approved booking"),
    ),
    security(("bearer" = [])),
    summary = "Approve a booking"
)]
pub async fn approve_booking(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, ApiError> {
    let booking = load_booking(&state.db, id).await?;
    require_owner(&user, &booking)?;
    let updated = transition(&state.db, booking, BookingStatus::Approved).await?;
    notify_renter(&state, &updated).await?;
    Ok(Json(updated.into()))
}

#[utoipa::path(
    post,
    path = "/bookings/{id}/reject",
    tag = "bookings",
    params(("id" = Uuid, Path, description = "Booking id")),
    responses(
        (status = 200, description = "Booking rejected", body = Booking),
        (status = 403, description = "Not the owner"),
        (status = 409, description = "Not pending"),
    ),
    security(("bearer" = [])),
    summary = "Reject a booking"
)]
pub async fn reject_booking(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, ApiError> {
    let booking = load_booking(&state.db, id).await?;
    require_owner(&user, &booking)?;
    let updated = transition(&state.db, booking, BookingStatus::Rejected).await?;
    notify_renter(&state, &updated).await?;
    Ok(Json(updated.into()))
}

#[utoipa::path(
    post,
    path = "/bookings/{id}/cancel",
    tag = "bookings",
    params(("id" = Uuid, Path, description = "Booking id")),
    responses(
        (status = 200, description = "Booking cancelled", body = Booking),
        (status = 403, description = "Not the renter"),
        (status = 409, description = "Already decided, or the rental has started"),
    ),
    security(("bearer" = [])),
    summary = "Cancel a booking"
)]
pub async fn cancel_booking(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, ApiError> {
    let booking = load_booking(&state.db, id).await?;
    if booking.renter_id != user.id {
        return Err(ApiError::forbidden("Only the renter can cancel a booking"));
    }
    if booking.status == BookingStatus::Approved && Utc::now().date_naive() > booking.start_date {
        return Err(ApiError::conflict("The rental has already started"));
    }
    let updated = transition(&state.db, booking, BookingStatus::Cancelled).await?;

    let title = listing_title(&state.db, updated.equipment_id).await?;
    notify_user(
        &state,
        updated.owner_id,
        format!("Booking for {title} was cancelled"),
        format!(
            "The booking for {title} from {} to {} was cancelled by the renter.",
            updated.start_date, updated.end_date
        ),
    )
    .await?;
    Ok(Json(updated.into()))
}

#[utoipa::path(
    post,
    path = "/bookings/{id}/complete",
    tag = "bookings",
    params(("id" = Uuid, Path, description = "Booking id")),
    responses(
        (status = 200, description = "Booking completed", body = Booking),
        (status = 403, description = "Not the owner"),
        (status = 409, description = "Not approved, or the rental has not ended"),
    ),
    security(("bearer" = [])),
    summary = "Complete a booking"
)]
pub async fn complete_booking(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, ApiError> {
    let booking = load_booking(&state.db, id).await?;
    require_owner(&user, &booking)?;
    if booking.status == BookingStatus::Approved && Utc::now().date_naive() <= booking.end_date {
        return Err(ApiError::conflict("The rental has not ended yet"));
    }
    let updated = transition(&state.db, booking, BookingStatus::Completed).await?;
    notify_renter(&state, &updated).await?;
    Ok(Json(updated.into()))
}

#[utoipa::path(
    get,
    path = "/equipment/{id}/availability",
    tag = "bookings",
    params(("id" = Uuid, Path, description = "Listing id")),
    responses(
        (status = 200, description = "Approved date ranges from today on", body = [BookedRange]),
        (status = 404, description = "Listing not found"),
    ),
    summary = "Booked dates of a listing"
)]
pub async fn equipment_availability(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<BookedRange>>, ApiError> {
    load_equipment(&state.db, id).await?;
    let today = Utc::now().date_naive();
    let ranges = booking::Entity::find()
        .filter(booking::Column::EquipmentId.eq(id))
        .filter(booking::Column::Status.eq(BookingStatus::Approved))
        .filter(booking::Column::EndDate.gte(today))
        .order_by_asc(booking::Column::StartDate)
        .all(&state.db)
        .await?
        .into_iter()
        .map(|b| BookedRange {
            start_date: b.start_date,
            end_date: b.end_date,
        })
        .collect();
    Ok(Json(ranges))
}
