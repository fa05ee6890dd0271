use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::Order;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    core::ListableResource,
    entities::booking::{self, BookingStatus},
    validation::{Validatable, ValidationError, ValidationErrors, validators},
};

/// Longest rental period accepted, in days
pub const MAX_BOOKING_DAYS: i64 = 90;
const MESSAGE_MAX: usize = 2000;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Booking {
    pub id: Uuid,
    pub equipment_id: Uuid,
    pub renter_id: Uuid,
    pub owner_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_price_cents: i64,
    pub status: BookingStatus,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<booking::Model> for Booking {
    fn from(model: booking::Model) -> Self {
        Self {
            id: model.id,
            equipment_id: model.equipment_id,
            renter_id: model.renter_id,
            owner_id: model.owner_id,
            start_date: model.start_date,
            end_date: model.end_date,
            total_price_cents: model.total_price_cents,
            status: model.status,
            message: model.message,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

impl ListableResource for Booking {
    type Entity = booking::Entity;
    type Column = booking::Column;

    const RESOURCE_NAME_SINGULAR: &'static str = "Booking";
    const RESOURCE_NAME_PLURAL: &'static str = "bookings";

    fn default_sort() -> (Self::Column, Order) {
        (booking::Column::CreatedAt, Order::Desc)
    }

    fn sortable_columns() -> Vec<(&'static str, Self::Column)> {
        vec![
            ("start_date", booking::Column::StartDate),
            ("end_date", booking::Column::EndDate),
            ("total_price_cents", booking::Column::TotalPriceCents),
            ("status", booking::Column::Status),
            ("created_at", booking::Column::CreatedAt),
        ]
    }

    fn filterable_columns() -> Vec<(&'static str, Self::Column)> {
        vec![
            ("id", booking::Column::Id),
            ("equipment_id", booking::Column::EquipmentId),
            ("status", booking::Column::Status),
            ("start_date", booking::Column::StartDate),
            ("end_date", booking::Column::EndDate),
        ]
    }
}

/// Which side of the bookings the caller wants to see
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BookingRole {
    #[default]
    Renter,
    Owner,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct BookingRoleQuery {
    /// `renter` (default) or `owner`
    pub role: Option<BookingRole>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct BookingCreate {
    pub equipment_id: Uuid,
    /// First day, inclusive (`YYYY-MM-DD`)
    pub start_date: NaiveDate,
    /// Last day, inclusive
    pub end_date: NaiveDate,
    pub message: Option<String>,
}

/// Number of rental days, counting both ends
#[must_use]
pub fn inclusive_days(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days() + 1
}

impl Validatable for BookingCreate {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.start_date > self.end_date {
            errors.add(ValidationError::new("end_date", "Must not be before start_date"));
        } else {
            errors.check(validators::validate_range(
                "end_date",
                inclusive_days(self.start_date, self.end_date),
                None,
                Some(MAX_BOOKING_DAYS),
            ));
        }
        if let Some(message) = &self.message {
            errors.check(validators::validate_length("message", message, None, Some(MESSAGE_MAX)));
        }
        errors.result()
    }
}

/// An approved date range on a listing's calendar
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct BookedRange {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}
