use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue::Set, Order};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::image::Image;
use crate::{
    core::ListableResource,
    entities::equipment::{self, ItemCondition},
    validation::{Validatable, ValidationErrors, validators},
};

const TITLE_MIN: usize = 3;
const TITLE_MAX: usize = 120;
const DESCRIPTION_MAX: usize = 5000;
const CATEGORY_MAX: usize = 64;
/// Keeps `days * price` for the longest booking well inside `i64`
pub const PRICE_MAX_CENTS: i64 = 100_000_000;

/// A piece of gear offered for rent
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Equipment {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub condition: ItemCondition,
    pub price_per_day_cents: i64,
    pub deposit_cents: i64,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub is_available: bool,
    pub is_featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<equipment::Model> for Equipment {
    fn from(model: equipment::Model) -> Self {
        Self {
            id: model.id,
            owner_id: model.owner_id,
            title: model.title,
            description: model.description,
            category: model.category,
            condition: model.condition,
            price_per_day_cents: model.price_per_day_cents,
            deposit_cents: model.deposit_cents,
            location: model.location,
            latitude: model.latitude,
            longitude: model.longitude,
            is_available: model.is_available,
            is_featured: model.is_featured,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

impl ListableResource for Equipment {
    type Entity = equipment::Entity;
    type Column = equipment::Column;

    const RESOURCE_NAME_SINGULAR: &'static str = "Equipment";
    const RESOURCE_NAME_PLURAL: &'static str = "equipment";

    fn default_sort() -> (Self::Column, Order) {
        (equipment::Column::CreatedAt, Order::Desc)
    }

    fn sortable_columns() -> Vec<(&'static str, Self::Column)> {
        vec![
            ("title", equipment::Column::Title),
            ("category", equipment::Column::Category),
            ("price_per_day_cents", equipment::Column::PricePerDayCents),
            ("deposit_cents", equipment::Column::DepositCents),
            ("created_at", equipment::Column::CreatedAt),
            ("updated_at", equipment::Column::UpdatedAt),
        ]
    }

    fn filterable_columns() -> Vec<(&'static str, Self::Column)> {
        vec![
            ("id", equipment::Column::Id),
            ("owner_id", equipment::Column::OwnerId),
            ("category", equipment::Column::Category),
            ("condition", equipment::Column::Condition),
            ("price_per_day_cents", equipment::Column::PricePerDayCents),
            ("deposit_cents", equipment::Column::DepositCents),
            ("location", equipment::Column::Location),
            ("is_available", equipment::Column::IsAvailable),
            ("is_featured", equipment::Column::IsFeatured),
            ("created_at", equipment::Column::CreatedAt),
        ]
    }

    fn like_filterable_columns() -> Vec<&'static str> {
        vec!["location"]
    }

    fn fulltext_searchable_columns() -> Vec<(&'static str, Self::Column)> {
        vec![
            ("title", equipment::Column::Title),
            ("description", equipment::Column::Description),
            ("category", equipment::Column::Category),
            ("location", equipment::Column::Location),
        ]
    }
}

/// Listing with its images, primary first
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EquipmentDetail {
    #[serde(flatten)]
    pub equipment: Equipment,
    pub images: Vec<Image>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct EquipmentCreate {
    pub title: String,
    pub description: String,
    pub category: String,
    pub condition: ItemCondition,
    pub price_per_day_cents: i64,
    #[serde(default)]
    pub deposit_cents: i64,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(default = "default_available")]
    pub is_available: bool,
}

fn default_available() -> bool {
    true
}

fn check_common(
    errors: &mut ValidationErrors,
    title: Option<&str>,
    description: Option<&str>,
    category: Option<&str>,
    price: Option<i64>,
    deposit: Option<i64>,
) {
    if let Some(title) = title {
        errors.check(validators::validate_required("title", title));
        errors.check(validators::validate_length("title", title.trim(), Some(TITLE_MIN), Some(TITLE_MAX)));
    }
    if let Some(description) = description {
        errors.check(validators::validate_length("description", description, None, Some(DESCRIPTION_MAX)));
    }
    if let Some(category) = category {
        errors.check(validators::validate_required("category", category));
        errors.check(validators::validate_length("category", category, None, Some(CATEGORY_MAX)));
    }
    if let Some(price) = price {
        errors.check(validators::validate_range("price_per_day_cents", price, Some(1), Some(PRICE_MAX_CENTS)));
    }
    if let Some(deposit) = deposit {
        errors.check(validators::validate_range("deposit_cents", deposit, Some(0), Some(PRICE_MAX_CENTS)));
    }
}

impl Validatable for EquipmentCreate {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        check_common(
            &mut errors,
            Some(&self.title),
            Some(&self.description),
            Some(&self.category),
            Some(self.price_per_day_cents),
            Some(self.deposit_cents),
        );
        errors.check(validators::validate_coordinates(self.latitude, self.longitude));
        errors.result()
    }
}

impl EquipmentCreate {
    #[must_use]
    pub fn into_active_model(self, owner_id: Uuid) -> equipment::ActiveModel {
        let now = Utc::now();
        equipment::ActiveModel {
            id: Set(Uuid::new_v4()),
            owner_id: Set(owner_id),
            title: Set(self.title.trim().to_string()),
            description: Set(self.description),
            category: Set(self.category.trim().to_lowercase()),
            condition: Set(self.condition),
            price_per_day_cents: Set(self.price_per_day_cents),
            deposit_cents: Set(self.deposit_cents),
            location: Set(self.location.map(|l| l.trim().to_string()).filter(|l| !l.is_empty())),
            latitude: Set(self.latitude),
            longitude: Set(self.longitude),
            is_available: Set(self.is_available),
            is_featured: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
        }
    }
}

/// Partial update. `null` clears the nullable fields, an absent field is left alone.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct EquipmentUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub condition: Option<ItemCondition>,
    pub price_per_day_cents: Option<i64>,
    pub deposit_cents: Option<i64>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>)]
    pub location: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<f64>)]
    pub latitude: Option<Option<f64>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<f64>)]
    pub longitude: Option<Option<f64>>,
    pub is_available: Option<bool>,
}

impl Validatable for EquipmentUpdate {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        check_common(
            &mut errors,
            self.title.as_deref(),
            self.description.as_deref(),
            self.category.as_deref(),
            self.price_per_day_cents,
            self.deposit_cents,
        );
        // Coordinates are only checked as a pair when both are being set
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => errors.check(validators::validate_coordinates(lat, lng)),
            (Some(Some(lat)), None) => {
                errors.check(validators::validate_range("latitude", lat, Some(-90.0), Some(90.0)));
            }
            (None, Some(Some(lng))) => {
                errors.check(validators::validate_range("longitude", lng, Some(-180.0), Some(180.0)));
            }
            _ => {}
        }
        errors.result()
    }
}

impl EquipmentUpdate {
    /// Apply the present fields to `model`
    pub fn merge_into(self, model: &mut equipment::ActiveModel) {
        if let Some(title) = self.title {
            model.title = Set(title.trim().to_string());
        }
        if let Some(description) = self.description {
            model.description = Set(description);
        }
        if let Some(category) = self.category {
            model.category = Set(category.trim().to_lowercase());
        }
        if let Some(condition) = self.condition {
            model.condition = Set(condition);
        }
        if let Some(price) = self.price_per_day_cents {
            model.price_per_day_cents = Set(price);
        }
        if let Some(deposit) = self.deposit_cents {
            model.deposit_cents = Set(deposit);
        }
        if let Some(location) = self.location {
            model.location = Set(location.map(|l| l.trim().to_string()).filter(|l| !l.is_empty()));
        }
        if let Some(latitude) = self.latitude {
            model.latitude = Set(latitude);
        }
        if let Some(longitude) = self.longitude {
            model.longitude = Set(longitude);
        }
        if let Some(available) = self.is_available {
            model.is_available = Set(available);
        }
        model.updated_at = Set(Utc::now());
    }
}
