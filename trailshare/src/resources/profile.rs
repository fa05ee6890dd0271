use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue::Set, Order};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    core::ListableResource,
    entities::{profile, user_role::Role},
    validation::{Validatable, ValidationErrors, validators},
};

const DISPLAY_NAME_MAX: usize = 80;
const BIO_MAX: usize = 2000;
const FIELD_MAX: usize = 255;

/// A user's own profile, including private contact fields
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Profile {
    pub id: Uuid,
    pub display_name: String,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub location: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<profile::Model> for Profile {
    fn from(model: profile::Model) -> Self {
        Self {
            id: model.id,
            display_name: model.display_name,
            bio: model.bio,
            avatar_url: model.avatar_url,
            location: model.location,
            phone: model.phone,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

impl ListableResource for Profile {
    type Entity = profile::Entity;
    type Column = profile::Column;

    const RESOURCE_NAME_SINGULAR: &'static str = "Profile";
    const RESOURCE_NAME_PLURAL: &'static str = "users";

    fn default_sort() -> (Self::Column, Order) {
        (profile::Column::CreatedAt, Order::Desc)
    }

    fn sortable_columns() -> Vec<(&'static str, Self::Column)> {
        vec![
            ("display_name", profile::Column::DisplayName),
            ("created_at", profile::Column::CreatedAt),
        ]
    }

    fn filterable_columns() -> Vec<(&'static str, Self::Column)> {
        vec![
            ("id", profile::Column::Id),
            ("display_name", profile::Column::DisplayName),
            ("location", profile::Column::Location),
        ]
    }

    fn like_filterable_columns() -> Vec<&'static str> {
        vec!["display_name", "location"]
    }

    fn fulltext_searchable_columns() -> Vec<(&'static str, Self::Column)> {
        vec![
            ("display_name", profile::Column::DisplayName),
            ("location", profile::Column::Location),
        ]
    }
}

/// What anyone can see about a user
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PublicProfile {
    pub id: Uuid,
    pub display_name: String,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub location: Option<String>,
    pub member_since: DateTime<Utc>,
    pub available_listings: u64,
}

impl PublicProfile {
    #[must_use]
    pub fn new(model: profile::Model, available_listings: u64) -> Self {
        Self {
            id: model.id,
            display_name: model.display_name,
            bio: model.bio,
            avatar_url: model.avatar_url,
            location: model.location,
            member_since: model.created_at,
            available_listings,
        }
    }
}

/// Account as shown to its owner and to admins
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserAccount {
    pub id: Uuid,
    pub email: String,
    pub roles: Vec<Role>,
    pub profile: Option<Profile>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>)]
    pub bio: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>)]
    pub avatar_url: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>)]
    pub location: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>)]
    pub phone: Option<Option<String>>,
}

impl Validatable for ProfileUpdate {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Some(name) = &self.display_name {
            errors.check(validators::validate_required("display_name", name));
            errors.check(validators::validate_length("display_name", name, None, Some(DISPLAY_NAME_MAX)));
        }
        if let Some(Some(bio)) = &self.bio {
            errors.check(validators::validate_length("bio", bio, None, Some(BIO_MAX)));
        }
        for (field, value) in [
            ("avatar_url", &self.avatar_url),
            ("location", &self.location),
            ("phone", &self.phone),
        ] {
            if let Some(Some(value)) = value {
                errors.check(validators::validate_length(field, value, None, Some(FIELD_MAX)));
            }
        }
        errors.result()
    }
}

fn cleaned(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl ProfileUpdate {
    pub fn merge_into(self, model: &mut profile::ActiveModel) {
        if let Some(name) = self.display_name {
            model.display_name = Set(name.trim().to_string());
        }
        if let Some(bio) = self.bio {
            model.bio = Set(cleaned(bio));
        }
        if let Some(avatar_url) = self.avatar_url {
            model.avatar_url = Set(cleaned(avatar_url));
        }
        if let Some(location) = self.location {
            model.location = Set(cleaned(location));
        }
        if let Some(phone) = self.phone {
            model.phone = Set(cleaned(phone));
        }
        model.updated_at = Set(Utc::now());
    }
}
