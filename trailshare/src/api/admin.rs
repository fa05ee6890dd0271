use std::collections::{BTreeMap, BTreeSet, HashMap};

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, EntityTrait, IntoActiveModel,
    Iterable, PaginatorTrait, QueryFilter, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};
use uuid::Uuid;

use super::{auth::user_account, equipment::load_equipment};
use crate::{
    auth::CurrentUser,
    core::{Page, list_page},
    entities::{
        account, blog_post,
        booking::{self, BookingStatus},
        equipment,
        user_role::{self, Role},
    },
    errors::ApiError,
    filtering::FilterOptions,
    resources::{
        equipment::Equipment,
        profile::{Profile, UserAccount},
    },
    state::AppState,
};

pub fn router() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_users))
        .routes(routes!(set_user_roles))
        .routes(routes!(stats))
        .routes(routes!(set_featured))
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RolesUpdate {
    pub roles: Vec<Role>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct FeaturedUpdate {
    pub featured: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AdminStats {
    pub users: u64,
    pub listings: u64,
    pub available_listings: u64,
    /// Keyed by status name; every status is present
    pub bookings: BTreeMap<String, u64>,
    pub published_posts: u64,
}

/// Roles to store: the requested ones plus `user`, sorted and unique
fn effective_roles(requested: &[Role]) -> Vec<Role> {
    requested
        .iter()
        .copied()
        .chain(std::iter::once(Role::User))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[utoipa::path(
    get,
    path = "/admin/users",
    tag = "admin",
    params(FilterOptions),
    responses(
        (status = 200, description = "Users with email and roles", body = [UserAccount]),
        (status = 403, description = "Admins only"),
    ),
    security(("bearer" = [])),
    summary = "List users"
)]
pub async fn list_users(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(params): Query<FilterOptions>,
) -> Result<Page<UserAccount>, ApiError> {
    user.require_admin()?;
    let page = list_page::<Profile>(&state.db, &params, Condition::all()).await?;
    let ids: Vec<Uuid> = page.items.iter().map(|p| p.id).collect();

    let emails: HashMap<Uuid, String> = account::Entity::find()
        .filter(account::Column::Id.is_in(ids.clone()))
        .all(&state.db)
        .await?
        .into_iter()
        .map(|a| (a.id, a.email))
        .collect();
    let mut roles: HashMap<Uuid, Vec<Role>> = HashMap::new();
    for row in user_role::Entity::find()
        .filter(user_role::Column::UserId.is_in(ids))
        .all(&state.db)
        .await?
    {
        roles.entry(row.user_id).or_default().push(row.role);
    }

    Ok(page.map(|profile| {
        let mut user_roles = roles.remove(&profile.id).unwrap_or_default();
        user_roles.sort();
        UserAccount {
            id: profile.id,
            email: emails.get(&profile.id).cloned().unwrap_or_default(),
            roles: user_roles,
            profile: Some(profile),
        }
    }))
}

#[utoipa::path(
    put,
    path = "/admin/users/{id}/roles",
    tag = "admin",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = RolesUpdate,
    responses(
        (status = 200, description = "Roles replaced", body = UserAccount),
        (status = 400, description = "Admins cannot drop their own admin role"),
        (status = 403, description = "Admins only"),
        (status = 404, description = "User not found"),
    ),
    security(("bearer" = [])),
    summary = "Replace a user's roles",
    description = "The `user` role is always kept."
)]
pub async fn set_user_roles(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<RolesUpdate>,
) -> Result<Json<UserAccount>, ApiError> {
    user.require_admin()?;
    let target = account::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("User", Some(id.to_string())))?;

    let roles = effective_roles(&payload.roles);
    if id == user.id && !roles.contains(&Role::Admin) {
        return Err(ApiError::bad_request("You cannot remove your own admin role"));
    }

    let now = Utc::now();
    let txn = state.db.begin().await?;
    user_role::Entity::delete_many()
        .filter(user_role::Column::UserId.eq(id))
        .exec(&txn)
        .await?;
    user_role::Entity::insert_many(roles.iter().map(|role| user_role::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(id),
        role: Set(*role),
        granted_at: Set(now),
    }))
    .exec_without_returning(&txn)
    .await?;
    txn.commit().await?;

    info!(
        admin_id = %user.id,
        user_id = %id,
        roles = ?roles.iter().map(|r| r.as_str()).collect::<Vec<_>>(),
        "Roles updated"
    );
    Ok(Json(user_account(&state.db, target).await?))
}

#[utoipa::path(
    get,
    path = "/admin/stats",
    tag = "admin",
    responses(
        (status = 200, description = "Marketplace counters", body = AdminStats),
        (status = 403, description = "Admins only"),
    ),
    security(("bearer" = [])),
    summary = "Marketplace statistics"
)]
pub async fn stats(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<AdminStats>, ApiError> {
    user.require_admin()?;
    let db = &state.db;

    let mut bookings = BTreeMap::new();
    for status in BookingStatus::iter() {
        let count = booking::Entity::find()
            .filter(booking::Column::Status.eq(status))
            .count(db)
            .await?;
        bookings.insert(status.as_str().to_string(), count);
    }

    Ok(Json(AdminStats {
        users: account::Entity::find().count(db).await?,
        listings: equipment::Entity::find().count(db).await?,
        available_listings: equipment::Entity::find()
            .filter(equipment::Column::IsAvailable.eq(true))
            .count(db)
            .await?,
        bookings,
        published_posts: blog_post::Entity::find()
            .filter(blog_post::Column::Published.eq(true))
            .count(db)
            .await?,
    }))
}

#[utoipa::path(
    put,
    path = "/admin/equipment/{id}/featured",
    tag = "admin",
    params(("id" = Uuid, Path, description = "Listing id")),
    request_body = FeaturedUpdate,
    responses(
        (status = 200, description = "Featured flag set", body = Equipment),
        (status = 403, description = "Admins only"),
        (status = 404, description = "Listing not found"),
    ),
    security(("bearer" = [])),
    summary = "Feature or unfeature a listing"
)]
pub async fn set_featured(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<FeaturedUpdate>,
) -> Result<Json<Equipment>, ApiError> {
    user.require_admin()?;
    let listing = load_equipment(&state.db, id).await?;
    let mut active: equipment::ActiveModel = listing.into_active_model();
    active.is_featured = Set(payload.featured);
    active.updated_at = Set(Utc::now());
    Ok(Json(active.update(&state.db).await?.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_role_is_always_kept() {
        assert_eq!(effective_roles(&[]), vec![Role::User]);
        assert_eq!(
            effective_roles(&[Role::Admin, Role::Editor, Role::Admin]),
            vec![Role::User, Role::Editor, Role::Admin]
        );
    }
}
