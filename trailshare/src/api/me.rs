use std::collections::{HashMap, HashSet};

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DbErr, EntityTrait,
    IntoActiveModel, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
    sea_query::OnConflict,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};
use uuid::Uuid;

use super::equipment::load_equipment;
use crate::{
    auth::CurrentUser,
    core::find_by_id,
    entities::{equipment, favorite, profile, recently_viewed},
    errors::ApiError,
    resources::{
        equipment::Equipment,
        profile::{Profile, ProfileUpdate},
    },
    state::AppState,
    sync::{Stamped, merge_by_latest},
    validation::{Validatable, ValidationError, ValidationErrors},
};

/// Most entries accepted per list in one sync request
pub const MAX_SYNC_ENTRIES: usize = 1_000;
/// Ids or rows per statement, below every backend's bind-parameter limit
const BIND_CHUNK: usize = 300;

pub fn router() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_favorites))
        .routes(routes!(add_favorite, remove_favorite))
        .routes(routes!(list_recently_viewed, clear_recently_viewed))
        .routes(routes!(add_recently_viewed))
        .routes(routes!(sync_lists))
        .routes(routes!(get_my_profile, update_my_profile))
}

/// A listing in one of the caller's lists with the time it was added
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SavedListing {
    pub at: DateTime<Utc>,
    pub equipment: Equipment,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct SyncRequest {
    #[serde(default)]
    pub favorites: Vec<Stamped>,
    #[serde(default)]
    pub recently_viewed: Vec<Stamped>,
}

impl Validatable for SyncRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        for (field, entries) in [("favorites", &self.favorites), ("recently_viewed", &self.recently_viewed)] {
            if entries.len() > MAX_SYNC_ENTRIES {
                errors.add(ValidationError::new(
                    field,
                    format!("Must contain at most {MAX_SYNC_ENTRIES} entries"),
                ));
            }
        }
        errors.result()
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SyncResponse {
    pub favorites: Vec<Stamped>,
    pub recently_viewed: Vec<Stamped>,
}

/// Upsert a view and keep only the `limit` newest entries for the user
pub(crate) async fn record_view(
    db: &impl ConnectionTrait,
    user_id: Uuid,
    equipment_id: Uuid,
    at: DateTime<Utc>,
    limit: usize,
) -> Result<(), DbErr> {
    recently_viewed::Entity::insert(recently_viewed::ActiveModel {
        user_id: Set(user_id),
        equipment_id: Set(equipment_id),
        viewed_at: Set(at),
    })
    .on_conflict(
        OnConflict::columns([
            recently_viewed::Column::UserId,
            recently_viewed::Column::EquipmentId,
        ])
        .update_column(recently_viewed::Column::ViewedAt)
        .to_owned(),
    )
    .exec_without_returning(db)
    .await?;

    let overflow: Vec<Uuid> = recently_viewed::Entity::find()
        .select_only()
        .column(recently_viewed::Column::EquipmentId)
        .filter(recently_viewed::Column::UserId.eq(user_id))
        .order_by_desc(recently_viewed::Column::ViewedAt)
        .order_by_asc(recently_viewed::Column::EquipmentId)
        .offset(limit as u64)
        .into_tuple()
        .all(db)
        .await?;
    if !overflow.is_empty() {
        recently_viewed::Entity::delete_many()
            .filter(recently_viewed::Column::UserId.eq(user_id))
            .filter(recently_viewed::Column::EquipmentId.is_in(overflow))
            .exec(db)
            .await?;
    }
    Ok(())
}

/// Join stamped ids with their listings, keeping the order of `entries`
async fn with_listings(
    db: &impl ConnectionTrait,
    entries: Vec<Stamped>,
) -> Result<Vec<SavedListing>, DbErr> {
    let ids: Vec<Uuid> = entries.iter().map(|e| e.equipment_id).collect();
    let mut listings: HashMap<Uuid, equipment::Model> = HashMap::with_capacity(ids.len());
    for chunk in ids.chunks(BIND_CHUNK) {
        let rows = equipment::Entity::find()
            .filter(equipment::Column::Id.is_in(chunk.iter().copied()))
            .all(db)
            .await?;
        listings.extend(rows.into_iter().map(|model| (model.id, model)));
    }
    Ok(entries
        .into_iter()
        .filter_map(|entry| {
            listings.remove(&entry.equipment_id).map(|model| SavedListing {
                at: entry.at,
                equipment: model.into(),
            })
        })
        .collect())
}

async fn favorites_of(db: &impl ConnectionTrait, user_id: Uuid) -> Result<Vec<Stamped>, DbErr> {
    Ok(favorite::Entity::find()
        .filter(favorite::Column::UserId.eq(user_id))
        .order_by_desc(favorite::Column::AddedAt)
        .all(db)
        .await?
        .into_iter()
        .map(|row| Stamped::new(row.equipment_id, row.added_at))
        .collect())
}

async fn recently_viewed_of(db: &impl ConnectionTrait, user_id: Uuid) -> Result<Vec<Stamped>, DbErr> {
    Ok(recently_viewed::Entity::find()
        .filter(recently_viewed::Column::UserId.eq(user_id))
        .order_by_desc(recently_viewed::Column::ViewedAt)
        .all(db)
        .await?
        .into_iter()
        .map(|row| Stamped::new(row.equipment_id, row.viewed_at))
        .collect())
}

#[utoipa::path(
    get,
    path = "/me/favorites",
    tag = "me",
    responses((status = 200, description = "Favorited listings, newest first", body = [SavedListing])),
    security(("bearer" = [])),
    summary = "List favorites"
)]
pub async fn list_favorites(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<SavedListing>>, ApiError> {
    let entries = favorites_of(&state.db, user.id).await?;
    Ok(Json(with_listings(&state.db, entries).await?))
}

#[utoipa::path(
    put,
    path = "/me/favorites/{equipment_id}",
    tag = "me",
    params(("equipment_id" = Uuid, Path, description = "Listing id")),
    responses(
        (status = 204, description = "Listing is a favorite"),
        (status = 404, description = "Listing not found"),
    ),
    security(("bearer" = [])),
    summary = "Add a favorite"
)]
pub async fn add_favorite(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(equipment_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    load_equipment(&state.db, equipment_id).await?;
    favorite::Entity::insert(favorite::ActiveModel {
        user_id: Set(user.id),
        equipment_id: Set(equipment_id),
        added_at: Set(Utc::now()),
    })
    .on_conflict(
        OnConflict::columns([favorite::Column::UserId, favorite::Column::EquipmentId])
            .do_nothing()
            .to_owned(),
    )
    .exec_without_returning(&state.db)
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/me/favorites/{equipment_id}",
    tag = "me",
    params(("equipment_id" = Uuid, Path, description = "Listing id")),
    responses((status = 204, description = "Listing is no longer a favorite")),
    security(("bearer" = [])),
    summary = "Remove a favorite"
)]
pub async fn remove_favorite(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(equipment_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    favorite::Entity::delete_by_id((user.id, equipment_id))
        .exec(&state.db)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/me/recently-viewed",
    tag = "me",
    responses((status = 200, description = "Recently viewed listings, newest first", body = [SavedListing])),
    security(("bearer" = [])),
    summary = "List recently viewed"
)]
pub async fn list_recently_viewed(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<SavedListing>>, ApiError> {
    let entries = recently_viewed_of(&state.db, user.id).await?;
    Ok(Json(with_listings(&state.db, entries).await?))
}

#[utoipa::path(
    post,
    path = "/me/recently-viewed/{equipment_id}",
    tag = "me",
    params(("equipment_id" = Uuid, Path, description = "Listing id")),
    responses(
        (status = 204, description = "View recorded"),
        (status = 404, description = "Listing not found"),
    ),
    security(("bearer" = [])),
    summary = "Record a view"
)]
pub async fn add_recently_viewed(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(equipment_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    load_equipment(&state.db, equipment_id).await?;
    record_view(
        &state.db,
        user.id,
        equipment_id,
        Utc::now(),
        state.config.recently_viewed_limit,
    )
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/me/recently-viewed",
    tag = "me",
    responses((status = 204, description = "History cleared")),
    security(("bearer" = [])),
    summary = "Clear recently viewed"
)]
pub async fn clear_recently_viewed(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<StatusCode, ApiError> {
    recently_viewed::Entity::delete_many()
        .filter(recently_viewed::Column::UserId.eq(user.id))
        .exec(&state.db)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/me/sync",
    tag = "me",
    request_body = SyncRequest,
    responses(
        (status = 200, description = "Merged lists as now stored", body = SyncResponse),
        (status = 422, description = "A list has more than 1000 entries"),
    ),
    security(("bearer" = [])),
    summary = "Merge browser-stored lists",
    description = "Unions the posted favorites and recently viewed entries with the stored ones, keeping the later timestamp per listing. Entries for deleted listings are dropped and nothing is ever removed by omission."
)]
pub async fn sync_lists(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<SyncRequest>,
) -> Result<Json<SyncResponse>, ApiError> {
    payload.validate()?;
    let txn = state.db.begin().await?;
    let server_favorites = favorites_of(&txn, user.id).await?;
    let server_viewed = recently_viewed_of(&txn, user.id).await?;

    let referenced: Vec<Uuid> = server_favorites
        .iter()
        .chain(&server_viewed)
        .chain(&payload.favorites)
        .chain(&payload.recently_viewed)
        .map(|entry| entry.equipment_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let mut existing: HashSet<Uuid> = HashSet::with_capacity(referenced.len());
    for chunk in referenced.chunks(BIND_CHUNK) {
        let found: Vec<Uuid> = equipment::Entity::find()
            .select_only()
            .column(equipment::Column::Id)
            .filter(equipment::Column::Id.is_in(chunk.iter().copied()))
            .into_tuple()
            .all(&txn)
            .await?;
        existing.extend(found);
    }

    let favorites = merge_by_latest(&server_favorites, &payload.favorites, &existing, None);
    let recently_viewed = merge_by_latest(
        &server_viewed,
        &payload.recently_viewed,
        &existing,
        Some(state.config.recently_viewed_limit),
    );

    favorite::Entity::delete_many()
        .filter(favorite::Column::UserId.eq(user.id))
        .exec(&txn)
        .await?;
    for chunk in favorites.chunks(BIND_CHUNK) {
        favorite::Entity::insert_many(chunk.iter().map(|entry| favorite::ActiveModel {
            user_id: Set(user.id),
            equipment_id: Set(entry.equipment_id),
            added_at: Set(entry.at),
        }))
        .exec_without_returning(&txn)
        .await?;
    }

    recently_viewed::Entity::delete_many()
        .filter(recently_viewed::Column::UserId.eq(user.id))
        .exec(&txn)
        .await?;
    for chunk in recently_viewed.chunks(BIND_CHUNK) {
        recently_viewed::Entity::insert_many(chunk.iter().map(|entry| {
            recently_viewed::ActiveModel {
                user_id: Set(user.id),
                equipment_id: Set(entry.equipment_id),
                viewed_at: Set(entry.at),
            }
        }))
        .exec_without_returning(&txn)
        .await?;
    }
    txn.commit().await?;

    tracing::debug!(
        user_id = %user.id,
        favorites = favorites.len(),
        recently_viewed = recently_viewed.len(),
        "Merged client lists"
    );
    Ok(Json(SyncResponse {
        favorites,
        recently_viewed,
    }))
}

#[utoipa::path(
    get,
    path = "/me/profile",
    tag = "me",
    responses((status = 200, description = "Own profile", body = Profile)),
    security(("bearer" = [])),
    summary = "Get own profile"
)]
pub async fn get_my_profile(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Profile>, ApiError> {
    Ok(Json(find_by_id::<Profile>(&state.db, user.id).await?))
}

#[utoipa::path(
    put,
    path = "/me/profile",
    tag = "me",
    request_body = ProfileUpdate,
    responses(
        (status = 200, description = "Profile updated", body = Profile),
        (status = 422, description = "Validation failed"),
    ),
    security(("bearer" = [])),
    summary = "Update own profile",
    description = "Absent fields are left alone; `null` clears bio, avatar_url, location and phone."
)]
pub async fn update_my_profile(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<ProfileUpdate>,
) -> Result<Json<Profile>, ApiError> {
    payload.validate()?;
    let model = profile::Entity::find_by_id(user.id)
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Profile", Some(user.id.to_string())))?;
    let mut active = model.into_active_model();
    payload.merge_into(&mut active);
    Ok(Json(active.update(&state.db).await?.into()))
}
