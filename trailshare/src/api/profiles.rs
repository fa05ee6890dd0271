use axum::{
    Json,
    extract::{Path, State},
};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use utoipa_axum::{router::OpenApiRouter, routes};
use uuid::Uuid;

use crate::{
    entities::{equipment, profile},
    errors::ApiError,
    resources::profile::PublicProfile,
    state::AppState,
};

pub fn router() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(get_public_profile))
}

#[utoipa::path(
    get,
    path = "/profiles/{id}",
    tag = "profiles",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "Public profile", body = PublicProfile),
        (status = 404, description = "User not found"),
    ),
    summary = "Public profile of a user",
    description = "Contact details are never included."
)]
pub async fn get_public_profile(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PublicProfile>, ApiError> {
    let model = profile::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Profile", Some(id.to_string())))?;
    let available_listings = equipment::Entity::find()
        .filter(equipment::Column::OwnerId.eq(id))
        .filter(equipment::Column::IsAvailable.eq(true))
        .count(&state.db)
        .await?;
    Ok(Json(PublicProfile::new(model, available_listings)))
}
