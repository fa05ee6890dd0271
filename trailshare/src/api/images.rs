use axum::{
    Json,
    extract::{Multipart, Path, State, multipart::MultipartError},
    http::StatusCode,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, QueryFilter, QueryOrder,
    TransactionTrait, sea_query::Expr,
};
use tracing::{info, warn};
use utoipa_axum::{router::OpenApiRouter, routes};
use uuid::Uuid;

use super::equipment::{load_equipment, load_images};
use crate::{
    auth::CurrentUser,
    entities::equipment_image,
    errors::ApiError,
    media::{
        ImageFormat, content_hash,
        dedup::{plan_dedupe, signature},
        normalize_file_name,
    },
    resources::image::{DedupeReport, Image},
    state::AppState,
};

pub fn router() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_images, upload_image))
        .routes(routes!(set_primary_image))
        .routes(routes!(delete_image))
        .routes(routes!(dedupe_images))
}

const UPLOAD_FIELD: &str = "file";

fn multipart_error(err: MultipartError) -> ApiError {
    ApiError::custom(err.status(), err.body_text(), None)
}

fn storage_error(err: impl std::fmt::Display) -> ApiError {
    ApiError::internal("Image storage failed", Some(err.to_string()))
}

/// Object key of an image: `equipment/{equipment_id}/{image_id}.{ext}`
#[must_use]
pub fn storage_key(equipment_id: Uuid, image_id: Uuid, format: ImageFormat) -> String {
    format!("equipment/{equipment_id}/{image_id}.{}", format.extension())
}

async fn load_image(
    state: &AppState,
    equipment_id: Uuid,
    image_id: Uuid,
) -> Result<equipment_image::Model, ApiError> {
    equipment_image::Entity::find_by_id(image_id)
        .filter(equipment_image::Column::EquipmentId.eq(equipment_id))
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Image", Some(image_id.to_string())))
}

/// Listing must exist and the caller must own it (or be an admin)
async fn authorize_listing(state: &AppState, user: &CurrentUser, id: Uuid) -> Result<(), ApiError> {
    let listing = load_equipment(&state.db, id).await?;
    user.require_owner_or_admin(listing.owner_id)
}

#[utoipa::path(
    get,
    path = "/equipment/{id}/images",
    tag = "images",
    params(("id" = Uuid, Path, description = "Listing id")),
    responses(
        (status = 200, description = "Images, primary first", body = [Image]),
        (status = 404, description = "Listing not found"),
    ),
    summary = "List a listing's images"
)]
pub async fn list_images(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Image>>, ApiError> {
    load_equipment(&state.db, id).await?;
    let images = load_images(&state.db, id).await?;
    Ok(Json(images.into_iter().map(Image::from).collect()))
}

#[utoipa::path(
    post,
    path = "/equipment/{id}/images",
    tag = "images",
    params(("id" = Uuid, Path, description = "Listing id")),
    request_body(content_type = "multipart/form-data", description = "Image in the `file` field"),
    responses(
        (status = 201, description = "Image stored", body = Image),
        (status = 200, description = "Identical image already attached; nothing stored", body = Image),
        (status = 400, description = "Missing, empty, oversized or unsupported file"),
        (status = 403, description = "Not the owner"),
    ),
    security(("bearer" = [])),
    summary = "Upload an image",
    description = "Accepts JPEG, PNG, WebP and GIF, detected from the file contents. The first image of a listing becomes its primary image."
)]
pub async fn upload_image(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Image>), ApiError> {
    authorize_listing(&state, &user, id).await?;

    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let original_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(multipart_error)?;
        upload = Some((original_name, bytes));
        break;
    }
    let Some((original_name, bytes)) = upload else {
        return Err(ApiError::bad_request("Expected an image in the `file` field"));
    };

    if bytes.is_empty() {
        return Err(ApiError::bad_request("The uploaded file is empty"));
    }
    let max = state.config.max_upload_bytes;
    if bytes.len() > max {
        return Err(ApiError::bad_request(format!(
            "Images may be at most {max} bytes"
        )));
    }
    let format = ImageFormat::detect(&bytes)
        .ok_or_else(|| ApiError::bad_request("Only JPEG, PNG, WebP and GIF images are supported"))?;

    let hash = content_hash(&bytes);
    let existing = load_images(&state.db, id).await?;
    if let Some(duplicate) = existing.iter().find(|image| image.content_hash == hash) {
        info!(equipment_id = %id, image_id = %duplicate.id, "Identical image already attached");
        return Ok((StatusCode::OK, Json(duplicate.clone().into())));
    }

    let image_id = Uuid::new_v4();
    let key = storage_key(id, image_id, format);
    let file_name = normalize_file_name(&original_name, format);
    state.store.put(&key, &bytes).await.map_err(storage_error)?;

    let row = equipment_image::ActiveModel {
        id: Set(image_id),
        equipment_id: Set(id),
        storage_key: Set(key.clone()),
        url: Set(state.store.public_url(&key)),
        signature: Set(signature(&file_name)),
        file_name: Set(file_name),
        content_type: Set(format.content_type().to_string()),
        size_bytes: Set(i64::try_from(bytes.len()).unwrap_or(i64::MAX)),
        content_hash: Set(hash),
        is_primary: Set(existing.is_empty()),
        created_at: Set(Utc::now()),
    };
    let model = match row.insert(&state.db).await {
        Ok(model) => model,
        Err(e) => {
            if let Err(cleanup) = state.store.delete(&key).await {
                warn!(key, error = %cleanup, "Could not remove orphaned image object");
            }
            return Err(e.into());
        }
    };

    info!(equipment_id = %id, image_id = %model.id, bytes = bytes.len(), "Image uploaded");
    Ok((StatusCode::CREATED, Json(model.into())))
}

#[utoipa::path(
    put,
    path = "/equipment/{id}/images/{image_id}/primary",
    tag = "images",
    params(
        ("id" = Uuid, Path, description = "Listing id"),
        ("image_id" = Uuid, Path, description = "Image id"),
    ),
    responses(
        (status = 200, description = "Image is now primary", body = Image),
        (status = 404, description = "Image not found on this listing"),
    ),
    security(("bearer" = [])),
    summary = "Make an image primary"
)]
pub async fn set_primary_image(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((id, image_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Image>, ApiError> {
    authorize_listing(&state, &user, id).await?;
    let image = load_image(&state, id, image_id).await?;

    let txn = state.db.begin().await?;
    equipment_image::Entity::update_many()
        .col_expr(equipment_image::Column::IsPrimary, Expr::value(false))
        .filter(equipment_image::Column::EquipmentId.eq(id))
        .exec(&txn)
        .await?;
    let mut active: equipment_image::ActiveModel = image.into();
    active.is_primary = Set(true);
    let updated = active.update(&txn).await?;
    txn.commit().await?;

    Ok(Json(updated.into()))
}

#[utoipa::path(
    delete,
    path = "/equipment/{id}/images/{image_id}",
    tag = "images",
    params(
        ("id" = Uuid, Path, description = "Listing id"),
        ("image_id" = Uuid, Path, description = "Image id"),
    ),
    responses(
        (status = 204, description = "Image deleted"),
        (status = 404, description = "Image not found on this listing"),
    ),
    security(("bearer" = [])),
    summary = "Delete an image",
    description = "Deleting the primary image promotes the oldest remaining one."
)]
pub async fn delete_image(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((id, image_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    authorize_listing(&state, &user, id).await?;
    let image = load_image(&state, id, image_id).await?;

    state.store.delete(&image.storage_key).await.map_err(storage_error)?;

    let txn = state.db.begin().await?;
    equipment_image::Entity::delete_by_id(image.id).exec(&txn).await?;
    if image.is_primary
        && let Some(oldest) = equipment_image::Entity::find()
            .filter(equipment_image::Column::EquipmentId.eq(id))
            .order_by_asc(equipment_image::Column::CreatedAt)
            .order_by_asc(equipment_image::Column::Id)
            .one(&txn)
            .await?
    {
        let mut active: equipment_image::ActiveModel = oldest.into();
        active.is_primary = Set(true);
        active.update(&txn).await?;
    }
    txn.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/equipment/{id}/images/dedupe",
    tag = "images",
    params(("id" = Uuid, Path, description = "Listing id")),
    responses(
        (status = 200, description = "Which images were kept and which removed", body = DedupeReport),
        (status = 403, description = "Not the owner"),
    ),
    security(("bearer" = [])),
    summary = "Remove duplicate images",
    description = "Images with identical contents, or whose file names only differ by conversion suffixes, copy markers, counters or timestamp prefixes, are grouped and one image per group is kept."
)]
pub async fn dedupe_images(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<DedupeReport>, ApiError> {
    authorize_listing(&state, &user, id).await?;
    let images = load_images(&state.db, id).await?;
    let plan = plan_dedupe(&images);
    if plan.removed.is_empty() && plan.new_primary.is_none() {
        return Ok(Json(DedupeReport {
            kept: plan.kept,
            removed: plan.removed,
        }));
    }

    for image in images.iter().filter(|image| plan.removed.contains(&image.id)) {
        state.store.delete(&image.storage_key).await.map_err(storage_error)?;
    }

    let txn = state.db.begin().await?;
    if !plan.removed.is_empty() {
        equipment_image::Entity::delete_many()
            .filter(equipment_image::Column::Id.is_in(plan.removed.clone()))
            .exec(&txn)
            .await?;
    }
    if let Some(new_primary) = plan.new_primary {
        equipment_image::Entity::update_many()
            .col_expr(equipment_image::Column::IsPrimary, Expr::value(false))
            .filter(equipment_image::Column::EquipmentId.eq(id))
            .exec(&txn)
            .await?;
        equipment_image::Entity::update_many()
            .col_expr(equipment_image::Column::IsPrimary, Expr::value(true))
            .filter(equipment_image::Column::Id.eq(new_primary))
            .exec(&txn)
            .await?;
    }
    txn.commit().await?;

    info!(equipment_id = %id, kept = plan.kept.len(), removed = plan.removed.len(), "Deduplicated images");
    Ok(Json(DedupeReport {
        kept: plan.kept,
        removed: plan.removed,
    }))
}
