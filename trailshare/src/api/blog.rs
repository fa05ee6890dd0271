use std::collections::HashSet;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, DatabaseConnection, EntityTrait,
    IntoActiveModel, QueryFilter, QuerySelect,
};
use tracing::info;
use utoipa_axum::{router::OpenApiRouter, routes};
use uuid::Uuid;

use crate::{
    auth::{CurrentUser, MaybeUser},
    content::{derive_excerpt, normalize_tags, slugify, unique_slug},
    core::{Page, list_page},
    entities::{blog_post, user_role::Role},
    errors::ApiError,
    filtering::FilterOptions,
    resources::blog::{BlogPost, BlogPostCreate, BlogPostUpdate},
    state::AppState,
    validation::Validatable,
};

const AUTHORS: [Role; 2] = [Role::Editor, Role::Admin];

pub fn router() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_posts, create_post))
        .routes(routes!(get_post, update_post, delete_post))
}

/// Slugs already used by `base` or one of its numbered variants
async fn taken_slugs(db: &DatabaseConnection, base: &str) -> Result<HashSet<String>, ApiError> {
    let slugs: Vec<String> = blog_post::Entity::find()
        .select_only()
        .column(blog_post::Column::Slug)
        .filter(
            Condition::any()
                .add(blog_post::Column::Slug.eq(base))
                .add(blog_post::Column::Slug.starts_with(format!("{base}-"))),
        )
        .into_tuple()
        .all(db)
        .await?;
    Ok(slugs.into_iter().collect())
}

async fn ensure_slug_free(db: &DatabaseConnection, slug: &str, except: Option<Uuid>) -> Result<(), ApiError> {
    let mut query = blog_post::Entity::find().filter(blog_post::Column::Slug.eq(slug));
    if let Some(id) = except {
        query = query.filter(blog_post::Column::Id.ne(id));
    }
    if query.one(db).await?.is_some() {
        return Err(ApiError::conflict(format!("The slug `{slug}` is already in use")));
    }
    Ok(())
}

fn excerpt_or_derived(excerpt: Option<&str>, content: &str) -> String {
    excerpt
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .map_or_else(|| derive_excerpt(content), ToString::to_string)
}

#[utoipa::path(
    get,
    path = "/blog",
    tag = "blog",
    params(FilterOptions),
    responses((status = 200, description = "Published posts, newest first", body = [BlogPost])),
    summary = "List published posts",
    description = "`title` and `tags` filter by substring; `q` searches title, excerpt and content."
)]
pub async fn list_posts(
    State(state): State<AppState>,
    Query(params): Query<FilterOptions>,
) -> Result<Page<BlogPost>, ApiError> {
    let scope = Condition::all().add(blog_post::Column::Published.eq(true));
    Ok(list_page::<BlogPost>(&state.db, &params, scope).await?)
}

#[utoipa::path(
    get,
    path = "/blog/{key}",
    tag = "blog",
    params(("key" = String, Path, description = "Post slug")),
    responses(
        (status = 200, description = "The post", body = BlogPost),
        (status = 404, description = "No published post with this slug"),
    ),
    summary = "Get a post",
    description = "Editors and admins can also read drafts."
)]
pub async fn get_post(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(slug): Path<String>,
) -> Result<Json<BlogPost>, ApiError> {
    let can_see_drafts = user.is_some_and(|u| AUTHORS.iter().any(|role| u.has_role(*role)));
    let not_found = || ApiError::not_found("Blog post", Some(slug.clone()));
    let post = blog_post::Entity::find()
        .filter(blog_post::Column::Slug.eq(slug.as_str()))
        .one(&state.db)
        .await?
        .ok_or_else(not_found)?;
    if !post.published && !can_see_drafts {
        return Err(not_found());
    }
    Ok(Json(post.into()))
}

#[utoipa::path(
    post,
    path = "/blog",
    tag = "blog",
    request_body = BlogPostCreate,
    responses(
        (status = 201, description = "Post created", body = BlogPost),
        (status = 403, description = "Editors and admins only"),
        (status = 409, description = "Explicit slug already in use"),
        (status = 422, description = "Validation failed"),
    ),
    security(("bearer" = [])),
    summary = "Create a post",
    description = "Without a slug one is derived from the title and numbered when taken. Without an excerpt one is derived from the content."
)]
pub async fn create_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<BlogPostCreate>,
) -> Result<(StatusCode, Json<BlogPost>), ApiError> {
    user.require_role(&AUTHORS)?;
    payload.validate()?;

    let slug = if let Some(slug) = payload.slug.as_deref() {
        ensure_slug_free(&state.db, slug, None).await?;
        slug.to_string()
    } else {
        let base = slugify(&payload.title);
        unique_slug(&base, &taken_slugs(&state.db, &base).await?)
    };

    let now = Utc::now();
    let model = blog_post::ActiveModel {
        id: Set(Uuid::new_v4()),
        author_id: Set(user.id),
        title: Set(payload.title.trim().to_string()),
        slug: Set(slug),
        excerpt: Set(excerpt_or_derived(payload.excerpt.as_deref(), &payload.content)),
        content: Set(payload.content),
        cover_image_url: Set(payload.cover_image_url.filter(|url| !url.trim().is_empty())),
        tags: Set(normalize_tags(&payload.tags)),
        published: Set(payload.published),
        published_at: Set(payload.published.then_some(now)),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&state.db)
    .await?;

    info!(post_id = %model.id, slug = %model.slug, published = model.published, "Blog post created");
    Ok((StatusCode::CREATED, Json(model.into())))
}

#[utoipa::path(
    put,
    path = "/blog/{key}",
    tag = "blog",
    params(("key" = Uuid, Path, description = "Post id")),
    request_body = BlogPostUpdate,
    responses(
        (status = 200, description = "Post updated", body = BlogPost),
        (status = 403, description = "Editors and admins only"),
        (status = 404, description = "Post not found"),
        (status = 409, description = "Slug already in use"),
    ),
    security(("bearer" = [])),
    summary = "Update a post",
    description = "The slug only changes when `slug` is sent. Publishing for the first time sets `published_at`."
)]
pub async fn update_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<BlogPostUpdate>,
) -> Result<Json<BlogPost>, ApiError> {
    user.require_role(&AUTHORS)?;
    payload.validate()?;
    let post = blog_post::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Blog post", Some(id.to_string())))?;

    if let Some(slug) = payload.slug.as_deref()
        && slug != post.slug
    {
        ensure_slug_free(&state.db, slug, Some(id)).await?;
    }

    let first_publication = payload.published == Some(true) && post.published_at.is_none();
    let content = payload.content.clone().unwrap_or_else(|| post.content.clone());
    let mut active = post.into_active_model();
    if let Some(title) = payload.title {
        active.title = Set(title.trim().to_string());
    }
    if let Some(slug) = payload.slug {
        active.slug = Set(slug);
    }
    if let Some(excerpt) = payload.excerpt {
        active.excerpt = Set(excerpt_or_derived(Some(&excerpt), &content));
    }
    if payload.content.is_some() {
        active.content = Set(content);
    }
    if let Some(cover) = payload.cover_image_url {
        active.cover_image_url = Set(cover.filter(|url| !url.trim().is_empty()));
    }
    if let Some(tags) = payload.tags {
        active.tags = Set(normalize_tags(&tags));
    }
    if let Some(published) = payload.published {
        active.published = Set(published);
    }
    let now = Utc::now();
    if first_publication {
        active.published_at = Set(Some(now));
    }
    active.updated_at = Set(now);

    Ok(Json(active.update(&state.db).await?.into()))
}

#[utoipa::path(
    delete,
    path = "/blog/{key}",
    tag = "blog",
    params(("key" = Uuid, Path, description = "Post id")),
    responses(
        (status = 204, description = "Post deleted"),
        (status = 403, description = "Admins only"),
        (status = 404, description = "Post not found"),
    ),
    security(("bearer" = [])),
    summary = "Delete a post"
)]
pub async fn delete_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    user.require_admin()?;
    let result = blog_post::Entity::delete_by_id(id).exec(&state.db).await?;
    if result.rows_affected == 0 {
        return Err(ApiError::not_found("Blog post", Some(id.to_string())));
    }
    Ok(StatusCode::NO_CONTENT)
}
