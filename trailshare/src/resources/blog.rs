use chrono::{DateTime, Utc};
use sea_orm::Order;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    content::{reading_time_minutes, split_tags},
    core::ListableResource,
    entities::blog_post,
    validation::{Validatable, ValidationErrors, validators},
};

const TITLE_MAX: usize = 200;
const EXCERPT_MAX: usize = 500;
const CONTENT_MAX: usize = 100_000;
const SLUG_MAX: usize = 80;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BlogPost {
    pub id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub slug: String,
    pub excerpt: String,
    /// Markdown
    pub content: String,
    pub cover_image_url: Option<String>,
    pub tags: Vec<String>,
    pub published: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub reading_time_minutes: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<blog_post::Model> for BlogPost {
    fn from(model: blog_post::Model) -> Self {
        Self {
            reading_time_minutes: reading_time_minutes(&model.content),
            tags: split_tags(&model.tags),
            id: model.id,
            author_id: model.author_id,
            title: model.title,
            slug: model.slug,
            excerpt: model.excerpt,
            content: model.content,
            cover_image_url: model.cover_image_url,
            published: model.published,
            published_at: model.published_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

impl ListableResource for BlogPost {
    type Entity = blog_post::Entity;
    type Column = blog_post::Column;

    const RESOURCE_NAME_SINGULAR: &'static str = "Blog post";
    const RESOURCE_NAME_PLURAL: &'static str = "posts";

    fn default_sort() -> (Self::Column, Order) {
        (blog_post::Column::PublishedAt, Order::Desc)
    }

    fn sortable_columns() -> Vec<(&'static str, Self::Column)> {
        vec![
            ("title", blog_post::Column::Title),
            ("published_at", blog_post::Column::PublishedAt),
            ("created_at", blog_post::Column::CreatedAt),
            ("updated_at", blog_post::Column::UpdatedAt),
        ]
    }

    fn filterable_columns() -> Vec<(&'static str, Self::Column)> {
        vec![
            ("title", blog_post::Column::Title),
            ("tags", blog_post::Column::Tags),
            ("author_id", blog_post::Column::AuthorId),
            ("published", blog_post::Column::Published),
        ]
    }

    fn like_filterable_columns() -> Vec<&'static str> {
        vec!["title", "tags"]
    }

    fn fulltext_searchable_columns() -> Vec<(&'static str, Self::Column)> {
        vec![
            ("title", blog_post::Column::Title),
            ("excerpt", blog_post::Column::Excerpt),
            ("content", blog_post::Column::Content),
        ]
    }
}

fn check_slug(errors: &mut ValidationErrors, slug: &str) {
    errors.check(validators::validate_length("slug", slug, Some(1), Some(SLUG_MAX)));
    if !slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        errors.add(crate::validation::ValidationError::new(
            "slug",
            "Only lowercase letters, digits and dashes are allowed",
        ));
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct BlogPostCreate {
    pub title: String,
    pub content: String,
    /// Derived from the content when absent
    pub excerpt: Option<String>,
    /// Derived from the title when absent
    pub slug: Option<String>,
    pub cover_image_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub published: bool,
}

impl Validatable for BlogPostCreate {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.check(validators::validate_required("title", &self.title));
        errors.check(validators::validate_length("title", &self.title, None, Some(TITLE_MAX)));
        errors.check(validators::validate_length("content", &self.content, None, Some(CONTENT_MAX)));
        if let Some(excerpt) = &self.excerpt {
            errors.check(validators::validate_length("excerpt", excerpt, None, Some(EXCERPT_MAX)));
        }
        if let Some(slug) = &self.slug {
            check_slug(&mut errors, slug);
        }
        errors.result()
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct BlogPostUpdate {
    /// Changing the title keeps the existing slug
    pub title: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub slug: Option<String>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>)]
    pub cover_image_url: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
    pub published: Option<bool>,
}

impl Validatable for BlogPostUpdate {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Some(title) = &self.title {
            errors.check(validators::validate_required("title", title));
            errors.check(validators::validate_length("title", title, None, Some(TITLE_MAX)));
        }
        if let Some(content) = &self.content {
            errors.check(validators::validate_length("content", content, None, Some(CONTENT_MAX)));
        }
        if let Some(excerpt) = &self.excerpt {
            errors.check(validators::validate_length("excerpt", excerpt, None, Some(EXCERPT_MAX)));
        }
        if let Some(slug) = &self.slug {
            check_slug(&mut errors, slug);
        }
        errors.result()
    }
}
