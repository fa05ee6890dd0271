use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::equipment_image;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Image {
    pub id: Uuid,
    pub equipment_id: Uuid,
    pub url: String,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub content_hash: String,
    pub is_primary: bool,
    pub created_at: DateTime<Utc>,
}

impl From<equipment_image::Model> for Image {
    fn from(model: equipment_image::Model) -> Self {
        Self {
            id: model.id,
            equipment_id: model.equipment_id,
            url: model.url,
            file_name: model.file_name,
            content_type: model.content_type,
            size_bytes: model.size_bytes,
            content_hash: model.content_hash,
            is_primary: model.is_primary,
            created_at: model.created_at,
        }
    }
}

/// Result of `POST /equipment/{id}/images/dedupe`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DedupeReport {
    pub kept: Vec<Uuid>,
    pub removed: Vec<Uuid>,
}
