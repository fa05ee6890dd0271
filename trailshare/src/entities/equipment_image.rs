use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "equipment_images")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub equipment_id: Uuid,
    /// Key inside the object store, `equipment/{equipment_id}/{id}.{ext}`
    pub storage_key: String,
    pub url: String,
    /// Normalized file name as uploaded
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    /// Hex sha-256 of the stored bytes
    pub content_hash: String,
    /// Normalized stem used to spot re-encoded copies
    pub signature: String,
    pub is_primary: bool,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
