use sea_orm_migration::prelude::*;

use crate::entities::{
    account, blog_post, booking, equipment, equipment_image, favorite, profile, recently_viewed,
    user_role,
};

pub struct CreateMarketplaceTables;

impl MigrationName for CreateMarketplaceTables {
    fn name(&self) -> &'static str {
        "m20250601_000001_create_marketplace_tables"
    }
}

fn timestamp<C: IntoIden>(column: C) -> ColumnDef {
    ColumnDef::new(column)
        .timestamp_with_time_zone()
        .not_null()
        .to_owned()
}

fn uuid_key<C: IntoIden>(column: C) -> ColumnDef {
    ColumnDef::new(column).uuid().not_null().primary_key().to_owned()
}

fn uuid_ref<C: IntoIden>(column: C) -> ColumnDef {
    ColumnDef::new(column).uuid().not_null().to_owned()
}

fn accounts() -> TableCreateStatement {
    use account::Column;
    Table::create()
        .table(account::Entity)
        .if_not_exists()
        .col(uuid_key(Column::Id))
        .col(ColumnDef::new(Column::Email).string_len(255).not_null().unique_key())
        .col(ColumnDef::new(Column::PasswordHash).string().not_null())
        .col(timestamp(Column::CreatedAt))
        .to_owned()
}

fn profiles() -> TableCreateStatement {
    use profile::Column;
    Table::create()
        .table(profile::Entity)
        .if_not_exists()
        .col(uuid_key(Column::Id))
        .col(ColumnDef::new(Column::DisplayName).string().not_null())
        .col(ColumnDef::new(Column::Bio).text().null())
        .col(ColumnDef::new(Column::AvatarUrl).string().null())
        .col(ColumnDef::new(Column::Location).string().null())
        .col(ColumnDef::new(Column::Phone).string().null())
        .col(timestamp(Column::CreatedAt))
        .col(timestamp(Column::UpdatedAt))
        .to_owned()
}

fn user_roles() -> TableCreateStatement {
    use user_role::Column;
    Table::create()
        .table(user_role::Entity)
        .if_not_exists()
        .col(uuid_key(Column::Id))
        .col(uuid_ref(Column::UserId))
        .col(ColumnDef::new(Column::Role).string_len(16).not_null())
        .col(timestamp(Column::GrantedAt))
        .to_owned()
}

fn equipment_table() -> TableCreateStatement {
    use equipment::Column;
    Table::create()
        .table(equipment::Entity)
        .if_not_exists()
        .col(uuid_key(Column::Id))
        .col(uuid_ref(Column::OwnerId))
        .col(ColumnDef::new(Column::Title).string_len(120).not_null())
        .col(ColumnDef::new(Column::Description).text().not_null())
        .col(ColumnDef::new(Column::Category).string_len(64).not_null())
        .col(ColumnDef::new(Column::Condition).string_len(16).not_null())
        .col(ColumnDef::new(Column::PricePerDayCents).big_integer().not_null())
        .col(ColumnDef::new(Column::DepositCents).big_integer().not_null().default(0))
        .col(ColumnDef::new(Column::Location).string().null())
        .col(ColumnDef::new(Column::Latitude).double().null())
        .col(ColumnDef::new(Column::Longitude).double().null())
        .col(ColumnDef::new(Column::IsAvailable).boolean().not_null().default(true))
        .col(ColumnDef::new(Column::IsFeatured).boolean().not_null().default(false))
        .col(timestamp(Column::CreatedAt))
        .col(timestamp(Column::UpdatedAt))
        .to_owned()
}

fn equipment_images() -> TableCreateStatement {
    use equipment_image::Column;
    Table::create()
        .table(equipment_image::Entity)
        .if_not_exists()
        .col(uuid_key(Column::Id))
        .col(uuid_ref(Column::EquipmentId))
        .col(ColumnDef::new(Column::StorageKey).string().not_null())
        .col(ColumnDef::new(Column::Url).string().not_null())
        .col(ColumnDef::new(Column::FileName).string().not_null())
        .col(ColumnDef::new(Column::ContentType).string_len(32).not_null())
        .col(ColumnDef::new(Column::SizeBytes).big_integer().not_null())
        .col(ColumnDef::new(Column::ContentHash).string_len(64).not_null())
        .col(ColumnDef::new(Column::Signature).string().not_null())
        .col(ColumnDef::new(Column::IsPrimary).boolean().not_null().default(false))
        .col(timestamp(Column::CreatedAt))
        .to_owned()
}

fn bookings() -> TableCreateStatement {
    use booking::Column;
    Table::create()
        .table(booking::Entity)
        .if_not_exists()
        .col(uuid_key(Column::Id))
        .col(uuid_ref(Column::EquipmentId))
        .col(uuid_ref(Column::RenterId))
        .col(uuid_ref(Column::OwnerId))
        .col(ColumnDef::new(Column::StartDate).date().not_null())
        .col(ColumnDef::new(Column::EndDate).date().not_null())
        .col(ColumnDef::new(Column::TotalPriceCents).big_integer().not_null())
        .col(ColumnDef::new(Column::Status).string_len(16).not_null())
        .col(ColumnDef::new(Column::Message).text().null())
        .col(timestamp(Column::CreatedAt))
        .col(timestamp(Column::UpdatedAt))
        .to_owned()
}

fn blog_posts() -> TableCreateStatement {
    use blog_post::Column;
    Table::create()
        .table(blog_post::Entity)
        .if_not_exists()
        .col(uuid_key(Column::Id))
        .col(uuid_ref(Column::AuthorId))
        .col(ColumnDef::new(Column::Title).string().not_null())
        .col(ColumnDef::new(Column::Slug).string().not_null().unique_key())
        .col(ColumnDef::new(Column::Excerpt).text().not_null())
        .col(ColumnDef::new(Column::Content).text().not_null())
        .col(ColumnDef::new(Column::CoverImageUrl).string().null())
        .col(ColumnDef::new(Column::Tags).string().not_null().default(""))
        .col(ColumnDef::new(Column::Published).boolean().not_null().default(false))
        .col(
            ColumnDef::new(Column::PublishedAt)
                .timestamp_with_time_zone()
                .null(),
        )
        .col(timestamp(Column::CreatedAt))
        .col(timestamp(Column::UpdatedAt))
        .to_owned()
}

fn favorites() -> TableCreateStatement {
    use favorite::Column;
    Table::create()
        .table(favorite::Entity)
        .if_not_exists()
        .col(uuid_ref(Column::UserId))
        .col(uuid_ref(Column::EquipmentId))
        .col(timestamp(Column::AddedAt))
        .primary_key(Index::create().col(Column::UserId).col(Column::EquipmentId))
        .to_owned()
}

fn recently_viewed_table() -> TableCreateStatement {
    use recently_viewed::Column;
    Table::create()
        .table(recently_viewed::Entity)
        .if_not_exists()
        .col(uuid_ref(Column::UserId))
        .col(uuid_ref(Column::EquipmentId))
        .col(timestamp(Column::ViewedAt))
        .primary_key(Index::create().col(Column::UserId).col(Column::EquipmentId))
        .to_owned()
}

fn indexes() -> Vec<IndexCreateStatement> {
    vec![
        Index::create()
            .name("idx_user_roles_user_role")
            .table(user_role::Entity)
            .col(user_role::Column::UserId)
            .col(user_role::Column::Role)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("idx_equipment_owner")
            .table(equipment::Entity)
            .col(equipment::Column::OwnerId)
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("idx_equipment_category")
            .table(equipment::Entity)
            .col(equipment::Column::Category)
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("idx_equipment_images_equipment")
            .table(equipment_image::Entity)
            .col(equipment_image::Column::EquipmentId)
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("idx_bookings_equipment_dates")
            .table(booking::Entity)
            .col(booking::Column::EquipmentId)
            .col(booking::Column::StartDate)
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("idx_bookings_renter")
            .table(booking::Entity)
            .col(booking::Column::RenterId)
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("idx_bookings_owner")
            .table(booking::Entity)
            .col(booking::Column::OwnerId)
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("idx_blog_posts_published")
            .table(blog_post::Entity)
            .col(blog_post::Column::Published)
            .col(blog_post::Column::PublishedAt)
            .if_not_exists()
            .to_owned(),
    ]
}

#[async_trait::async_trait]
impl MigrationTrait for CreateMarketplaceTables {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for table in [
            accounts(),
            profiles(),
            user_roles(),
            equipment_table(),
            equipment_images(),
            bookings(),
            blog_posts(),
            favorites(),
            recently_viewed_table(),
        ] {
            manager.create_table(table).await?;
        }
        for index in indexes() {
            manager.create_index(index).await?;
        }
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Reverse creation order
        manager
            .drop_table(Table::drop().table(recently_viewed::Entity).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(favorite::Entity).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(blog_post::Entity).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(booking::Entity).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(equipment_image::Entity).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(equipment::Entity).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(user_role::Entity).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(profile::Entity).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(account::Entity).to_owned())
            .await?;
        Ok(())
    }
}
