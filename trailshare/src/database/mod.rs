//! Connection setup and schema migration.

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;
use tracing::info;

use crate::migration::Migrator;

/// Open a pool for `url`.
///
/// An in-memory SQLite database only lives as long as its connection, so
/// such URLs get a pool of exactly one connection.
///
/// # Errors
/// Connection failures.
pub async fn connect(url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(url.to_owned());
    if url.contains(":memory:") || url.contains("mode=memory") {
        options.max_connections(1).min_connections(1);
    }
    options.sqlx_logging(false);
    Database::connect(options).await
}

/// Apply every pending migration
///
/// # Errors
/// Migration failures.
pub async fn migrate(db: &DatabaseConnection) -> Result<(), DbErr> {
    Migrator::up(db, None).await?;
    info!("Database schema is up to date");
    Ok(())
}

/// [`connect`] then [`migrate`]
///
/// # Errors
/// Connection or migration failures.
pub async fn connect_and_migrate(url: &str) -> Result<DatabaseConnection, DbErr> {
    let db = connect(url).await?;
    migrate(&db).await?;
    Ok(db)
}
