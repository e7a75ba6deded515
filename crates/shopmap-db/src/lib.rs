use shopmap_core::AppConfig;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use thiserror::Error;

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_MIN_CONNECTIONS: u32 = 1;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 10;

// Path relative to crates/shopmap-db/Cargo.toml; resolves to <workspace-root>/migrations/
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

// Postgres SQLSTATE codes we surface as typed errors.
const FOREIGN_KEY_VIOLATION: &str = "23503";
const UNIQUE_VIOLATION: &str = "23505";
const CHECK_VIOLATION: &str = "23514";

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_connections: DEFAULT_MIN_CONNECTIONS,
            acquire_timeout_secs: DEFAULT_ACQUIRE_TIMEOUT_SECS,
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_connections: config.db_max_connections,
            min_connections: config.db_min_connections,
            acquire_timeout_secs: config.db_acquire_timeout_secs,
        }
    }
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("record not found")]
    NotFound,
    /// A write referenced a row that does not exist, or a delete was blocked
    /// by rows that still reference the target.
    #[error("foreign key violation on {constraint}")]
    ForeignKeyViolation { constraint: String },
    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },
    #[error("check constraint violated: {constraint}")]
    CheckViolation { constraint: String },
    #[error("{0}")]
    Conflict(String),
    #[error("metadata key '{0}' not found")]
    MissingMetadataKey(String),
    #[error(transparent)]
    Sqlx(sqlx::Error),
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl From<sqlx::Error> for DbError {
    fn from(error: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = error {
            let constraint = db_err.constraint().unwrap_or("unknown").to_string();
            match db_err.code().as_deref() {
                Some(FOREIGN_KEY_VIOLATION) => return Self::ForeignKeyViolation { constraint },
                Some(UNIQUE_VIOLATION) => return Self::UniqueViolation { constraint },
                Some(CHECK_VIOLATION) => return Self::CheckViolation { constraint },
                _ => {}
            }
        }
        Self::Sqlx(error)
    }
}

/// Offset/limit window applied to list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: i64,
    pub limit: i64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 100,
        }
    }
}

/// Connect to a Postgres pool using explicit URL and config.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the connection cannot be established.
pub async fn connect_pool(database_url: &str, config: PoolConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(database_url)
        .await
}

/// Run all pending migrations against the pool.
///
/// Returns the number of migrations that were applied.
///
/// # Errors
///
/// Returns [`sqlx::migrate::MigrateError`] if any migration fails.
pub async fn run_migrations(pool: &PgPool) -> Result<usize, sqlx::migrate::MigrateError> {
    // _sqlx_migrations does not exist on a fresh database; treat that as zero applied.
    let applied_before: i64 =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = true")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    MIGRATOR.run(pool).await?;

    let applied_after: i64 =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = true")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    let delta = (applied_after - applied_before).max(0);
    Ok(usize::try_from(delta).unwrap_or(0))
}

/// Send a `SELECT 1` to verify the pool has a live connection.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the query fails.
pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await?;
    Ok(())
}

/// Ping the pool and return a typed error on failure.
///
/// # Errors
///
/// Returns [`DbError`] if the ping fails.
pub async fn health_check(pool: &PgPool) -> Result<(), DbError> {
    ping(pool).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_config_has_sane_defaults() {
        let config = PoolConfig::default();

        assert_eq!(config.max_connections, DEFAULT_MAX_CONNECTIONS);
        assert_eq!(config.min_connections, DEFAULT_MIN_CONNECTIONS);
        assert_eq!(config.acquire_timeout_secs, DEFAULT_ACQUIRE_TIMEOUT_SECS);
    }

    #[test]
    fn default_page_starts_at_zero() {
        let page = Page::default();
        assert_eq!(page.offset, 0);
        assert_eq!(page.limit, 100);
    }

    #[test]
    fn non_database_sqlx_errors_stay_opaque() {
        let err = DbError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, DbError::Sqlx(sqlx::Error::RowNotFound)));
    }
}

pub mod categories;
pub mod colors;
pub mod inventory;
pub mod metadata;
pub mod products;
pub mod seed;
pub mod shops;
pub mod sizes;

pub use categories::{
    category_exists, create_category, delete_category, get_category, list_categories,
    update_category, CategoryFilter, CategoryRow, CategoryUpdate, NewCategory,
};
pub use colors::{
    color_exists, create_color, delete_color, get_color, list_colors, update_color, ColorRow,
};
pub use inventory::{
    create_inventory, delete_inventory, get_inventory, list_inventory, update_inventory,
    InventoryFilter, InventoryRow, InventoryUpdate, NewInventory,
};
pub use metadata::{
    delete_metadata_key, get_metadata, insert_metadata_key, update_metadata_key, MetadataMap,
    MetadataOwner,
};
pub use products::{
    create_product, get_product, list_products, list_products_for_shop, list_products_with_shop,
    product_exists, soft_delete_product, update_product, NewProduct, ProductFilter, ProductRow,
    ProductUpdate, ProductWithShopFilter, ProductWithShopRow,
};
pub use seed::{seed_defaults, SeedSummary};
pub use shops::{
    create_shop, get_shop, list_nearby_shops, list_shops, shop_exists, soft_delete_shop,
    update_shop, NearbyShopRow, NewShop, ShopFilter, ShopRow, ShopUpdate,
};
pub use sizes::{
    create_size, delete_size, get_size, list_sizes, size_exists, update_size, SizeRow,
};
