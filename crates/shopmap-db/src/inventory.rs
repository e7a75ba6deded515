//! Database operations for the `inventory` table: per-product stock rows keyed
//! by optional color and size. Inventory rows are hard-deleted.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::{DbError, Page};

const INVENTORY_COLUMNS: &str =
    "id, product_id, color_id, size_id, amount, short_description, created_at, updated_at";

/// A row from the `inventory` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct InventoryRow {
    pub id: i64,
    pub product_id: i64,
    pub color_id: Option<i64>,
    pub size_id: Option<i64>,
    pub amount: i32,
    pub short_description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewInventory {
    pub product_id: i64,
    pub color_id: Option<i64>,
    pub size_id: Option<i64>,
    pub amount: i32,
    pub short_description: Option<String>,
}

#[allow(clippy::option_option)]
#[derive(Debug, Clone, Default)]
pub struct InventoryUpdate {
    pub product_id: Option<i64>,
    pub color_id: Option<Option<i64>>,
    pub size_id: Option<Option<i64>>,
    pub amount: Option<i32>,
    pub short_description: Option<Option<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct InventoryFilter {
    pub product_id: Option<i64>,
    pub color_id: Option<i64>,
    pub size_id: Option<i64>,
}

/// Lists inventory rows matching `filter`, ordered by id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_inventory(
    pool: &PgPool,
    filter: &InventoryFilter,
    page: Page,
) -> Result<Vec<InventoryRow>, DbError> {
    let sql = format!(
        "SELECT {INVENTORY_COLUMNS} \
         FROM inventory \
         WHERE ($1::BIGINT IS NULL OR product_id = $1) \
           AND ($2::BIGINT IS NULL OR color_id = $2) \
           AND ($3::BIGINT IS NULL OR size_id = $3) \
         ORDER BY id \
         OFFSET $4 LIMIT $5"
    );
    let rows = sqlx::query_as::<_, InventoryRow>(&sql)
        .bind(filter.product_id)
        .bind(filter.color_id)
        .bind(filter.size_id)
        .bind(page.offset)
        .bind(page.limit)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_inventory(pool: &PgPool, id: i64) -> Result<Option<InventoryRow>, DbError> {
    let sql = format!("SELECT {INVENTORY_COLUMNS} FROM inventory WHERE id = $1");
    let row = sqlx::query_as::<_, InventoryRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Inserts an inventory row and returns it.
///
/// # Errors
///
/// Returns [`DbError::ForeignKeyViolation`] if a referenced product, color or
/// size does not exist, or [`DbError::Sqlx`] if the insert fails.
pub async fn create_inventory(
    pool: &PgPool,
    inventory: &NewInventory,
) -> Result<InventoryRow, DbError> {
    let sql = format!(
        "INSERT INTO inventory (product_id, color_id, size_id, amount, short_description) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING {INVENTORY_COLUMNS}"
    );
    let row = sqlx::query_as::<_, InventoryRow>(&sql)
        .bind(inventory.product_id)
        .bind(inventory.color_id)
        .bind(inventory.size_id)
        .bind(inventory.amount)
        .bind(inventory.short_description.as_deref())
        .fetch_one(pool)
        .await?;
    Ok(row)
}

/// Applies a sparse update to an inventory row. Returns `None` if it does not exist.
///
/// # Errors
///
/// Returns [`DbError::ForeignKeyViolation`] if a new reference does not
/// exist, or [`DbError::Sqlx`] if the query fails.
pub async fn update_inventory(
    pool: &PgPool,
    id: i64,
    update: &InventoryUpdate,
) -> Result<Option<InventoryRow>, DbError> {
    let sql = format!(
        "UPDATE inventory \
         SET product_id        = COALESCE($2, product_id), \
             color_id          = CASE WHEN $3::BOOL THEN $4 ELSE color_id END, \
             size_id           = CASE WHEN $5::BOOL THEN $6 ELSE size_id END, \
             amount            = COALESCE($7, amount), \
             short_description = CASE WHEN $8::BOOL THEN $9 ELSE short_description END, \
             updated_at        = NOW() \
         WHERE id = $1 \
         RETURNING {INVENTORY_COLUMNS}"
    );
    let row = sqlx::query_as::<_, InventoryRow>(&sql)
        .bind(id)
        .bind(update.product_id)
        .bind(update.color_id.is_some())
        .bind(update.color_id.flatten())
        .bind(update.size_id.is_some())
        .bind(update.size_id.flatten())
        .bind(update.amount)
        .bind(update.short_description.is_some())
        .bind(update.short_description.clone().flatten())
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Permanently deletes an inventory row and returns it.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn delete_inventory(pool: &PgPool, id: i64) -> Result<Option<InventoryRow>, DbError> {
    let sql = format!("DELETE FROM inventory WHERE id = $1 RETURNING {INVENTORY_COLUMNS}");
    let row = sqlx::query_as::<_, InventoryRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}
