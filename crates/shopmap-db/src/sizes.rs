//! Database operations for the `sizes` table. Sizes are hard-deleted.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::{DbError, Page};

/// A row from the `sizes` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SizeRow {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Lists sizes, optionally filtered by a case-insensitive name substring.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_sizes(
    pool: &PgPool,
    name: Option<&str>,
    page: Page,
) -> Result<Vec<SizeRow>, DbError> {
    let rows = sqlx::query_as::<_, SizeRow>(
        "SELECT id, name, created_at, updated_at \
         FROM sizes \
         WHERE ($1::TEXT IS NULL OR name ILIKE '%' || $1 || '%') \
         ORDER BY id \
         OFFSET $2 LIMIT $3",
    )
    .bind(name)
    .bind(page.offset)
    .bind(page.limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_size(pool: &PgPool, id: i64) -> Result<Option<SizeRow>, DbError> {
    let row = sqlx::query_as::<_, SizeRow>(
        "SELECT id, name, created_at, updated_at FROM sizes WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn size_exists(pool: &PgPool, id: i64) -> Result<bool, DbError> {
    let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM sizes WHERE id = $1)")
        .bind(id)
        .fetch_one(pool)
        .await?;
    Ok(exists)
}

/// # Errors
///
/// Returns [`DbError::UniqueViolation`] if the name is taken, or
/// [`DbError::Sqlx`] if the insert fails.
pub async fn create_size(pool: &PgPool, name: &str) -> Result<SizeRow, DbError> {
    let row = sqlx::query_as::<_, SizeRow>(
        "INSERT INTO sizes (name) VALUES ($1) RETURNING id, name, created_at, updated_at",
    )
    .bind(name)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// # Errors
///
/// Returns [`DbError::UniqueViolation`] if the new name is taken, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn update_size(
    pool: &PgPool,
    id: i64,
    name: Option<&str>,
) -> Result<Option<SizeRow>, DbError> {
    let row = sqlx::query_as::<_, SizeRow>(
        "UPDATE sizes \
         SET name = COALESCE($2, name), updated_at = NOW() \
         WHERE id = $1 \
         RETURNING id, name, created_at, updated_at",
    )
    .bind(id)
    .bind(name)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Permanently deletes a size and returns the removed row.
///
/// # Errors
///
/// Returns [`DbError::ForeignKeyViolation`] while inventory references the
/// size, or [`DbError::Sqlx`] if the query fails.
pub async fn delete_size(pool: &PgPool, id: i64) -> Result<Option<SizeRow>, DbError> {
    let row = sqlx::query_as::<_, SizeRow>(
        "DELETE FROM sizes WHERE id = $1 RETURNING id, name, created_at, updated_at",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}
