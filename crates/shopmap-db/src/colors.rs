//! Database operations for the `colors` table. Colors are hard-deleted.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::{DbError, Page};

/// A row from the `colors` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ColorRow {
    pub id: i64,
    pub name: String,
    pub code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Lists colors, optionally filtered by a case-insensitive name substring.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_colors(
    pool: &PgPool,
    name: Option<&str>,
    page: Page,
) -> Result<Vec<ColorRow>, DbError> {
    let rows = sqlx::query_as::<_, ColorRow>(
        "SELECT id, name, code, created_at, updated_at \
         FROM colors \
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
pub async fn get_color(pool: &PgPool, id: i64) -> Result<Option<ColorRow>, DbError> {
    let row = sqlx::query_as::<_, ColorRow>(
        "SELECT id, name, code, created_at, updated_at FROM colors WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn color_exists(pool: &PgPool, id: i64) -> Result<bool, DbError> {
    let exists =
        sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM colors WHERE id = $1)")
            .bind(id)
            .fetch_one(pool)
            .await?;
    Ok(exists)
}

/// Inserts a color and returns the stored row.
///
/// # Errors
///
/// Returns [`DbError::UniqueViolation`] if the name is taken, or
/// [`DbError::Sqlx`] if the insert fails.
pub async fn create_color(
    pool: &PgPool,
    name: &str,
    code: Option<&str>,
) -> Result<ColorRow, DbError> {
    let row = sqlx::query_as::<_, ColorRow>(
        "INSERT INTO colors (name, code) \
         VALUES ($1, $2) \
         RETURNING id, name, code, created_at, updated_at",
    )
    .bind(name)
    .bind(code)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Sparse update: `None` keeps a field, `Some(None)` clears `code`.
///
/// # Errors
///
/// Returns [`DbError::UniqueViolation`] if the new name is taken, or
/// [`DbError::Sqlx`] if the query fails.
#[allow(clippy::option_option)]
pub async fn update_color(
    pool: &PgPool,
    id: i64,
    name: Option<&str>,
    code: Option<Option<&str>>,
) -> Result<Option<ColorRow>, DbError> {
    let row = sqlx::query_as::<_, ColorRow>(
        "UPDATE colors \
         SET name       = COALESCE($2, name), \
             code       = CASE WHEN $3::BOOL THEN $4 ELSE code END, \
             updated_at = NOW() \
         WHERE id = $1 \
         RETURNING id, name, code, created_at, updated_at",
    )
    .bind(id)
    .bind(name)
    .bind(code.is_some())
    .bind(code.flatten())
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Permanently deletes a color and returns the removed row.
///
/// # Errors
///
/// Returns [`DbError::ForeignKeyViolation`] while inventory references the
/// color, or [`DbError::Sqlx`] if the query fails.
pub async fn delete_color(pool: &PgPool, id: i64) -> Result<Option<ColorRow>, DbError> {
    let row = sqlx::query_as::<_, ColorRow>(
        "DELETE FROM colors WHERE id = $1 RETURNING id, name, code, created_at, updated_at",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}
