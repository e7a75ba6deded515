//! Database operations for the `categories` table. Categories are hard-deleted.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::{DbError, Page};

/// A row from the `categories` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CategoryRow {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub parent_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewCategory {
    pub name: String,
    pub description: Option<String>,
    pub parent_id: Option<i64>,
}

#[allow(clippy::option_option)]
#[derive(Debug, Clone, Default)]
pub struct CategoryUpdate {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub parent_id: Option<Option<i64>>,
}

#[derive(Debug, Clone, Default)]
pub struct CategoryFilter {
    pub name: Option<String>,
    pub parent_id: Option<i64>,
}

/// Lists categories matching `filter`, ordered by id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_categories(
    pool: &PgPool,
    filter: &CategoryFilter,
    page: Page,
) -> Result<Vec<CategoryRow>, DbError> {
    let rows = sqlx::query_as::<_, CategoryRow>(
        "SELECT id, name, description, parent_id, created_at, updated_at \
         FROM categories \
         WHERE ($1::TEXT IS NULL OR name ILIKE '%' || $1 || '%') \
           AND ($2::BIGINT IS NULL OR parent_id = $2) \
         ORDER BY id \
         OFFSET $3 LIMIT $4",
    )
    .bind(filter.name.as_deref())
    .bind(filter.parent_id)
    .bind(page.offset)
    .bind(page.limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Returns a category by id, or `None` if it does not exist.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_category(pool: &PgPool, id: i64) -> Result<Option<CategoryRow>, DbError> {
    let row = sqlx::query_as::<_, CategoryRow>(
        "SELECT id, name, description, parent_id, created_at, updated_at \
         FROM categories \
         WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Returns `true` when a category with `id` exists.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn category_exists(pool: &PgPool, id: i64) -> Result<bool, DbError> {
    let exists =
        sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM categories WHERE id = $1)")
            .bind(id)
            .fetch_one(pool)
            .await?;
    Ok(exists)
}

/// Inserts a category and returns the stored row.
///
/// # Errors
///
/// Returns [`DbError::ForeignKeyViolation`] if `parent_id` does not exist,
/// or [`DbError::Sqlx`] if the insert fails.
pub async fn create_category(pool: &PgPool, category: &NewCategory) -> Result<CategoryRow, DbError> {
    let row = sqlx::query_as::<_, CategoryRow>(
        "INSERT INTO categories (name, description, parent_id) \
         VALUES ($1, $2, $3) \
         RETURNING id, name, description, parent_id, created_at, updated_at",
    )
    .bind(&category.name)
    .bind(category.description.as_deref())
    .bind(category.parent_id)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Applies a sparse update to a category. Returns `None` if it does not exist.
///
/// # Errors
///
/// Returns [`DbError::ForeignKeyViolation`] if a new `parent_id` does not
/// exist, or [`DbError::Sqlx`] if the query fails.
pub async fn update_category(
    pool: &PgPool,
    id: i64,
    update: &CategoryUpdate,
) -> Result<Option<CategoryRow>, DbError> {
    let row = sqlx::query_as::<_, CategoryRow>(
        "UPDATE categories \
         SET name        = COALESCE($2, name), \
             description = CASE WHEN $3::BOOL THEN $4 ELSE description END, \
             parent_id   = CASE WHEN $5::BOOL THEN $6 ELSE parent_id END, \
             updated_at  = NOW() \
         WHERE id = $1 \
         RETURNING id, name, description, parent_id, created_at, updated_at",
    )
    .bind(id)
    .bind(update.name.as_deref())
    .bind(update.description.is_some())
    .bind(update.description.clone().flatten())
    .bind(update.parent_id.is_some())
    .bind(update.parent_id.flatten())
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Permanently deletes a category and returns the removed row.
///
/// Hidden products (soft-deleted, or under a soft-deleted shop) lose their
/// `category_id` in the same transaction; only visible products and child
/// categories block the delete.
///
/// # Errors
///
/// Returns [`DbError::ForeignKeyViolation`] while visible products or child
/// categories still reference it, or [`DbError::Sqlx`] if a query fails.
pub async fn delete_category(pool: &PgPool, id: i64) -> Result<Option<CategoryRow>, DbError> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "UPDATE products p \
         SET category_id = NULL \
         WHERE p.category_id = $1 \
           AND (p.deleted_at IS NOT NULL \
                OR EXISTS (SELECT 1 FROM shops s \
                           WHERE s.id = p.shop_id AND s.deleted_at IS NOT NULL))",
    )
    .bind(id)
    .execute(&mut *tx)
    .await?;

    let row = sqlx::query_as::<_, CategoryRow>(
        "DELETE FROM categories \
         WHERE id = $1 \
         RETURNING id, name, description, parent_id, created_at, updated_at",
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(row)
}
