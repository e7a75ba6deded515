//! Database operations for the `shops` table.
//!
//! Shops are soft-deleted: every read filters on `deleted_at IS NULL`.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;

use crate::metadata::MetadataMap;
use crate::{DbError, Page};

const SHOP_COLUMNS: &str = "id, name, description, address, city, state, postal_code, country, \
     latitude, longitude, phone, email, website, opening_hours, category, tags, metadata, \
     is_active, created_at, updated_at, deleted_at";

// ---------------------------------------------------------------------------
// Row and input types
// ---------------------------------------------------------------------------

/// A row from the `shops` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ShopRow {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub opening_hours: Option<String>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub metadata: Json<MetadataMap>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// A shop returned by the radius query, with its distance from the search center.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct NearbyShopRow {
    #[sqlx(flatten)]
    pub shop: ShopRow,
    pub distance_meters: f64,
}

#[derive(Debug, Clone, Default)]
pub struct NewShop {
    pub name: String,
    pub description: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub opening_hours: Option<String>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub metadata: MetadataMap,
}

/// Sparse update for a shop.
///
/// For nullable columns the outer `Option` means "supplied", the inner one
/// carries the new value (`None` clears the column).
#[allow(clippy::option_option)]
#[derive(Debug, Clone, Default)]
pub struct ShopUpdate {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub address: Option<Option<String>>,
    pub city: Option<Option<String>>,
    pub state: Option<Option<String>>,
    pub postal_code: Option<Option<String>>,
    pub country: Option<Option<String>>,
    pub latitude: Option<Option<f64>>,
    pub longitude: Option<Option<f64>>,
    pub phone: Option<Option<String>>,
    pub email: Option<Option<String>>,
    pub website: Option<Option<String>>,
    pub opening_hours: Option<Option<String>>,
    pub category: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct ShopFilter {
    /// Case-insensitive substring match on `name`.
    pub name: Option<String>,
    /// Case-insensitive substring match on `city`.
    pub city: Option<String>,
    pub category: Option<String>,
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Lists visible shops matching `filter`, ordered by id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_shops(
    pool: &PgPool,
    filter: &ShopFilter,
    page: Page,
) -> Result<Vec<ShopRow>, DbError> {
    let sql = format!(
        "SELECT {SHOP_COLUMNS} \
         FROM shops \
         WHERE deleted_at IS NULL \
           AND ($1::TEXT IS NULL OR name ILIKE '%' || $1 || '%') \
           AND ($2::TEXT IS NULL OR city ILIKE '%' || $2 || '%') \
           AND ($3::TEXT IS NULL OR category = $3) \
         ORDER BY id \
         OFFSET $4 LIMIT $5"
    );
    let rows = sqlx::query_as::<_, ShopRow>(&sql)
        .bind(filter.name.as_deref())
        .bind(filter.city.as_deref())
        .bind(filter.category.as_deref())
        .bind(page.offset)
        .bind(page.limit)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Returns visible shops within `radius_meters` of (`latitude`, `longitude`),
/// nearest first. Shops without coordinates never match.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_nearby_shops(
    pool: &PgPool,
    latitude: f64,
    longitude: f64,
    radius_meters: f64,
    limit: i64,
) -> Result<Vec<NearbyShopRow>, DbError> {
    let sql = format!(
        "SELECT {SHOP_COLUMNS}, distance_meters \
         FROM ( \
             SELECT *, earth_distance(ll_to_earth($1, $2), ll_to_earth(latitude, longitude)) \
                       AS distance_meters \
             FROM shops \
             WHERE deleted_at IS NULL \
               AND latitude IS NOT NULL \
               AND longitude IS NOT NULL \
         ) s \
         WHERE distance_meters <= $3 \
         ORDER BY distance_meters, id \
         LIMIT $4"
    );
    let rows = sqlx::query_as::<_, NearbyShopRow>(&sql)
        .bind(latitude)
        .bind(longitude)
        .bind(radius_meters)
        .bind(limit)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Returns a visible shop by id, or `None` if absent or soft-deleted.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_shop(pool: &PgPool, id: i64) -> Result<Option<ShopRow>, DbError> {
    let sql = format!("SELECT {SHOP_COLUMNS} FROM shops WHERE id = $1 AND deleted_at IS NULL");
    let row = sqlx::query_as::<_, ShopRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

/// Returns `true` when a visible shop with `id` exists.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn shop_exists(pool: &PgPool, id: i64) -> Result<bool, DbError> {
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM shops WHERE id = $1 AND deleted_at IS NULL)",
    )
    .bind(id)
    .fetch_one(pool)
    .await?;
    Ok(exists)
}

/// Inserts a shop and returns the stored row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_shop(pool: &PgPool, shop: &NewShop) -> Result<ShopRow, DbError> {
    let sql = format!(
        "INSERT INTO shops \
           (name, description, address, city, state, postal_code, country, latitude, longitude, \
            phone, email, website, opening_hours, category, tags, metadata) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16) \
         RETURNING {SHOP_COLUMNS}"
    );
    let row = sqlx::query_as::<_, ShopRow>(&sql)
        .bind(&shop.name)
        .bind(shop.description.as_deref())
        .bind(shop.address.as_deref())
        .bind(shop.city.as_deref())
        .bind(shop.state.as_deref())
        .bind(shop.postal_code.as_deref())
        .bind(shop.country.as_deref())
        .bind(shop.latitude)
        .bind(shop.longitude)
        .bind(shop.phone.as_deref())
        .bind(shop.email.as_deref())
        .bind(shop.website.as_deref())
        .bind(shop.opening_hours.as_deref())
        .bind(shop.category.as_deref())
        .bind(&shop.tags)
        .bind(Json(&shop.metadata))
        .fetch_one(pool)
        .await?;
    Ok(row)
}

/// Applies a sparse update to a visible shop in a single `UPDATE … RETURNING`.
///
/// Returns `None` when the shop is absent or soft-deleted.
///
/// # Errors
///
/// Returns [`DbError::CheckViolation`] if the update would leave only one of
/// latitude and longitude set, or [`DbError::Sqlx`] if the query fails.
pub async fn update_shop(
    pool: &PgPool,
    id: i64,
    update: &ShopUpdate,
) -> Result<Option<ShopRow>, DbError> {
    let sql = format!(
        "UPDATE shops \
         SET name          = COALESCE($2, name), \
             description   = CASE WHEN $3::BOOL  THEN $4  ELSE description END, \
             address       = CASE WHEN $5::BOOL  THEN $6  ELSE address END, \
             city          = CASE WHEN $7::BOOL  THEN $8  ELSE city END, \
             state         = CASE WHEN $9::BOOL  THEN $10 ELSE state END, \
             postal_code   = CASE WHEN $11::BOOL THEN $12 ELSE postal_code END, \
             country       = CASE WHEN $13::BOOL THEN $14 ELSE country END, \
             latitude      = CASE WHEN $15::BOOL THEN $16 ELSE latitude END, \
             longitude     = CASE WHEN $17::BOOL THEN $18 ELSE longitude END, \
             phone         = CASE WHEN $19::BOOL THEN $20 ELSE phone END, \
             email         = CASE WHEN $21::BOOL THEN $22 ELSE email END, \
             website       = CASE WHEN $23::BOOL THEN $24 ELSE website END, \
             opening_hours = CASE WHEN $25::BOOL THEN $26 ELSE opening_hours END, \
             category      = CASE WHEN $27::BOOL THEN $28 ELSE category END, \
             tags          = COALESCE($29, tags), \
             updated_at    = NOW() \
         WHERE id = $1 AND deleted_at IS NULL \
         RETURNING {SHOP_COLUMNS}"
    );
    let row = sqlx::query_as::<_, ShopRow>(&sql)
        .bind(id)
        .bind(update.name.as_deref())
        .bind(update.description.is_some())
        .bind(update.description.clone().flatten())
        .bind(update.address.is_some())
        .bind(update.address.clone().flatten())
        .bind(update.city.is_some())
        .bind(update.city.clone().flatten())
        .bind(update.state.is_some())
        .bind(update.state.clone().flatten())
        .bind(update.postal_code.is_some())
        .bind(update.postal_code.clone().flatten())
        .bind(update.country.is_some())
        .bind(update.country.clone().flatten())
        .bind(update.latitude.is_some())
        .bind(update.latitude.flatten())
        .bind(update.longitude.is_some())
        .bind(update.longitude.flatten())
        .bind(update.phone.is_some())
        .bind(update.phone.clone().flatten())
        .bind(update.email.is_some())
        .bind(update.email.clone().flatten())
        .bind(update.website.is_some())
        .bind(update.website.clone().flatten())
        .bind(update.opening_hours.is_some())
        .bind(update.opening_hours.clone().flatten())
        .bind(update.category.is_some())
        .bind(update.category.clone().flatten())
        .bind(update.tags.as_ref())
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Soft-deletes a shop by setting `is_active = false` and `deleted_at = NOW()`.
///
/// Refuses with [`DbError::Conflict`] while the shop still has visible
/// products. Returns the row as deleted, or `None` if there was nothing to delete.
///
/// # Errors
///
/// Returns [`DbError::Conflict`] when products block the delete, or
/// [`DbError::Sqlx`] if a query fails.
pub async fn soft_delete_shop(pool: &PgPool, id: i64) -> Result<Option<ShopRow>, DbError> {
    let mut tx = pool.begin().await?;

    // Lock the shop so a concurrent product insert cannot slip in between the
    // dependents check and the update.
    let locked = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM shops WHERE id = $1 AND deleted_at IS NULL FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?;
    if locked.is_none() {
        return Ok(None);
    }

    let product_count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM products WHERE shop_id = $1 AND deleted_at IS NULL",
    )
    .bind(id)
    .fetch_one(&mut *tx)
    .await?;
    if product_count > 0 {
        return Err(DbError::Conflict(format!(
            "shop {id} still has {product_count} active product(s)"
        )));
    }

    let sql = format!(
        "UPDATE shops \
         SET is_active = false, deleted_at = NOW(), updated_at = NOW() \
         WHERE id = $1 AND deleted_at IS NULL \
         RETURNING {SHOP_COLUMNS}"
    );
    let row = sqlx::query_as::<_, ShopRow>(&sql)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(row)
}
