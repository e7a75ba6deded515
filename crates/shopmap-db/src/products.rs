//! Database operations for the `products` table.
//!
//! Products are soft-deleted; a product is only visible while both it and
//! its owning shop are visible.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::metadata::MetadataMap;
use crate::{DbError, Page};

const PRODUCT_COLUMNS: &str = "p.id, p.shop_id, p.category_id, p.title, p.description, p.price, \
     p.brand, p.article_number, p.barcode, p.image_url, p.additional_images, p.in_stock, \
     p.stock_quantity, p.tags, p.metadata, p.is_active, p.created_at, p.updated_at, p.deleted_at";

const SHOP_FOREIGN_KEY: &str = "products_shop_id_fkey";

// Unqualified column list for `RETURNING` clauses.
const RETURNING_COLUMNS: &str = "id, shop_id, category_id, title, description, price, brand, \
     article_number, barcode, image_url, additional_images, in_stock, stock_quantity, tags, \
     metadata, is_active, created_at, updated_at, deleted_at";

// ---------------------------------------------------------------------------
// Row and input types
// ---------------------------------------------------------------------------

/// A row from the `products` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductRow {
    pub id: i64,
    pub shop_id: i64,
    pub category_id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub brand: Option<String>,
    pub article_number: Option<String>,
    pub barcode: Option<String>,
    pub image_url: Option<String>,
    pub additional_images: Vec<String>,
    pub in_stock: bool,
    pub stock_quantity: i32,
    pub tags: Vec<String>,
    pub metadata: Json<MetadataMap>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// A product joined with the name and city of its shop.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductWithShopRow {
    #[sqlx(flatten)]
    pub product: ProductRow,
    pub shop_name: String,
    pub shop_city: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewProduct {
    pub shop_id: i64,
    pub category_id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub brand: Option<String>,
    pub article_number: Option<String>,
    pub barcode: Option<String>,
    pub image_url: Option<String>,
    pub additional_images: Vec<String>,
    pub in_stock: bool,
    pub stock_quantity: i32,
    pub tags: Vec<String>,
    pub metadata: MetadataMap,
}

/// Sparse update for a product. See [`crate::ShopUpdate`] for the
/// `Option<Option<T>>` convention.
#[allow(clippy::option_option)]
#[derive(Debug, Clone, Default)]
pub struct ProductUpdate {
    pub shop_id: Option<i64>,
    pub category_id: Option<Option<i64>>,
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub price: Option<Decimal>,
    pub brand: Option<Option<String>>,
    pub article_number: Option<Option<String>>,
    pub barcode: Option<Option<String>>,
    pub image_url: Option<Option<String>>,
    pub additional_images: Option<Vec<String>>,
    pub in_stock: Option<bool>,
    pub stock_quantity: Option<i32>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub shop_id: Option<i64>,
    pub category_id: Option<i64>,
    /// Case-insensitive substring match on `title`.
    pub title: Option<String>,
    /// Case-insensitive substring match on `brand`.
    pub brand: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub in_stock: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct ProductWithShopFilter {
    pub category_id: Option<i64>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Lists visible products matching `filter`, ordered by id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_products(
    pool: &PgPool,
    filter: &ProductFilter,
    page: Page,
) -> Result<Vec<ProductRow>, DbError> {
    let sql = format!(
        "SELECT {PRODUCT_COLUMNS} \
         FROM products p \
         JOIN shops s ON s.id = p.shop_id AND s.deleted_at IS NULL \
         WHERE p.deleted_at IS NULL \
           AND ($1::BIGINT IS NULL OR p.shop_id = $1) \
           AND ($2::BIGINT IS NULL OR p.category_id = $2) \
           AND ($3::TEXT IS NULL OR p.title ILIKE '%' || $3 || '%') \
           AND ($4::TEXT IS NULL OR p.brand ILIKE '%' || $4 || '%') \
           AND ($5::NUMERIC IS NULL OR p.price >= $5) \
           AND ($6::NUMERIC IS NULL OR p.price <= $6) \
           AND ($7::BOOL IS NULL OR p.in_stock = $7) \
         ORDER BY p.id \
         OFFSET $8 LIMIT $9"
    );
    let rows = sqlx::query_as::<_, ProductRow>(&sql)
        .bind(filter.shop_id)
        .bind(filter.category_id)
        .bind(filter.title.as_deref())
        .bind(filter.brand.as_deref())
        .bind(filter.min_price)
        .bind(filter.max_price)
        .bind(filter.in_stock)
        .bind(page.offset)
        .bind(page.limit)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Lists visible products together with their shop's name and city.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_products_with_shop(
    pool: &PgPool,
    filter: &ProductWithShopFilter,
    page: Page,
) -> Result<Vec<ProductWithShopRow>, DbError> {
    let sql = format!(
        "SELECT {PRODUCT_COLUMNS}, s.name AS shop_name, s.city AS shop_city \
         FROM products p \
         JOIN shops s ON s.id = p.shop_id AND s.deleted_at IS NULL \
         WHERE p.deleted_at IS NULL \
           AND ($1::BIGINT IS NULL OR p.category_id = $1) \
           AND ($2::NUMERIC IS NULL OR p.price >= $2) \
           AND ($3::NUMERIC IS NULL OR p.price <= $3) \
         ORDER BY p.id \
         OFFSET $4 LIMIT $5"
    );
    let rows = sqlx::query_as::<_, ProductWithShopRow>(&sql)
        .bind(filter.category_id)
        .bind(filter.min_price)
        .bind(filter.max_price)
        .bind(page.offset)
        .bind(page.limit)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Lists the visible products of one shop, ordered by id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_products_for_shop(
    pool: &PgPool,
    shop_id: i64,
    page: Page,
) -> Result<Vec<ProductRow>, DbError> {
    let filter = ProductFilter {
        shop_id: Some(shop_id),
        ..ProductFilter::default()
    };
    list_products(pool, &filter, page).await
}

/// Returns a visible product by id, or `None` if absent or soft-deleted.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_product(pool: &PgPool, id: i64) -> Result<Option<ProductRow>, DbError> {
    let sql = format!(
        "SELECT {PRODUCT_COLUMNS} \
         FROM products p \
         JOIN shops s ON s.id = p.shop_id AND s.deleted_at IS NULL \
         WHERE p.id = $1 AND p.deleted_at IS NULL"
    );
    let row = sqlx::query_as::<_, ProductRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

/// Returns `true` when a visible product with `id` exists.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn product_exists(pool: &PgPool, id: i64) -> Result<bool, DbError> {
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS ( \
             SELECT 1 FROM products p \
             JOIN shops s ON s.id = p.shop_id AND s.deleted_at IS NULL \
             WHERE p.id = $1 AND p.deleted_at IS NULL \
         )",
    )
    .bind(id)
    .fetch_one(pool)
    .await?;
    Ok(exists)
}

/// Inserts a product and returns the stored row.
///
/// # Errors
///
/// Returns [`DbError::ForeignKeyViolation`] if the shop is missing or
/// soft-deleted or `category_id` does not exist, or [`DbError::Sqlx`] if the
/// insert fails.
pub async fn create_product(pool: &PgPool, product: &NewProduct) -> Result<ProductRow, DbError> {
    let mut tx = pool.begin().await?;

    // Share-lock the shop: `soft_delete_shop` takes FOR UPDATE on the same row,
    // so the insert and a concurrent shop delete cannot both commit.
    let shop = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM shops WHERE id = $1 AND deleted_at IS NULL FOR SHARE",
    )
    .bind(product.shop_id)
    .fetch_optional(&mut *tx)
    .await?;
    if shop.is_none() {
        return Err(DbError::ForeignKeyViolation {
            constraint: SHOP_FOREIGN_KEY.to_string(),
        });
    }

    let sql = format!(
        "INSERT INTO products \
           (shop_id, category_id, title, description, price, brand, article_number, barcode, \
            image_url, additional_images, in_stock, stock_quantity, tags, metadata) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
         RETURNING {RETURNING_COLUMNS}"
    );
    let row = sqlx::query_as::<_, ProductRow>(&sql)
        .bind(product.shop_id)
        .bind(product.category_id)
        .bind(&product.title)
        .bind(product.description.as_deref())
        .bind(product.price)
        .bind(product.brand.as_deref())
        .bind(product.article_number.as_deref())
        .bind(product.barcode.as_deref())
        .bind(product.image_url.as_deref())
        .bind(&product.additional_images)
        .bind(product.in_stock)
        .bind(product.stock_quantity)
        .bind(&product.tags)
        .bind(Json(&product.metadata))
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(row)
}

/// Applies a sparse update to a visible product.
///
/// Returns `None` when the product is absent or soft-deleted.
///
/// # Errors
///
/// Returns [`DbError::ForeignKeyViolation`] if a new `shop_id` or
/// `category_id` does not exist, or [`DbError::Sqlx`] if the query fails.
pub async fn update_product(
    pool: &PgPool,
    id: i64,
    update: &ProductUpdate,
) -> Result<Option<ProductRow>, DbError> {
    let sql = format!(
        "UPDATE products \
         SET shop_id           = COALESCE($2, shop_id), \
             category_id       = CASE WHEN $3::BOOL  THEN $4  ELSE category_id END, \
             title             = COALESCE($5, title), \
             description       = CASE WHEN $6::BOOL  THEN $7  ELSE description END, \
             price             = COALESCE($8, price), \
             brand             = CASE WHEN $9::BOOL  THEN $10 ELSE brand END, \
             article_number    = CASE WHEN $11::BOOL THEN $12 ELSE article_number END, \
             barcode           = CASE WHEN $13::BOOL THEN $14 ELSE barcode END, \
             image_url         = CASE WHEN $15::BOOL THEN $16 ELSE image_url END, \
             additional_images = COALESCE($17, additional_images), \
             in_stock          = COALESCE($18, in_stock), \
             stock_quantity    = COALESCE($19, stock_quantity), \
             tags              = COALESCE($20, tags), \
             updated_at        = NOW() \
         WHERE id = $1 AND deleted_at IS NULL \
         RETURNING {RETURNING_COLUMNS}"
    );
    let row = sqlx::query_as::<_, ProductRow>(&sql)
        .bind(id)
        .bind(update.shop_id)
        .bind(update.category_id.is_some())
        .bind(update.category_id.flatten())
        .bind(update.title.as_deref())
        .bind(update.description.is_some())
        .bind(update.description.clone().flatten())
        .bind(update.price)
        .bind(update.brand.is_some())
        .bind(update.brand.clone().flatten())
        .bind(update.article_number.is_some())
        .bind(update.article_number.clone().flatten())
        .bind(update.barcode.is_some())
        .bind(update.barcode.clone().flatten())
        .bind(update.image_url.is_some())
        .bind(update.image_url.clone().flatten())
        .bind(update.additional_images.as_ref())
        .bind(update.in_stock)
        .bind(update.stock_quantity)
        .bind(update.tags.as_ref())
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Soft-deletes a product.
///
/// Refuses with [`DbError::Conflict`] while inventory rows still reference
/// the product. Returns the row as deleted, or `None` if there was nothing
/// to delete.
///
/// # Errors
///
/// Returns [`DbError::Conflict`] when inventory blocks the delete, or
/// [`DbError::Sqlx`] if a query fails.
pub async fn soft_delete_product(pool: &PgPool, id: i64) -> Result<Option<ProductRow>, DbError> {
    let mut tx = pool.begin().await?;

    let locked = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM products WHERE id = $1 AND deleted_at IS NULL FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?;
    if locked.is_none() {
        return Ok(None);
    }

    let inventory_count =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM inventory WHERE product_id = $1")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
    if inventory_count > 0 {
        return Err(DbError::Conflict(format!(
            "product {id} still has {inventory_count} inventory row(s)"
        )));
    }

    let sql = format!(
        "UPDATE products \
         SET is_active = false, deleted_at = NOW(), updated_at = NOW() \
         WHERE id = $1 AND deleted_at IS NULL \
         RETURNING {RETURNING_COLUMNS}"
    );
    let row = sqlx::query_as::<_, ProductRow>(&sql)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(row)
}
