use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shopmap_db::{
    MetadataMap, NewProduct, ProductFilter, ProductRow, ProductUpdate, ProductWithShopFilter,
    ProductWithShopRow,
};

use crate::middleware::RequestId;

use super::{
    created, json_rejection, map_db_error, map_write_error, nullable, ok, page, parse_id,
    query_rejection, required_text, validate_non_negative, validate_url, ApiError, ApiResponse,
    AppState,
};

#[derive(Debug, Serialize)]
pub(super) struct ProductItem {
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
    pub metadata: MetadataMap,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl From<ProductRow> for ProductItem {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            shop_id: row.shop_id,
            category_id: row.category_id,
            title: row.title,
            description: row.description,
            price: row.price,
            brand: row.brand,
            article_number: row.article_number,
            barcode: row.barcode,
            image_url: row.image_url,
            additional_images: row.additional_images,
            in_stock: row.in_stock,
            stock_quantity: row.stock_quantity,
            tags: row.tags,
            metadata: row.metadata.0,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct ProductWithShopItem {
    #[serde(flatten)]
    pub product: ProductItem,
    pub shop_name: String,
    pub shop_city: Option<String>,
}

impl From<ProductWithShopRow> for ProductWithShopItem {
    fn from(row: ProductWithShopRow) -> Self {
        Self {
            product: row.product.into(),
            shop_name: row.shop_name,
            shop_city: row.shop_city,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct ProductQuery {
    pub shop_id: Option<i64>,
    pub category_id: Option<i64>,
    pub title: Option<String>,
    pub brand: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub in_stock: Option<bool>,
    #[serde(alias = "skip")]
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct ProductWithShopQuery {
    pub category_id: Option<i64>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    #[serde(alias = "skip")]
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct CreateProductRequest {
    pub shop_id: i64,
    pub category_id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub brand: Option<String>,
    pub article_number: Option<String>,
    pub barcode: Option<String>,
    pub image_url: Option<String>,
    #[serde(default)]
    pub additional_images: Vec<String>,
    #[serde(default = "default_in_stock")]
    pub in_stock: bool,
    #[serde(default)]
    pub stock_quantity: i32,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: MetadataMap,
}

fn default_in_stock() -> bool {
    true
}

#[allow(clippy::option_option)]
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct UpdateProductRequest {
    pub shop_id: Option<i64>,
    #[serde(default, deserialize_with = "nullable")]
    pub category_id: Option<Option<i64>>,
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    pub price: Option<Decimal>,
    #[serde(default, deserialize_with = "nullable")]
    pub brand: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub article_number: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub barcode: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub image_url: Option<Option<String>>,
    pub additional_images: Option<Vec<String>>,
    pub in_stock: Option<bool>,
    pub stock_quantity: Option<i32>,
    pub tags: Option<Vec<String>>,
}

// `products.price` is NUMERIC(12, 2).
const PRICE_SCALE: u32 = 2;
const PRICE_UPPER_BOUND: i64 = 10_000_000_000;

fn validate_price(req_id: &str, price: Decimal) -> Result<(), ApiError> {
    if price < Decimal::ZERO {
        return Err(ApiError::validation(req_id, "price must be >= 0"));
    }
    if price >= Decimal::new(PRICE_UPPER_BOUND, 0) {
        return Err(ApiError::validation(
            req_id,
            format!("price must be below {PRICE_UPPER_BOUND}"),
        ));
    }
    if price.normalize().scale() > PRICE_SCALE {
        return Err(ApiError::validation(
            req_id,
            format!("price must have at most {PRICE_SCALE} decimal places"),
        ));
    }
    Ok(())
}

fn validate_price_range(
    req_id: &str,
    min: Option<Decimal>,
    max: Option<Decimal>,
) -> Result<(), ApiError> {
    if let (Some(min), Some(max)) = (min, max) {
        if min > max {
            return Err(ApiError::validation(req_id, "min_price must not exceed max_price"));
        }
    }
    Ok(())
}

fn validate_images(
    req_id: &str,
    image_url: Option<&str>,
    additional: Option<&[String]>,
) -> Result<(), ApiError> {
    if let Some(url) = image_url {
        validate_url(req_id, "image_url", url)?;
    }
    for url in additional.unwrap_or_default() {
        validate_url(req_id, "additional_images", url)?;
    }
    Ok(())
}

async fn check_shop_reference(
    state: &AppState,
    req_id: &str,
    shop_id: i64,
) -> Result<(), ApiError> {
    let exists = shopmap_db::shop_exists(&state.pool, shop_id)
        .await
        .map_err(|e| map_db_error(req_id.to_owned(), &e))?;
    if exists {
        Ok(())
    } else {
        Err(ApiError::invalid_reference(req_id, "shop_id", shop_id))
    }
}

async fn check_category_reference(
    state: &AppState,
    req_id: &str,
    category_id: i64,
) -> Result<(), ApiError> {
    let exists = shopmap_db::category_exists(&state.pool, category_id)
        .await
        .map_err(|e| map_db_error(req_id.to_owned(), &e))?;
    if exists {
        Ok(())
    } else {
        Err(ApiError::invalid_reference(req_id, "category_id", category_id))
    }
}

/// GET /api/products
pub(super) async fn list_products(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    query: Result<Query<ProductQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<Vec<ProductItem>>>, ApiError> {
    let rid = &req_id.0;
    let Query(query) = query.map_err(|e| query_rejection(rid, &e))?;
    let page = page(rid, query.offset, query.limit)?;
    validate_price_range(rid, query.min_price, query.max_price)?;

    let filter = ProductFilter {
        shop_id: query.shop_id,
        category_id: query.category_id,
        title: query.title,
        brand: query.brand,
        min_price: query.min_price,
        max_price: query.max_price,
        in_stock: query.in_stock,
    };
    let rows = shopmap_db::list_products(&state.pool, &filter, page)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(ok(req_id, rows.into_iter().map(ProductItem::from).collect()))
}

/// GET /api/products/with-shop
pub(super) async fn list_products_with_shop(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    query: Result<Query<ProductWithShopQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<Vec<ProductWithShopItem>>>, ApiError> {
    let rid = &req_id.0;
    let Query(query) = query.map_err(|e| query_rejection(rid, &e))?;
    let page = page(rid, query.offset, query.limit)?;
    validate_price_range(rid, query.min_price, query.max_price)?;

    let filter = ProductWithShopFilter {
        category_id: query.category_id,
        min_price: query.min_price,
        max_price: query.max_price,
    };
    let rows = shopmap_db::list_products_with_shop(&state.pool, &filter, page)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(ok(
        req_id,
        rows.into_iter().map(ProductWithShopItem::from).collect(),
    ))
}

/// GET /api/products/{id}
pub(super) async fn get_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ProductItem>>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &id)?;

    let row = shopmap_db::get_product(&state.pool, id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(|| ApiError::not_found(rid, "product", id))?;

    Ok(ok(req_id, row.into()))
}

/// POST /api/products
pub(super) async fn create_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    body: Result<Json<CreateProductRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<ProductItem>>), ApiError> {
    let rid = &req_id.0;
    let Json(body) = body.map_err(|e| json_rejection(rid, &e))?;

    let title = required_text(rid, "title", &body.title)?;
    validate_price(rid, body.price)?;
    validate_non_negative(rid, "stock_quantity", body.stock_quantity)?;
    validate_images(rid, body.image_url.as_deref(), Some(&body.additional_images))?;

    check_shop_reference(&state, rid, body.shop_id).await?;
    if let Some(category_id) = body.category_id {
        check_category_reference(&state, rid, category_id).await?;
    }

    let new_product = NewProduct {
        shop_id: body.shop_id,
        category_id: body.category_id,
        title,
        description: body.description,
        price: body.price,
        brand: body.brand,
        article_number: body.article_number,
        barcode: body.barcode,
        image_url: body.image_url,
        additional_images: body.additional_images,
        in_stock: body.in_stock,
        stock_quantity: body.stock_quantity,
        tags: body.tags,
        metadata: body.metadata,
    };

    let row = shopmap_db::create_product(&state.pool, &new_product)
        .await
        .map_err(|e| map_write_error(rid.clone(), &e))?;

    tracing::info!(product_id = row.id, shop_id = row.shop_id, "product created");
    Ok(created(req_id, row.into()))
}

/// PUT /api/products/{id}
pub(super) async fn update_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
    body: Result<Json<UpdateProductRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<ProductItem>>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &id)?;
    let Json(body) = body.map_err(|e| json_rejection(rid, &e))?;

    let title = body
        .title
        .as_deref()
        .map(|t| required_text(rid, "title", t))
        .transpose()?;
    if let Some(price) = body.price {
        validate_price(rid, price)?;
    }
    if let Some(quantity) = body.stock_quantity {
        validate_non_negative(rid, "stock_quantity", quantity)?;
    }
    validate_images(
        rid,
        body.image_url.as_ref().and_then(Option::as_deref),
        body.additional_images.as_deref(),
    )?;

    if let Some(shop_id) = body.shop_id {
        check_shop_reference(&state, rid, shop_id).await?;
    }
    if let Some(Some(category_id)) = body.category_id {
        check_category_reference(&state, rid, category_id).await?;
    }

    let update = ProductUpdate {
        shop_id: body.shop_id,
        category_id: body.category_id,
        title,
        description: body.description,
        price: body.price,
        brand: body.brand,
        article_number: body.article_number,
        barcode: body.barcode,
        image_url: body.image_url,
        additional_images: body.additional_images,
        in_stock: body.in_stock,
        stock_quantity: body.stock_quantity,
        tags: body.tags,
    };

    let row = shopmap_db::update_product(&state.pool, id, &update)
        .await
        .map_err(|e| map_write_error(rid.clone(), &e))?
        .ok_or_else(|| ApiError::not_found(rid, "product", id))?;

    Ok(ok(req_id, row.into()))
}

/// DELETE /api/products/{id}: soft delete; refused while inventory rows remain.
pub(super) async fn delete_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ProductItem>>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &id)?;

    let row = shopmap_db::soft_delete_product(&state.pool, id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(|| ApiError::not_found(rid, "product", id))?;

    tracing::info!(product_id = id, "product soft-deleted");
    Ok(ok(req_id, row.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_price_is_rejected_but_zero_is_allowed() {
        assert!(validate_price("r", Decimal::ZERO).is_ok());
        assert!(validate_price("r", Decimal::new(1999, 2)).is_ok());
        let err = validate_price("r", Decimal::new(-1, 2)).expect_err("negative");
        assert_eq!(err.error.code, "validation_error");
    }

    #[test]
    fn price_must_fit_the_stored_precision() {
        assert!(validate_price("r", Decimal::new(999_999_999_999, 2)).is_ok());
        assert!(validate_price("r", Decimal::new(1250, 3)).is_ok());

        let too_large = validate_price("r", Decimal::new(10_000_000_000, 0)).expect_err("overflow");
        assert_eq!(too_large.error.code, "validation_error");
        let too_precise = validate_price("r", Decimal::new(1999, 3)).expect_err("three places");
        assert_eq!(too_precise.error.code, "validation_error");
    }

    #[test]
    fn inverted_price_range_is_rejected() {
        assert!(validate_price_range("r", Some(Decimal::ONE), Some(Decimal::TEN)).is_ok());
        assert!(validate_price_range("r", Some(Decimal::TEN), None).is_ok());
        assert!(validate_price_range("r", Some(Decimal::TEN), Some(Decimal::ONE)).is_err());
    }

    #[test]
    fn update_body_distinguishes_null_from_absent() {
        let body: UpdateProductRequest =
            serde_json::from_value(serde_json::json!({ "brand": null, "price": "4.50" }))
                .expect("deserialize");
        assert_eq!(body.brand, Some(None));
        assert_eq!(body.description, None);
        assert_eq!(body.price, Some(Decimal::new(450, 2)));
    }

    #[test]
    fn create_body_rejects_unknown_fields() {
        let result = serde_json::from_value::<CreateProductRequest>(serde_json::json!({
            "shop_id": 1,
            "title": "Mug",
            "price": 3,
            "colour": "blue"
        }));
        assert!(result.is_err());
    }
}
