//! Shop handlers: CRUD, the radius query, and a shop's product listing.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shopmap_db::{MetadataMap, NearbyShopRow, NewShop, ShopFilter, ShopRow, ShopUpdate};

use crate::middleware::RequestId;

use super::products::ProductItem;
use super::{
    created, json_rejection, map_db_error, map_write_error, normalize_limit, nullable, ok, page,
    parse_id, query_rejection, required_text, validate_latitude, validate_longitude,
    validate_url, ApiError, ApiResponse, AppState,
};

const DEFAULT_RADIUS_METERS: f64 = 1000.0;

#[derive(Debug, Serialize)]
pub(super) struct ShopItem {
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
    pub metadata: MetadataMap,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl From<ShopRow> for ShopItem {
    fn from(row: ShopRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            address: row.address,
            city: row.city,
            state: row.state,
            postal_code: row.postal_code,
            country: row.country,
            latitude: row.latitude,
            longitude: row.longitude,
            phone: row.phone,
            email: row.email,
            website: row.website,
            opening_hours: row.opening_hours,
            category: row.category,
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
pub(super) struct NearbyShopItem {
    #[serde(flatten)]
    pub shop: ShopItem,
    pub distance_meters: f64,
}

impl From<NearbyShopRow> for NearbyShopItem {
    fn from(row: NearbyShopRow) -> Self {
        Self {
            shop: row.shop.into(),
            distance_meters: row.distance_meters,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct ShopQuery {
    pub name: Option<String>,
    pub city: Option<String>,
    pub category: Option<String>,
    #[serde(alias = "skip")]
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct NearbyQuery {
    pub lat: f64,
    pub long: f64,
    pub radius: Option<f64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct PageQuery {
    #[serde(alias = "skip")]
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct CreateShopRequest {
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
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: MetadataMap,
}

// Outer None = field absent (keep), Some(None) = explicit null (clear).
#[allow(clippy::option_option)]
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct UpdateShopRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub address: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub city: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub state: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub postal_code: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub country: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub latitude: Option<Option<f64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub longitude: Option<Option<f64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub email: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub website: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub opening_hours: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub category: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
}

fn validate_email(req_id: &str, value: &str) -> Result<(), ApiError> {
    let valid = value
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if valid {
        Ok(())
    } else {
        Err(ApiError::validation(
            req_id,
            format!("email must be a valid address, got '{value}'"),
        ))
    }
}

fn validate_contact(
    req_id: &str,
    email: Option<&str>,
    website: Option<&str>,
) -> Result<(), ApiError> {
    if let Some(email) = email {
        validate_email(req_id, email)?;
    }
    if let Some(website) = website {
        validate_url(req_id, "website", website)?;
    }
    Ok(())
}

/// Rejects updates that would leave exactly one coordinate set. A single
/// supplied coordinate is checked against the stored row by the
/// `shops_coordinates_paired` constraint.
fn check_coordinate_update(
    req_id: &str,
    latitude: Option<Option<f64>>,
    longitude: Option<Option<f64>>,
) -> Result<(), ApiError> {
    match (latitude, longitude) {
        (Some(lat), Some(long)) if lat.is_some() != long.is_some() => Err(ApiError::validation(
            req_id,
            "latitude and longitude must be provided together",
        )),
        _ => Ok(()),
    }
}

/// Loads a visible shop or returns 404.
pub(super) async fn resolve_shop(
    state: &AppState,
    req_id: &str,
    id: i64,
) -> Result<ShopRow, ApiError> {
    shopmap_db::get_shop(&state.pool, id)
        .await
        .map_err(|e| map_db_error(req_id.to_owned(), &e))?
        .ok_or_else(|| ApiError::not_found(req_id, "shop", id))
}

/// GET /api/shops
pub(super) async fn list_shops(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    query: Result<Query<ShopQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<Vec<ShopItem>>>, ApiError> {
    let rid = &req_id.0;
    let Query(query) = query.map_err(|e| query_rejection(rid, &e))?;
    let page = page(rid, query.offset, query.limit)?;
    let filter = ShopFilter {
        name: query.name,
        city: query.city,
        category: query.category,
    };

    let rows = shopmap_db::list_shops(&state.pool, &filter, page)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(ok(req_id, rows.into_iter().map(ShopItem::from).collect()))
}

/// GET /api/shops/nearby
pub(super) async fn list_nearby_shops(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    query: Result<Query<NearbyQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<Vec<NearbyShopItem>>>, ApiError> {
    let rid = &req_id.0;
    let Query(query) = query.map_err(|e| query_rejection(rid, &e))?;
    validate_latitude(rid, query.lat)?;
    validate_longitude(rid, query.long)?;
    let radius = query.radius.unwrap_or(DEFAULT_RADIUS_METERS);
    if !radius.is_finite() || radius <= 0.0 {
        return Err(ApiError::validation(rid, "radius must be a positive number of meters"));
    }

    let rows = shopmap_db::list_nearby_shops(
        &state.pool,
        query.lat,
        query.long,
        radius,
        normalize_limit(query.limit),
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(ok(req_id, rows.into_iter().map(NearbyShopItem::from).collect()))
}

/// GET /api/shops/{id}
pub(super) async fn get_shop(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ShopItem>>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &id)?;
    let shop = resolve_shop(&state, rid, id).await?;
    Ok(ok(req_id, shop.into()))
}

/// GET /api/shops/{id}/products
pub(super) async fn list_shop_products(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<Vec<ProductItem>>>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &id)?;
    let Query(query) = query.map_err(|e| query_rejection(rid, &e))?;
    let page = page(rid, query.offset, query.limit)?;
    resolve_shop(&state, rid, id).await?;

    let rows = shopmap_db::list_products_for_shop(&state.pool, id, page)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(ok(req_id, rows.into_iter().map(ProductItem::from).collect()))
}

/// POST /api/shops
pub(super) async fn create_shop(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    body: Result<Json<CreateShopRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<ShopItem>>), ApiError> {
    let rid = &req_id.0;
    let Json(body) = body.map_err(|e| json_rejection(rid, &e))?;

    let name = required_text(rid, "name", &body.name)?;
    match (body.latitude, body.longitude) {
        (Some(lat), Some(long)) => {
            validate_latitude(rid, lat)?;
            validate_longitude(rid, long)?;
        }
        (None, None) => {}
        _ => {
            return Err(ApiError::validation(
                rid,
                "latitude and longitude must be provided together",
            ))
        }
    }
    validate_contact(rid, body.email.as_deref(), body.website.as_deref())?;

    let new_shop = NewShop {
        name,
        description: body.description,
        address: body.address,
        city: body.city,
        state: body.state,
        postal_code: body.postal_code,
        country: body.country,
        latitude: body.latitude,
        longitude: body.longitude,
        phone: body.phone,
        email: body.email,
        website: body.website,
        opening_hours: body.opening_hours,
        category: body.category,
        tags: body.tags,
        metadata: body.metadata,
    };

    let row = shopmap_db::create_shop(&state.pool, &new_shop)
        .await
        .map_err(|e| map_write_error(rid.clone(), &e))?;

    tracing::info!(shop_id = row.id, "shop created");
    Ok(created(req_id, row.into()))
}

/// PUT /api/shops/{id}
pub(super) async fn update_shop(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
    body: Result<Json<UpdateShopRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<ShopItem>>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &id)?;
    let Json(body) = body.map_err(|e| json_rejection(rid, &e))?;

    let name = body
        .name
        .as_deref()
        .map(|n| required_text(rid, "name", n))
        .transpose()?;
    if let Some(Some(lat)) = body.latitude {
        validate_latitude(rid, lat)?;
    }
    if let Some(Some(long)) = body.longitude {
        validate_longitude(rid, long)?;
    }
    check_coordinate_update(rid, body.latitude, body.longitude)?;
    validate_contact(
        rid,
        body.email.as_ref().and_then(Option::as_deref),
        body.website.as_ref().and_then(Option::as_deref),
    )?;

    let update = ShopUpdate {
        name,
        description: body.description,
        address: body.address,
        city: body.city,
        state: body.state,
        postal_code: body.postal_code,
        country: body.country,
        latitude: body.latitude,
        longitude: body.longitude,
        phone: body.phone,
        email: body.email,
        website: body.website,
        opening_hours: body.opening_hours,
        category: body.category,
        tags: body.tags,
    };

    let row = shopmap_db::update_shop(&state.pool, id, &update)
        .await
        .map_err(|e| map_write_error(rid.clone(), &e))?
        .ok_or_else(|| ApiError::not_found(rid, "shop", id))?;

    Ok(ok(req_id, row.into()))
}

/// DELETE /api/shops/{id}: soft delete; refused while visible products remain.
pub(super) async fn delete_shop(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ShopItem>>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &id)?;

    let row = shopmap_db::soft_delete_shop(&state.pool, id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(|| ApiError::not_found(rid, "shop", id))?;

    tracing::info!(shop_id = id, "shop soft-deleted");
    Ok(ok(req_id, row.into()))
}
