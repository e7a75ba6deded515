//! Key/value metadata routes shared by shops and products.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use shopmap_db::{MetadataMap, MetadataOwner};

use crate::middleware::RequestId;

use super::products::ProductItem;
use super::shops::{resolve_shop, ShopItem};
use super::{
    created, json_rejection, map_db_error, ok, parse_id, required_text, ApiError, ApiResponse,
    AppState,
};

#[derive(Debug, Serialize)]
pub(super) struct MetadataItem {
    pub id: i64,
    pub metadata: MetadataMap,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct AddMetadataRequest {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct UpdateMetadataRequest {
    pub value: String,
}

fn owner_name(owner: MetadataOwner) -> &'static str {
    match owner {
        MetadataOwner::Shop => "shop",
        MetadataOwner::Product => "product",
    }
}

/// Missing owners surface from the store as `NotFound`; name them in the message.
fn map_metadata_error(
    req_id: &str,
    owner: MetadataOwner,
    id: i64,
    error: &shopmap_db::DbError,
) -> ApiError {
    match error {
        shopmap_db::DbError::NotFound => ApiError::not_found(req_id, owner_name(owner), id),
        other => map_db_error(req_id.to_owned(), other),
    }
}

async fn add(
    state: &AppState,
    req_id: RequestId,
    owner: MetadataOwner,
    raw_id: &str,
    body: Result<Json<AddMetadataRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<MetadataItem>>), ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, raw_id)?;
    let Json(body) = body.map_err(|e| json_rejection(rid, &e))?;
    let key = required_text(rid, "key", &body.key)?;

    let metadata = shopmap_db::insert_metadata_key(&state.pool, owner, id, &key, &body.value)
        .await
        .map_err(|e| map_metadata_error(rid, owner, id, &e))?;

    Ok(created(req_id, MetadataItem { id, metadata }))
}

async fn update(
    state: &AppState,
    req_id: RequestId,
    owner: MetadataOwner,
    (raw_id, key): (String, String),
    body: Result<Json<UpdateMetadataRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<MetadataItem>>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &raw_id)?;
    let Json(body) = body.map_err(|e| json_rejection(rid, &e))?;

    let metadata = shopmap_db::update_metadata_key(&state.pool, owner, id, &key, &body.value)
        .await
        .map_err(|e| map_metadata_error(rid, owner, id, &e))?;

    Ok(ok(req_id, MetadataItem { id, metadata }))
}

async fn delete(
    state: &AppState,
    req_id: RequestId,
    owner: MetadataOwner,
    (raw_id, key): (String, String),
) -> Result<Json<ApiResponse<MetadataItem>>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &raw_id)?;

    let metadata = shopmap_db::delete_metadata_key(&state.pool, owner, id, &key)
        .await
        .map_err(|e| map_metadata_error(rid, owner, id, &e))?;

    Ok(ok(req_id, MetadataItem { id, metadata }))
}

/// GET /api/shops/{id}/metadata
pub(super) async fn get_shop_metadata(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ShopItem>>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &id)?;
    let shop = resolve_shop(&state, rid, id).await?;
    Ok(ok(req_id, shop.into()))
}

/// POST /api/shops/{id}/metadata
pub(super) async fn add_shop_metadata(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
    body: Result<Json<AddMetadataRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<MetadataItem>>), ApiError> {
    add(&state, req_id, MetadataOwner::Shop, &id, body).await
}

/// PUT /api/shops/{id}/metadata/{key}
pub(super) async fn update_shop_metadata(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(params): Path<(String, String)>,
    body: Result<Json<UpdateMetadataRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<MetadataItem>>, ApiError> {
    update(&state, req_id, MetadataOwner::Shop, params, body).await
}

/// DELETE /api/shops/{id}/metadata/{key}
pub(super) async fn delete_shop_metadata(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(params): Path<(String, String)>,
) -> Result<Json<ApiResponse<MetadataItem>>, ApiError> {
    delete(&state, req_id, MetadataOwner::Shop, params).await
}

/// GET /api/products/{id}/metadata
pub(super) async fn get_product_metadata(
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

/// POST /api/products/{id}/metadata
pub(super) async fn add_product_metadata(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
    body: Result<Json<AddMetadataRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<MetadataItem>>), ApiError> {
    add(&state, req_id, MetadataOwner::Product, &id, body).await
}

/// PUT /api/products/{id}/metadata/{key}
pub(super) async fn update_product_metadata(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(params): Path<(String, String)>,
    body: Result<Json<UpdateMetadataRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<MetadataItem>>, ApiError> {
    update(&state, req_id, MetadataOwner::Product, params, body).await
}

/// DELETE /api/products/{id}/metadata/{key}
pub(super) async fn delete_product_metadata(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(params): Path<(String, String)>,
) -> Result<Json<ApiResponse<MetadataItem>>, ApiError> {
    delete(&state, req_id, MetadataOwner::Product, params).await
}
