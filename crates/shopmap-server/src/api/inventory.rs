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
use shopmap_db::{InventoryFilter, InventoryRow, InventoryUpdate, NewInventory};

use crate::middleware::RequestId;

use super::{
    created, json_rejection, map_db_error, map_write_error, nullable, ok, page, parse_id,
    query_rejection, validate_non_negative, ApiError, ApiResponse, AppState,
};

#[derive(Debug, Serialize)]
pub(super) struct InventoryItem {
    pub id: i64,
    pub product_id: i64,
    pub color_id: Option<i64>,
    pub size_id: Option<i64>,
    pub amount: i32,
    pub short_description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<InventoryRow> for InventoryItem {
    fn from(row: InventoryRow) -> Self {
        Self {
            id: row.id,
            product_id: row.product_id,
            color_id: row.color_id,
            size_id: row.size_id,
            amount: row.amount,
            short_description: row.short_description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct InventoryQuery {
    pub product_id: Option<i64>,
    pub color_id: Option<i64>,
    pub size_id: Option<i64>,
    #[serde(alias = "skip")]
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct CreateInventoryRequest {
    pub product_id: i64,
    pub color_id: Option<i64>,
    pub size_id: Option<i64>,
    #[serde(default)]
    pub amount: i32,
    pub short_description: Option<String>,
}

#[allow(clippy::option_option)]
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct UpdateInventoryRequest {
    pub product_id: Option<i64>,
    #[serde(default, deserialize_with = "nullable")]
    pub color_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub size_id: Option<Option<i64>>,
    pub amount: Option<i32>,
    #[serde(default, deserialize_with = "nullable")]
    pub short_description: Option<Option<String>>,
}

/// Resolves each supplied reference, reporting the first that does not exist.
async fn check_references(
    state: &AppState,
    req_id: &str,
    product_id: Option<i64>,
    color_id: Option<i64>,
    size_id: Option<i64>,
) -> Result<(), ApiError> {
    let db_err = |e: shopmap_db::DbError| map_db_error(req_id.to_owned(), &e);

    if let Some(id) = product_id {
        if !shopmap_db::product_exists(&state.pool, id).await.map_err(db_err)? {
            return Err(ApiError::invalid_reference(req_id, "product_id", id));
        }
    }
    if let Some(id) = color_id {
        if !shopmap_db::color_exists(&state.pool, id).await.map_err(db_err)? {
            return Err(ApiError::invalid_reference(req_id, "color_id", id));
        }
    }
    if let Some(id) = size_id {
        if !shopmap_db::size_exists(&state.pool, id).await.map_err(db_err)? {
            return Err(ApiError::invalid_reference(req_id, "size_id", id));
        }
    }
    Ok(())
}

/// GET /api/inventory
pub(super) async fn list_inventory(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    query: Result<Query<InventoryQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<Vec<InventoryItem>>>, ApiError> {
    let rid = &req_id.0;
    let Query(query) = query.map_err(|e| query_rejection(rid, &e))?;
    let page = page(rid, query.offset, query.limit)?;
    let filter = InventoryFilter {
        product_id: query.product_id,
        color_id: query.color_id,
        size_id: query.size_id,
    };

    let rows = shopmap_db::list_inventory(&state.pool, &filter, page)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(ok(req_id, rows.into_iter().map(InventoryItem::from).collect()))
}

/// GET /api/inventory/{id}
pub(super) async fn get_inventory(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<InventoryItem>>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &id)?;

    let row = shopmap_db::get_inventory(&state.pool, id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(|| ApiError::not_found(rid, "inventory", id))?;

    Ok(ok(req_id, row.into()))
}

/// POST /api/inventory
pub(super) async fn create_inventory(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    body: Result<Json<CreateInventoryRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<InventoryItem>>), ApiError> {
    let rid = &req_id.0;
    let Json(body) = body.map_err(|e| json_rejection(rid, &e))?;

    validate_non_negative(rid, "amount", body.amount)?;
    check_references(
        &state,
        rid,
        Some(body.product_id),
        body.color_id,
        body.size_id,
    )
    .await?;

    let new_inventory = NewInventory {
        product_id: body.product_id,
        color_id: body.color_id,
        size_id: body.size_id,
        amount: body.amount,
        short_description: body.short_description,
    };
    let row = shopmap_db::create_inventory(&state.pool, &new_inventory)
        .await
        .map_err(|e| map_write_error(rid.clone(), &e))?;

    Ok(created(req_id, row.into()))
}

/// PUT /api/inventory/{id}
pub(super) async fn update_inventory(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
    body: Result<Json<UpdateInventoryRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<InventoryItem>>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &id)?;
    let Json(body) = body.map_err(|e| json_rejection(rid, &e))?;

    if let Some(amount) = body.amount {
        validate_non_negative(rid, "amount", amount)?;
    }
    check_references(
        &state,
        rid,
        body.product_id,
        body.color_id.flatten(),
        body.size_id.flatten(),
    )
    .await?;

    let update = InventoryUpdate {
        product_id: body.product_id,
        color_id: body.color_id,
        size_id: body.size_id,
        amount: body.amount,
        short_description: body.short_description,
    };
    let row = shopmap_db::update_inventory(&state.pool, id, &update)
        .await
        .map_err(|e| map_write_error(rid.clone(), &e))?
        .ok_or_else(|| ApiError::not_found(rid, "inventory", id))?;

    Ok(ok(req_id, row.into()))
}

/// DELETE /api/inventory/{id}
pub(super) async fn delete_inventory(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<InventoryItem>>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &id)?;

    let row = shopmap_db::delete_inventory(&state.pool, id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(|| ApiError::not_found(rid, "inventory", id))?;

    Ok(ok(req_id, row.into()))
}
