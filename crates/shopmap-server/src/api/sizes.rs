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
use shopmap_db::SizeRow;

use crate::middleware::RequestId;

use super::{
    created, json_rejection, map_db_error, map_write_error, ok, page, parse_id, query_rejection,
    required_text, ApiError, ApiResponse, AppState,
};

#[derive(Debug, Serialize)]
pub(super) struct SizeItem {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<SizeRow> for SizeItem {
    fn from(row: SizeRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct SizeQuery {
    pub name: Option<String>,
    #[serde(alias = "skip")]
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct SizeRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct UpdateSizeRequest {
    pub name: Option<String>,
}

/// GET /api/sizes
pub(super) async fn list_sizes(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    query: Result<Query<SizeQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<Vec<SizeItem>>>, ApiError> {
    let rid = &req_id.0;
    let Query(query) = query.map_err(|e| query_rejection(rid, &e))?;
    let page = page(rid, query.offset, query.limit)?;

    let rows = shopmap_db::list_sizes(&state.pool, query.name.as_deref(), page)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(ok(req_id, rows.into_iter().map(SizeItem::from).collect()))
}

/// GET /api/sizes/{id}
pub(super) async fn get_size(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<SizeItem>>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &id)?;

    let row = shopmap_db::get_size(&state.pool, id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(|| ApiError::not_found(rid, "size", id))?;

    Ok(ok(req_id, row.into()))
}

/// POST /api/sizes
pub(super) async fn create_size(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    body: Result<Json<SizeRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<SizeItem>>), ApiError> {
    let rid = &req_id.0;
    let Json(body) = body.map_err(|e| json_rejection(rid, &e))?;
    let name = required_text(rid, "name", &body.name)?;

    let row = shopmap_db::create_size(&state.pool, &name)
        .await
        .map_err(|e| map_write_error(rid.clone(), &e))?;

    Ok(created(req_id, row.into()))
}

/// PUT /api/sizes/{id}
pub(super) async fn update_size(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
    body: Result<Json<UpdateSizeRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<SizeItem>>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &id)?;
    let Json(body) = body.map_err(|e| json_rejection(rid, &e))?;
    let name = body
        .name
        .as_deref()
        .map(|n| required_text(rid, "name", n))
        .transpose()?;

    let row = shopmap_db::update_size(&state.pool, id, name.as_deref())
        .await
        .map_err(|e| map_write_error(rid.clone(), &e))?
        .ok_or_else(|| ApiError::not_found(rid, "size", id))?;

    Ok(ok(req_id, row.into()))
}

/// DELETE /api/sizes/{id}
pub(super) async fn delete_size(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<SizeItem>>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &id)?;

    let row = shopmap_db::delete_size(&state.pool, id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(|| ApiError::not_found(rid, "size", id))?;

    Ok(ok(req_id, row.into()))
}
