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
use shopmap_db::ColorRow;

use crate::middleware::RequestId;

use super::{
    created, json_rejection, map_db_error, map_write_error, nullable, ok, page, parse_id,
    query_rejection, required_text, ApiError, ApiResponse, AppState,
};

#[derive(Debug, Serialize)]
pub(super) struct ColorItem {
    pub id: i64,
    pub name: String,
    pub code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ColorRow> for ColorItem {
    fn from(row: ColorRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            code: row.code,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct ColorQuery {
    pub name: Option<String>,
    #[serde(alias = "skip")]
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct CreateColorRequest {
    pub name: String,
    pub code: Option<String>,
}

#[allow(clippy::option_option)]
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct UpdateColorRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub code: Option<Option<String>>,
}

/// Accepts `#RGB` or `#RRGGBB`.
fn validate_code(req_id: &str, code: &str) -> Result<(), ApiError> {
    let valid = code.strip_prefix('#').is_some_and(|hex| {
        matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit())
    });
    if valid {
        Ok(())
    } else {
        Err(ApiError::validation(
            req_id,
            format!("code must be a hex color like #1A2B3C, got '{code}'"),
        ))
    }
}

/// GET /api/colors
pub(super) async fn list_colors(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    query: Result<Query<ColorQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<Vec<ColorItem>>>, ApiError> {
    let rid = &req_id.0;
    let Query(query) = query.map_err(|e| query_rejection(rid, &e))?;
    let page = page(rid, query.offset, query.limit)?;

    let rows = shopmap_db::list_colors(&state.pool, query.name.as_deref(), page)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(ok(req_id, rows.into_iter().map(ColorItem::from).collect()))
}

/// GET /api/colors/{id}
pub(super) async fn get_color(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ColorItem>>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &id)?;

    let row = shopmap_db::get_color(&state.pool, id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(|| ApiError::not_found(rid, "color", id))?;

    Ok(ok(req_id, row.into()))
}

/// POST /api/colors
pub(super) async fn create_color(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    body: Result<Json<CreateColorRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<ColorItem>>), ApiError> {
    let rid = &req_id.0;
    let Json(body) = body.map_err(|e| json_rejection(rid, &e))?;

    let name = required_text(rid, "name", &body.name)?;
    if let Some(code) = body.code.as_deref() {
        validate_code(rid, code)?;
    }

    let row = shopmap_db::create_color(&state.pool, &name, body.code.as_deref())
        .await
        .map_err(|e| map_write_error(rid.clone(), &e))?;

    Ok(created(req_id, row.into()))
}

/// PUT /api/colors/{id}
pub(super) async fn update_color(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
    body: Result<Json<UpdateColorRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<ColorItem>>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &id)?;
    let Json(body) = body.map_err(|e| json_rejection(rid, &e))?;

    let name = body
        .name
        .as_deref()
        .map(|n| required_text(rid, "name", n))
        .transpose()?;
    if let Some(Some(code)) = body.code.as_ref() {
        validate_code(rid, code)?;
    }

    let row = shopmap_db::update_color(
        &state.pool,
        id,
        name.as_deref(),
        body.code.as_ref().map(Option::as_deref),
    )
    .await
    .map_err(|e| map_write_error(rid.clone(), &e))?
    .ok_or_else(|| ApiError::not_found(rid, "color", id))?;

    Ok(ok(req_id, row.into()))
}

/// DELETE /api/colors/{id}: hard delete; 409 while inventory references it.
pub(super) async fn delete_color(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ColorItem>>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &id)?;

    let row = shopmap_db::delete_color(&state.pool, id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(|| ApiError::not_found(rid, "color", id))?;

    Ok(ok(req_id, row.into()))
}
