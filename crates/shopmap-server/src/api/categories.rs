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
use shopmap_db::{CategoryFilter, CategoryRow, CategoryUpdate, NewCategory};

use crate::middleware::RequestId;

use super::{
    created, json_rejection, map_db_error, map_write_error, nullable, ok, page, parse_id,
    query_rejection, required_text, ApiError, ApiResponse, AppState,
};

// Parent chains deeper than this are treated as corrupt rather than walked forever.
const MAX_CATEGORY_DEPTH: usize = 64;

#[derive(Debug, Serialize)]
pub(super) struct CategoryItem {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub parent_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<CategoryRow> for CategoryItem {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            parent_id: row.parent_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct CategoryQuery {
    pub name: Option<String>,
    pub parent_id: Option<i64>,
    #[serde(alias = "skip")]
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct CreateCategoryRequest {
    pub name: String,
    pub description: Option<String>,
    pub parent_id: Option<i64>,
}

#[allow(clippy::option_option)]
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct UpdateCategoryRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub parent_id: Option<Option<i64>>,
}

async fn check_parent_reference(
    state: &AppState,
    req_id: &str,
    parent_id: i64,
) -> Result<(), ApiError> {
    let exists = shopmap_db::category_exists(&state.pool, parent_id)
        .await
        .map_err(|e| map_db_error(req_id.to_owned(), &e))?;
    if exists {
        Ok(())
    } else {
        Err(ApiError::invalid_reference(req_id, "parent_id", parent_id))
    }
}

/// Rejects a re-parent that would make `id` its own ancestor.
async fn check_no_cycle(
    state: &AppState,
    req_id: &str,
    id: i64,
    new_parent: i64,
) -> Result<(), ApiError> {
    let mut current = Some(new_parent);
    for _ in 0..MAX_CATEGORY_DEPTH {
        let Some(ancestor) = current else {
            return Ok(());
        };
        if ancestor == id {
            return Err(ApiError::validation(
                req_id,
                "a category cannot be its own ancestor",
            ));
        }
        current = shopmap_db::get_category(&state.pool, ancestor)
            .await
            .map_err(|e| map_db_error(req_id.to_owned(), &e))?
            .and_then(|c| c.parent_id);
    }
    Err(ApiError::validation(req_id, "category hierarchy is too deep"))
}

/// GET /api/categories
pub(super) async fn list_categories(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    query: Result<Query<CategoryQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<Vec<CategoryItem>>>, ApiError> {
    let rid = &req_id.0;
    let Query(query) = query.map_err(|e| query_rejection(rid, &e))?;
    let page = page(rid, query.offset, query.limit)?;
    let filter = CategoryFilter {
        name: query.name,
        parent_id: query.parent_id,
    };

    let rows = shopmap_db::list_categories(&state.pool, &filter, page)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(ok(req_id, rows.into_iter().map(CategoryItem::from).collect()))
}

/// GET /api/categories/{id}
pub(super) async fn get_category(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<CategoryItem>>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &id)?;

    let row = shopmap_db::get_category(&state.pool, id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(|| ApiError::not_found(rid, "category", id))?;

    Ok(ok(req_id, row.into()))
}

/// POST /api/categories
pub(super) async fn create_category(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    body: Result<Json<CreateCategoryRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<CategoryItem>>), ApiError> {
    let rid = &req_id.0;
    let Json(body) = body.map_err(|e| json_rejection(rid, &e))?;

    let name = required_text(rid, "name", &body.name)?;
    if let Some(parent_id) = body.parent_id {
        check_parent_reference(&state, rid, parent_id).await?;
    }

    let row = shopmap_db::create_category(
        &state.pool,
        &NewCategory {
            name,
            description: body.description,
            parent_id: body.parent_id,
        },
    )
    .await
    .map_err(|e| map_write_error(rid.clone(), &e))?;

    Ok(created(req_id, row.into()))
}

/// PUT /api/categories/{id}
pub(super) async fn update_category(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
    body: Result<Json<UpdateCategoryRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<CategoryItem>>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &id)?;
    let Json(body) = body.map_err(|e| json_rejection(rid, &e))?;

    let name = body
        .name
        .as_deref()
        .map(|n| required_text(rid, "name", n))
        .transpose()?;
    if let Some(Some(parent_id)) = body.parent_id {
        check_parent_reference(&state, rid, parent_id).await?;
        check_no_cycle(&state, rid, id, parent_id).await?;
    }

    let update = CategoryUpdate {
        name,
        description: body.description,
        parent_id: body.parent_id,
    };
    let row = shopmap_db::update_category(&state.pool, id, &update)
        .await
        .map_err(|e| map_write_error(rid.clone(), &e))?
        .ok_or_else(|| ApiError::not_found(rid, "category", id))?;

    Ok(ok(req_id, row.into()))
}

/// DELETE /api/categories/{id}: hard delete; 409 while products or child
/// categories reference it.
pub(super) async fn delete_category(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<CategoryItem>>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &id)?;

    let row = shopmap_db::delete_category(&state.pool, id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(|| ApiError::not_found(rid, "category", id))?;

    Ok(ok(req_id, row.into()))
}
