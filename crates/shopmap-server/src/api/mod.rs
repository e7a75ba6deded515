mod categories;
mod colors;
mod inventory;
mod llm;
mod metadata;
mod products;
mod shops;
mod sizes;

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        State,
    },
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post, put, MethodRouter},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use shopmap_core::AppConfig;
use shopmap_db::{DbError, Page};
use shopmap_llm::{LlmError, LlmService};
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

use crate::middleware::{
    enforce_rate_limit, request_id, require_api_key, AuthState, RateLimitState, RequestId,
};

const DEFAULT_LIMIT: i64 = 100;
const MAX_LIMIT: i64 = 500;
const MAX_NAME_LEN: usize = 255;

/// Settings that shape the router rather than individual handlers.
#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub project_name: String,
    /// Empty string mounts resources at the root.
    pub api_prefix: String,
    pub cors_origins: Vec<String>,
}

impl ApiSettings {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            project_name: config.project_name.clone(),
            api_prefix: config.api_prefix.clone(),
            cors_origins: config.cors_origins.clone(),
        }
    }
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            project_name: "Shop & Product API".to_string(),
            api_prefix: "/api".to_string(),
            cors_origins: vec!["*".to_string()],
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub llm: LlmService,
    pub settings: Arc<ApiSettings>,
}

impl AppState {
    #[must_use]
    pub fn new(pool: PgPool, llm: LlmService, settings: ApiSettings) -> Self {
        Self {
            pool,
            llm,
            settings: Arc::new(settings),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub status: u16,
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

#[derive(Debug, Serialize)]
struct BannerData {
    name: String,
    version: &'static str,
    status: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

fn status_for_code(code: &str) -> StatusCode {
    match code {
        "validation_error" | "invalid_reference" => StatusCode::BAD_REQUEST,
        "unauthorized" => StatusCode::UNAUTHORIZED,
        "not_found" => StatusCode::NOT_FOUND,
        "conflict" => StatusCode::CONFLICT,
        "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
        "upstream_error" => StatusCode::BAD_GATEWAY,
        "llm_unavailable" => StatusCode::SERVICE_UNAVAILABLE,
        "upstream_timeout" => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let code = code.into();
        Self {
            error: ErrorBody {
                status: status_for_code(&code).as_u16(),
                code,
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }

    pub(super) fn validation(request_id: &str, message: impl Into<String>) -> Self {
        Self::new(request_id, "validation_error", message)
    }

    pub(super) fn not_found(request_id: &str, what: &str, id: i64) -> Self {
        Self::new(request_id, "not_found", format!("{what} {id} not found"))
    }

    pub(super) fn invalid_reference(request_id: &str, field: &str, id: i64) -> Self {
        Self::new(
            request_id,
            "invalid_reference",
            format!("{field} {id} does not reference an existing record"),
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.error.status)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

pub(super) fn ok<T: Serialize>(req_id: RequestId, data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    })
}

pub(super) fn created<T: Serialize>(
    req_id: RequestId,
    data: T,
) -> (StatusCode, Json<ApiResponse<T>>) {
    (StatusCode::CREATED, ok(req_id, data))
}

pub(super) fn normalize_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

pub(super) fn page(
    request_id: &str,
    offset: Option<i64>,
    limit: Option<i64>,
) -> Result<Page, ApiError> {
    let offset = offset.unwrap_or(0);
    if offset < 0 {
        return Err(ApiError::validation(request_id, "offset must be >= 0"));
    }
    Ok(Page {
        offset,
        limit: normalize_limit(limit),
    })
}

/// Parses a path identifier; ids are positive integers.
pub(super) fn parse_id(request_id: &str, raw: &str) -> Result<i64, ApiError> {
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ApiError::validation(
            request_id,
            format!("'{raw}' is not a valid identifier"),
        )),
    }
}

pub(super) fn query_rejection(request_id: &str, rejection: &QueryRejection) -> ApiError {
    ApiError::validation(request_id, rejection.body_text())
}

pub(super) fn json_rejection(request_id: &str, rejection: &JsonRejection) -> ApiError {
    ApiError::validation(request_id, rejection.body_text())
}

/// Maps a failed read or delete.
pub(super) fn map_db_error(request_id: String, error: &DbError) -> ApiError {
    match error {
        DbError::NotFound => ApiError::new(request_id, "not_found", "record not found"),
        DbError::MissingMetadataKey(_) => {
            ApiError::new(request_id, "not_found", error.to_string())
        }
        DbError::Conflict(message) => ApiError::new(request_id, "conflict", message.clone()),
        DbError::ForeignKeyViolation { .. } => ApiError::new(
            request_id,
            "conflict",
            "record is still referenced by other records",
        ),
        DbError::UniqueViolation { .. } => {
            ApiError::new(request_id, "conflict", "a record with that name already exists")
        }
        DbError::CheckViolation { constraint } => ApiError::new(
            request_id,
            "validation_error",
            check_violation_message(constraint),
        ),
        DbError::Sqlx(_) | DbError::Migration(_) => {
            tracing::error!(error = %error, "database query failed");
            ApiError::new(request_id, "internal_error", "database query failed")
        }
    }
}

fn check_violation_message(constraint: &str) -> String {
    match constraint {
        "shops_coordinates_paired" => {
            "latitude and longitude must be provided together".to_string()
        }
        other => format!("value violates constraint {other}"),
    }
}

/// Maps a failed create or update, where a foreign key violation means the
/// payload pointed at a row that vanished after the handler checked it.
pub(super) fn map_write_error(request_id: String, error: &DbError) -> ApiError {
    match error {
        DbError::ForeignKeyViolation { constraint } => ApiError::new(
            request_id,
            "invalid_reference",
            format!("referenced record does not exist ({constraint})"),
        ),
        other => map_db_error(request_id, other),
    }
}

pub(super) fn map_llm_error(request_id: String, error: &LlmError) -> ApiError {
    tracing::error!(error = %error, "llm generation failed");
    match error {
        LlmError::NotConfigured(_) => {
            ApiError::new(request_id, "llm_unavailable", error.to_string())
        }
        LlmError::Timeout => ApiError::new(
            request_id,
            "upstream_timeout",
            "LLM provider did not respond in time",
        ),
        _ => ApiError::new(request_id, "upstream_error", error.to_string()),
    }
}

/// Deserializes a field so that an explicit `null` becomes `Some(None)` while
/// an absent field (via `#[serde(default)]`) stays `None`.
#[allow(clippy::option_option)]
pub(super) fn nullable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Trims a required text field and rejects blank or oversized values.
pub(super) fn required_text(
    request_id: &str,
    field: &str,
    value: &str,
) -> Result<String, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::validation(request_id, format!("{field} must not be empty")));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(ApiError::validation(
            request_id,
            format!("{field} must be at most {MAX_NAME_LEN} characters"),
        ));
    }
    Ok(trimmed.to_string())
}

pub(super) fn validate_url(request_id: &str, field: &str, value: &str) -> Result<(), ApiError> {
    reqwest::Url::parse(value)
        .map(|_| ())
        .map_err(|e| ApiError::validation(request_id, format!("{field} is not a valid URL: {e}")))
}

pub(super) fn validate_latitude(request_id: &str, value: f64) -> Result<(), ApiError> {
    if (-90.0..=90.0).contains(&value) {
        Ok(())
    } else {
        Err(ApiError::validation(
            request_id,
            format!("latitude must be between -90 and 90, got {value}"),
        ))
    }
}

pub(super) fn validate_longitude(request_id: &str, value: f64) -> Result<(), ApiError> {
    if (-180.0..=180.0).contains(&value) {
        Ok(())
    } else {
        Err(ApiError::validation(
            request_id,
            format!("longitude must be between -180 and 180, got {value}"),
        ))
    }
}

pub(super) fn validate_non_negative(
    request_id: &str,
    field: &str,
    value: i32,
) -> Result<(), ApiError> {
    if value < 0 {
        return Err(ApiError::validation(request_id, format!("{field} must be >= 0")));
    }
    Ok(())
}

fn build_cors(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::from(Any)
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
            HeaderName::from_static("x-api-key"),
        ])
}

/// Registers a collection route with and without its trailing slash.
fn collection(
    router: Router<AppState>,
    path: &str,
    handlers: MethodRouter<AppState>,
) -> Router<AppState> {
    router
        .route(path, handlers.clone())
        .route(&format!("{path}/"), handlers)
}

fn resource_router() -> Router<AppState> {
    let router = Router::new();
    let router = collection(
        router,
        "/shops",
        get(shops::list_shops).post(shops::create_shop),
    );
    let router = collection(
        router,
        "/products",
        get(products::list_products).post(products::create_product),
    );
    let router = collection(
        router,
        "/categories",
        get(categories::list_categories).post(categories::create_category),
    );
    let router = collection(
        router,
        "/colors",
        get(colors::list_colors).post(colors::create_color),
    );
    let router = collection(
        router,
        "/sizes",
        get(sizes::list_sizes).post(sizes::create_size),
    );
    let router = collection(
        router,
        "/inventory",
        get(inventory::list_inventory).post(inventory::create_inventory),
    );

    router
        .route("/shops/nearby", get(shops::list_nearby_shops))
        .route(
            "/shops/{id}",
            get(shops::get_shop)
                .put(shops::update_shop)
                .delete(shops::delete_shop),
        )
        .route("/shops/{id}/products", get(shops::list_shop_products))
        .route(
            "/shops/{id}/metadata",
            get(metadata::get_shop_metadata).post(metadata::add_shop_metadata),
        )
        .route(
            "/shops/{id}/metadata/{key}",
            put(metadata::update_shop_metadata).delete(metadata::delete_shop_metadata),
        )
        .route("/products/with-shop", get(products::list_products_with_shop))
        .route(
            "/products/{id}",
            get(products::get_product)
                .put(products::update_product)
                .delete(products::delete_product),
        )
        .route(
            "/products/{id}/metadata",
            get(metadata::get_product_metadata).post(metadata::add_product_metadata),
        )
        .route(
            "/products/{id}/metadata/{key}",
            put(metadata::update_product_metadata).delete(metadata::delete_product_metadata),
        )
        .route(
            "/categories/{id}",
            get(categories::get_category)
                .put(categories::update_category)
                .delete(categories::delete_category),
        )
        .route(
            "/colors/{id}",
            get(colors::get_color)
                .put(colors::update_color)
                .delete(colors::delete_color),
        )
        .route(
            "/sizes/{id}",
            get(sizes::get_size)
                .put(sizes::update_size)
                .delete(sizes::delete_size),
        )
        .route(
            "/inventory/{id}",
            get(inventory::get_inventory)
                .put(inventory::update_inventory)
                .delete(inventory::delete_inventory),
        )
        .route("/llm/generate", post(llm::generate))
        .route("/llm/product-description", post(llm::product_description))
        .route("/llm/product-name", post(llm::product_name))
}

fn protected_router(
    prefix: &str,
    auth: AuthState,
    rate_limit: RateLimitState,
) -> Router<AppState> {
    let resources = resource_router();
    // axum refuses to nest at the root.
    let mounted = if prefix.is_empty() {
        resources
    } else {
        Router::new().nest(prefix, resources)
    };

    mounted.layer(
        ServiceBuilder::new()
            .layer(axum::middleware::from_fn_with_state(
                rate_limit,
                enforce_rate_limit,
            ))
            .layer(axum::middleware::from_fn_with_state(auth, require_api_key)),
    )
}

pub fn build_app(state: AppState, auth: AuthState, rate_limit: RateLimitState) -> Router {
    let public_routes = Router::new()
        .route("/", get(banner))
        .route("/health", get(health));

    Router::new()
        .merge(public_routes)
        .merge(protected_router(&state.settings.api_prefix, auth, rate_limit))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(SetResponseHeaderLayer::if_not_present(
                    header::X_CONTENT_TYPE_OPTIONS,
                    HeaderValue::from_static("nosniff"),
                ))
                .layer(build_cors(&state.settings.cors_origins))
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn banner(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Json<ApiResponse<BannerData>> {
    ok(
        req_id,
        BannerData {
            name: state.settings.project_name.clone(),
            version: env!("CARGO_PKG_VERSION"),
            status: "running",
        },
    )
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    match shopmap_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            ok(
                req_id,
                HealthData {
                    status: "ok",
                    database: "ok",
                },
            ),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                ok(
                    req_id,
                    HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                ),
            )
        }
    }
}

#[cfg(test)]
mod tests;
