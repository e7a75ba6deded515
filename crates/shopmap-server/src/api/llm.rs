//! Text-generation passthrough to the configured LLM providers.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    Extension, Json,
};
use serde::Deserialize;
use shopmap_llm::{
    product_description_request, product_name_request,
    types::{DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE},
    DescriptionLength, DescriptionPrompt, GenerationRequest, LlmProvider, LlmResponse, NamePrompt,
};

use crate::middleware::RequestId;

use super::{
    json_rejection, map_llm_error, ok, query_rejection, required_text, ApiError, ApiResponse,
    AppState,
};

const MAX_TEMPERATURE: f32 = 2.0;
const MAX_GENERATION_TOKENS: u32 = 32_000;
const MAX_NAME_SUGGESTIONS: u8 = 20;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct ProviderQuery {
    pub provider: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct GenerateBody {
    pub prompt: String,
    pub model: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    pub provider: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct DescriptionBody {
    #[serde(alias = "name")]
    pub title: String,
    pub category: Option<String>,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default = "default_tone")]
    pub tone: String,
    pub length: Option<String>,
    pub provider: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct NameBody {
    pub product_type: String,
    #[serde(default)]
    pub features: Vec<String>,
    pub target_audience: Option<String>,
    pub brand_style: Option<String>,
    #[serde(default = "default_count")]
    pub count: u8,
    pub provider: Option<String>,
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

fn default_tone() -> String {
    "professional".to_string()
}

fn default_count() -> u8 {
    5
}

/// The query parameter wins over the body field when both are present.
fn resolve_provider(
    req_id: &str,
    from_query: Option<&str>,
    from_body: Option<&str>,
) -> Result<Option<LlmProvider>, ApiError> {
    from_query
        .or(from_body)
        .map(str::parse::<LlmProvider>)
        .transpose()
        .map_err(|e| ApiError::validation(req_id, e))
}

async fn run(
    state: &AppState,
    req_id: RequestId,
    provider: Option<LlmProvider>,
    request: &GenerationRequest,
) -> Result<Json<ApiResponse<LlmResponse>>, ApiError> {
    let response = state
        .llm
        .generate(provider, request)
        .await
        .map_err(|e| map_llm_error(req_id.0.clone(), &e))?;

    tracing::info!(
        model = %response.model,
        total_tokens = response.tokens.total,
        "llm generation completed"
    );
    Ok(ok(req_id, response))
}

/// POST /api/llm/generate
pub(super) async fn generate(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    query: Result<Query<ProviderQuery>, QueryRejection>,
    body: Result<Json<GenerateBody>, JsonRejection>,
) -> Result<Json<ApiResponse<LlmResponse>>, ApiError> {
    let rid = &req_id.0;
    let Query(query) = query.map_err(|e| query_rejection(rid, &e))?;
    let Json(body) = body.map_err(|e| json_rejection(rid, &e))?;

    if body.prompt.trim().is_empty() {
        return Err(ApiError::validation(rid, "prompt must not be empty"));
    }
    if !(0.0..=MAX_TEMPERATURE).contains(&body.temperature) {
        return Err(ApiError::validation(
            rid,
            format!("temperature must be between 0 and {MAX_TEMPERATURE}"),
        ));
    }
    if !(1..=MAX_GENERATION_TOKENS).contains(&body.max_tokens) {
        return Err(ApiError::validation(
            rid,
            format!("max_tokens must be between 1 and {MAX_GENERATION_TOKENS}"),
        ));
    }
    let provider = resolve_provider(rid, query.provider.as_deref(), body.provider.as_deref())?;

    let request = GenerationRequest {
        prompt: body.prompt,
        model: body.model.filter(|m| !m.trim().is_empty()),
        temperature: body.temperature,
        max_tokens: body.max_tokens,
    };
    run(&state, req_id, provider, &request).await
}

/// POST /api/llm/product-description
pub(super) async fn product_description(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    query: Result<Query<ProviderQuery>, QueryRejection>,
    body: Result<Json<DescriptionBody>, JsonRejection>,
) -> Result<Json<ApiResponse<LlmResponse>>, ApiError> {
    let rid = &req_id.0;
    let Query(query) = query.map_err(|e| query_rejection(rid, &e))?;
    let Json(body) = body.map_err(|e| json_rejection(rid, &e))?;

    let title = required_text(rid, "title", &body.title)?;
    let length = body
        .length
        .as_deref()
        .map(str::parse::<DescriptionLength>)
        .transpose()
        .map_err(|e| ApiError::validation(rid, e))?
        .unwrap_or_default();
    let provider = resolve_provider(rid, query.provider.as_deref(), body.provider.as_deref())?;

    let request = product_description_request(&DescriptionPrompt {
        title,
        category: body.category,
        key_points: body.key_points,
        tone: body.tone,
        length,
    });
    run(&state, req_id, provider, &request).await
}

/// POST /api/llm/product-name
pub(super) async fn product_name(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    query: Result<Query<ProviderQuery>, QueryRejection>,
    body: Result<Json<NameBody>, JsonRejection>,
) -> Result<Json<ApiResponse<LlmResponse>>, ApiError> {
    let rid = &req_id.0;
    let Query(query) = query.map_err(|e| query_rejection(rid, &e))?;
    let Json(body) = body.map_err(|e| json_rejection(rid, &e))?;

    let product_type = required_text(rid, "product_type", &body.product_type)?;
    if !(1..=MAX_NAME_SUGGESTIONS).contains(&body.count) {
        return Err(ApiError::validation(
            rid,
            format!("count must be between 1 and {MAX_NAME_SUGGESTIONS}"),
        ));
    }
    let provider = resolve_provider(rid, query.provider.as_deref(), body.provider.as_deref())?;

    let request = product_name_request(&NamePrompt {
        product_type,
        features: body.features,
        target_audience: body.target_audience,
        brand_style: body.brand_style,
        count: body.count,
    });
    run(&state, req_id, provider, &request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_provider_takes_precedence_over_body() {
        let provider = resolve_provider("r", Some("claude"), Some("openai")).expect("valid");
        assert_eq!(provider, Some(LlmProvider::Claude));
        assert_eq!(resolve_provider("r", None, None).expect("valid"), None);
    }

    #[test]
    fn unknown_provider_is_a_validation_error() {
        let err = resolve_provider("r", None, Some("gemini")).expect_err("unknown");
        assert_eq!(err.error.code, "validation_error");
        assert_eq!(err.error.status, 400);
    }

    #[test]
    fn description_body_accepts_name_alias_and_defaults() {
        let body: DescriptionBody =
            serde_json::from_value(serde_json::json!({ "name": "Blue Mug", "category": "Kitchen" }))
                .expect("deserialize");
        assert_eq!(body.title, "Blue Mug");
        assert_eq!(body.tone, "professional");
        assert!(body.key_points.is_empty());
        assert!(body.length.is_none());
    }

    #[test]
    fn generate_body_applies_defaults() {
        let body: GenerateBody =
            serde_json::from_value(serde_json::json!({ "prompt": "hi" })).expect("deserialize");
        assert_eq!(body.max_tokens, 1000);
        assert!((body.temperature - 0.7).abs() < f32::EPSILON);
    }
}
