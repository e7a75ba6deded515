//! Client for the Anthropic messages API.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Client;
use tracing::instrument;

use crate::error::{error_from_response, LlmError};
use crate::types::{
    ChatMessage, ContentBlock, GenerationRequest, LlmResponse, MessagesRequest, MessagesResponse,
    TokenUsage,
};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic messages client.
#[derive(Debug, Clone)]
pub struct ClaudeClient {
    client: Client,
    base_url: String,
    model: String,
}

impl ClaudeClient {
    /// Creates a client pointed at the public Anthropic API.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Config`] if the key is not a valid header value,
    /// or [`LlmError::Http`] if the HTTP client cannot be built.
    pub fn new(api_key: &str, model: &str, timeout_secs: u64) -> Result<Self, LlmError> {
        Self::with_base_url(api_key, model, timeout_secs, DEFAULT_BASE_URL)
    }

    /// Creates a client with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Config`] if the key is not a valid header value,
    /// or [`LlmError::Http`] if the HTTP client cannot be built.
    pub fn with_base_url(
        api_key: &str,
        model: &str,
        timeout_secs: u64,
        base_url: &str,
    ) -> Result<Self, LlmError> {
        let mut key = HeaderValue::from_str(api_key).map_err(|e| {
            LlmError::Config(format!("Anthropic API key is not a valid header: {e}"))
        })?;
        key.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", key);
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            model: model.to_owned(),
        })
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Sends one user message and concatenates the text blocks of the reply.
    ///
    /// # Errors
    ///
    /// - [`LlmError::Timeout`] if the request exceeds the client timeout.
    /// - [`LlmError::Api`], [`LlmError::RateLimited`] or
    ///   [`LlmError::Unauthorized`] for non-2xx responses.
    /// - [`LlmError::Parse`] if the body is not a messages response or holds
    ///   no text.
    #[instrument(skip(self, request), fields(model = tracing::field::Empty))]
    pub async fn generate(&self, request: &GenerationRequest) -> Result<LlmResponse, LlmError> {
        let model = request.model.as_deref().unwrap_or(&self.model);
        tracing::Span::current().record("model", model);

        let body = MessagesRequest {
            model,
            messages: vec![ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let text = response.text().await?;
        let parsed: MessagesResponse = serde_json::from_str(&text)
            .map_err(|e| LlmError::Parse(format!("invalid messages response: {e}")))?;

        let generated: String = parsed
            .content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .collect();
        if generated.trim().is_empty() {
            return Err(LlmError::Parse("messages response has no text".to_string()));
        }
        let tokens = parsed.usage.map_or_else(TokenUsage::default, |u| TokenUsage {
            prompt: u.input_tokens,
            completion: u.output_tokens,
            total: u.input_tokens + u.output_tokens,
        });

        Ok(LlmResponse {
            text: generated,
            model: parsed.model.unwrap_or_else(|| model.to_owned()),
            tokens,
            finish_reason: parsed.stop_reason,
        })
    }
}
