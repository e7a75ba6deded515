//! Client for the OpenAI chat-completions API.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use tracing::instrument;

use crate::error::{error_from_response, LlmError};
use crate::types::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, GenerationRequest, LlmResponse,
    TokenUsage,
};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI chat-completions client.
///
/// Use [`OpenAiClient::new`] for production or [`OpenAiClient::with_base_url`]
/// to point at a mock server in tests.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    model: String,
}

impl OpenAiClient {
    /// Creates a client pointed at the public OpenAI API.
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
        let mut auth = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|e| LlmError::Config(format!("OpenAI API key is not a valid header: {e}")))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

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

    /// Sends one user message and returns the first choice.
    ///
    /// # Errors
    ///
    /// - [`LlmError::Timeout`] if the request exceeds the client timeout.
    /// - [`LlmError::Api`], [`LlmError::RateLimited`] or
    ///   [`LlmError::Unauthorized`] for non-2xx responses.
    /// - [`LlmError::Parse`] if the body is not a chat completion or the
    ///   completion carries no text.
    #[instrument(skip(self, request), fields(model = tracing::field::Empty))]
    pub async fn generate(&self, request: &GenerationRequest) -> Result<LlmResponse, LlmError> {
        let model = request.model.as_deref().unwrap_or(&self.model);
        tracing::Span::current().record("model", model);

        let body = ChatCompletionRequest {
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
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let text = response.text().await?;
        let parsed: ChatCompletionResponse = serde_json::from_str(&text)
            .map_err(|e| LlmError::Parse(format!("invalid chat completion: {e}")))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::Parse("chat completion has no choices".to_string()))?;
        let generated = choice
            .message
            .content
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| LlmError::Parse("chat completion has no content".to_string()))?;
        let tokens = parsed.usage.map_or_else(TokenUsage::default, |u| TokenUsage {
            prompt: u.prompt_tokens,
            completion: u.completion_tokens,
            total: u.total_tokens,
        });

        Ok(LlmResponse {
            text: generated,
            model: parsed.model.unwrap_or_else(|| model.to_owned()),
            tokens,
            finish_reason: choice.finish_reason,
        })
    }
}
