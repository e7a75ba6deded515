//! Error types shared by the provider clients.

use shopmap_core::LlmProvider;
use thiserror::Error;

/// Errors that can occur when generating text.
#[derive(Debug, Error)]
pub enum LlmError {
    /// No API key is configured for the requested provider.
    #[error("{0} provider is not configured")]
    NotConfigured(LlmProvider),

    /// The client could not be built from its settings.
    #[error("invalid client configuration: {0}")]
    Config(String),

    /// The provider did not answer within the configured timeout.
    #[error("request to provider timed out")]
    Timeout,

    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    /// The provider answered with an error status.
    #[error("API error ({status}, {error_type}): {message}")]
    Api {
        status: u16,
        error_type: String,
        message: String,
    },

    /// Rate limited by the provider.
    #[error("rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// The provider rejected our credentials.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The response body did not have the expected shape.
    #[error("parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(error)
        }
    }
}

/// Error body returned by both providers: `{"error": {"type", "message"}}`.
#[derive(Debug, serde::Deserialize)]
pub(crate) struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

#[derive(Debug, serde::Deserialize)]
pub(crate) struct ApiErrorDetail {
    #[serde(rename = "type", default)]
    pub error_type: Option<String>,
    pub message: String,
}

/// Turn a non-2xx provider response into a typed error.
pub(crate) async fn error_from_response(response: reqwest::Response) -> LlmError {
    let status = response.status();

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .unwrap_or(60);
        return LlmError::RateLimited(retry_after);
    }

    if status == reqwest::StatusCode::UNAUTHORIZED {
        return LlmError::Unauthorized("invalid API key".to_string());
    }

    match response.text().await {
        Ok(body) => match serde_json::from_str::<ApiErrorResponse>(&body) {
            Ok(api_error) => LlmError::Api {
                status: status.as_u16(),
                error_type: api_error
                    .error
                    .error_type
                    .unwrap_or_else(|| "unknown".to_string()),
                message: api_error.error.message,
            },
            Err(_) => LlmError::Api {
                status: status.as_u16(),
                error_type: "unknown".to_string(),
                message: body,
            },
        },
        Err(e) => LlmError::from(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_status_and_type() {
        let err = LlmError::Api {
            status: 400,
            error_type: "invalid_request_error".to_string(),
            message: "max_tokens is too large".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "API error (400, invalid_request_error): max_tokens is too large"
        );
        assert_eq!(
            LlmError::NotConfigured(LlmProvider::Claude).to_string(),
            "claude provider is not configured"
        );
    }

    #[test]
    fn error_body_deserializes_for_both_providers() {
        let anthropic = r#"{
            "type": "error",
            "error": { "type": "overloaded_error", "message": "Overloaded" }
        }"#;
        let parsed: ApiErrorResponse = serde_json::from_str(anthropic).expect("anthropic body");
        assert_eq!(parsed.error.error_type.as_deref(), Some("overloaded_error"));
        assert_eq!(parsed.error.message, "Overloaded");

        let openai = r#"{
            "error": { "message": "The model does not exist", "type": "invalid_request_error", "param": null, "code": "model_not_found" }
        }"#;
        let parsed: ApiErrorResponse = serde_json::from_str(openai).expect("openai body");
        assert_eq!(
            parsed.error.error_type.as_deref(),
            Some("invalid_request_error")
        );
    }
}
