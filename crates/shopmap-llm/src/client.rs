//! Provider dispatch.

use shopmap_core::{LlmProvider, LlmSettings};

use crate::claude::ClaudeClient;
use crate::error::LlmError;
use crate::openai::OpenAiClient;
use crate::types::{GenerationRequest, LlmResponse};

/// One configured provider client.
#[derive(Debug, Clone)]
pub enum LlmClient {
    OpenAi(OpenAiClient),
    Claude(ClaudeClient),
}

impl LlmClient {
    #[must_use]
    pub fn provider(&self) -> LlmProvider {
        match self {
            Self::OpenAi(_) => LlmProvider::OpenAi,
            Self::Claude(_) => LlmProvider::Claude,
        }
    }

    /// # Errors
    ///
    /// Propagates the provider client's [`LlmError`].
    pub async fn generate(&self, request: &GenerationRequest) -> Result<LlmResponse, LlmError> {
        match self {
            Self::OpenAi(client) => client.generate(request).await,
            Self::Claude(client) => client.generate(request).await,
        }
    }
}

/// The set of configured providers plus the default used when a request
/// does not name one.
#[derive(Debug, Clone)]
pub struct LlmService {
    default_provider: LlmProvider,
    openai: Option<LlmClient>,
    claude: Option<LlmClient>,
}

impl LlmService {
    /// Builds a client for every provider that has an API key.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Config`] or [`LlmError::Http`] if a configured
    /// client cannot be constructed.
    pub fn from_settings(settings: &LlmSettings) -> Result<Self, LlmError> {
        let openai = settings
            .openai_api_key
            .as_deref()
            .map(|key| {
                OpenAiClient::with_base_url(
                    key,
                    &settings.openai_model,
                    settings.timeout_secs,
                    &settings.openai_base_url,
                )
            })
            .transpose()?;
        let claude = settings
            .anthropic_api_key
            .as_deref()
            .map(|key| {
                ClaudeClient::with_base_url(
                    key,
                    &settings.claude_model,
                    settings.timeout_secs,
                    &settings.anthropic_base_url,
                )
            })
            .transpose()?;

        Ok(Self::new(
            settings.default_provider,
            openai.map(LlmClient::OpenAi),
            claude.map(LlmClient::Claude),
        ))
    }

    #[must_use]
    pub fn new(
        default_provider: LlmProvider,
        openai: Option<LlmClient>,
        claude: Option<LlmClient>,
    ) -> Self {
        Self {
            default_provider,
            openai,
            claude,
        }
    }

    /// A service with no providers; every call fails with `NotConfigured`.
    #[must_use]
    pub fn unconfigured() -> Self {
        Self::new(LlmProvider::default(), None, None)
    }

    #[must_use]
    pub fn default_provider(&self) -> LlmProvider {
        self.default_provider
    }

    /// Returns the client for `provider`, or the default when `None`.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::NotConfigured`] if that provider has no API key.
    pub fn client(&self, provider: Option<LlmProvider>) -> Result<&LlmClient, LlmError> {
        let provider = provider.unwrap_or(self.default_provider);
        let slot = match provider {
            LlmProvider::OpenAi => self.openai.as_ref(),
            LlmProvider::Claude => self.claude.as_ref(),
        };
        slot.ok_or(LlmError::NotConfigured(provider))
    }

    /// Generates text with `provider` (or the default). No retry, no fallback.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::NotConfigured`] if the provider has no API key, or
    /// the provider client's error.
    pub async fn generate(
        &self,
        provider: Option<LlmProvider>,
        request: &GenerationRequest,
    ) -> Result<LlmResponse, LlmError> {
        let client = self.client(provider)?;
        client.generate(request).await
    }
}
