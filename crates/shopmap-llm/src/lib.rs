//! Text generation against hosted LLM providers.
//!
//! [`OpenAiClient`] speaks the chat-completions API, [`ClaudeClient`] the
//! Anthropic messages API. [`LlmService`] holds whichever of the two are
//! configured and routes a [`GenerationRequest`] to the chosen provider.

pub mod claude;
pub mod client;
pub mod error;
pub mod openai;
pub mod prompts;
pub mod types;

pub use claude::ClaudeClient;
pub use client::{LlmClient, LlmService};
pub use error::LlmError;
pub use openai::OpenAiClient;
pub use prompts::{
    product_description_request, product_name_request, DescriptionLength, DescriptionPrompt,
    NamePrompt,
};
pub use shopmap_core::LlmProvider;
pub use types::{GenerationRequest, LlmResponse, TokenUsage};
