//! Selection of the upstream text-generation provider.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which LLM vendor a generation request is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    OpenAi,
    Claude,
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenAi => write!(f, "openai"),
            Self::Claude => write!(f, "claude"),
        }
    }
}

impl FromStr for LlmProvider {
    type Err = String;

    /// Accepts `openai`, `claude`, and `anthropic` (alias for `claude`),
    /// case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "claude" | "anthropic" => Ok(Self::Claude),
            other => Err(format!(
                "unknown LLM provider '{other}'; expected 'openai' or 'claude'"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_providers_case_insensitively() {
        assert_eq!("OpenAI".parse::<LlmProvider>(), Ok(LlmProvider::OpenAi));
        assert_eq!("claude".parse::<LlmProvider>(), Ok(LlmProvider::Claude));
        assert_eq!(" Anthropic ".parse::<LlmProvider>(), Ok(LlmProvider::Claude));
    }

    #[test]
    fn rejects_unknown_provider() {
        let err = "gemini".parse::<LlmProvider>().unwrap_err();
        assert!(err.contains("gemini"));
    }

    #[test]
    fn display_matches_serde_name() {
        let json = serde_json::to_string(&LlmProvider::OpenAi).unwrap();
        assert_eq!(json, format!("\"{}\"", LlmProvider::OpenAi));
        let json = serde_json::to_string(&LlmProvider::Claude).unwrap();
        assert_eq!(json, format!("\"{}\"", LlmProvider::Claude));
    }
}
