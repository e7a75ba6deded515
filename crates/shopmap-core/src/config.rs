use crate::app_config::{AppConfig, Environment, LlmSettings};
use crate::{ConfigError, LlmProvider};

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Parsing and validation live here, decoupled from the process environment so
/// tests can drive it with a plain `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    // Empty strings count as unset for optional secrets.
    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let database_url = require("DATABASE_URL")?;

    let env = parse_environment(&or_default("SHOPMAP_ENV", "development"))?;

    let bind_addr = or_default("SHOPMAP_BIND_ADDR", "0.0.0.0:8000")
        .parse::<SocketAddr>()
        .map_err(|e| invalid("SHOPMAP_BIND_ADDR", e.to_string()))?;
    let log_level = or_default("SHOPMAP_LOG_LEVEL", "info");
    let project_name = or_default("SHOPMAP_PROJECT_NAME", "Shop & Product API");
    let api_prefix = normalize_prefix(&or_default("SHOPMAP_API_PREFIX", "/api"))
        .map_err(|reason| invalid("SHOPMAP_API_PREFIX", reason))?;
    let cors_origins = split_list(&or_default("SHOPMAP_CORS_ORIGINS", "*"));
    let api_keys = split_list(&or_default("SHOPMAP_API_KEYS", ""));

    let rate_limit_max_requests = parse_usize("SHOPMAP_RATE_LIMIT_MAX_REQUESTS", "100")?;
    let rate_limit_window_secs = parse_u64("SHOPMAP_RATE_LIMIT_WINDOW_SECS", "600")?;
    if rate_limit_max_requests == 0 {
        return Err(invalid(
            "SHOPMAP_RATE_LIMIT_MAX_REQUESTS",
            "must be greater than zero".to_string(),
        ));
    }

    let db_max_connections = parse_u32("SHOPMAP_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("SHOPMAP_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("SHOPMAP_DB_ACQUIRE_TIMEOUT_SECS", "10")?;
    if db_min_connections > db_max_connections {
        return Err(invalid(
            "SHOPMAP_DB_MIN_CONNECTIONS",
            format!("{db_min_connections} exceeds SHOPMAP_DB_MAX_CONNECTIONS ({db_max_connections})"),
        ));
    }

    let default_provider = or_default("SHOPMAP_LLM_PROVIDER", "openai")
        .parse::<LlmProvider>()
        .map_err(|reason| invalid("SHOPMAP_LLM_PROVIDER", reason))?;

    let llm = LlmSettings {
        default_provider,
        openai_api_key: optional("OPENAI_API_KEY"),
        anthropic_api_key: optional("ANTHROPIC_API_KEY"),
        openai_model: or_default("SHOPMAP_OPENAI_MODEL", "gpt-4-turbo"),
        claude_model: or_default("SHOPMAP_CLAUDE_MODEL", "claude-3-opus-20240229"),
        openai_base_url: or_default("SHOPMAP_OPENAI_BASE_URL", DEFAULT_OPENAI_BASE_URL),
        anthropic_base_url: or_default("SHOPMAP_ANTHROPIC_BASE_URL", DEFAULT_ANTHROPIC_BASE_URL),
        timeout_secs: parse_u64("SHOPMAP_LLM_TIMEOUT_SECS", "60")?,
    };

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        project_name,
        api_prefix,
        cors_origins,
        api_keys,
        rate_limit_max_requests,
        rate_limit_window_secs,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        llm,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s.trim() {
        "development" | "dev" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" | "prod" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "SHOPMAP_ENV".to_string(),
            reason: format!("expected development, test, or production; got '{other}'"),
        }),
    }
}

/// Route prefixes must start with `/` and carry no trailing slash. `/` alone
/// means "mount at the root" and normalizes to an empty prefix.
fn normalize_prefix(raw: &str) -> Result<String, String> {
    let trimmed = raw.trim();
    if !trimmed.starts_with('/') {
        return Err(format!("prefix must start with '/', got '{trimmed}'"));
    }
    Ok(trimmed.trim_end_matches('/').to_string())
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
